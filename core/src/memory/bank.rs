//! Bank slots and the boot-mapped projection
//!
//! The CPU's 64KB space is four 16KB banks. Each bank slot names a page of
//! one of the two stores owned by the memory context; a fifth slot is held
//! in reserve. The boot-mapped table is never edited directly: it is derived
//! from the normal table by [`derive_boot_map`] whenever the normal table
//! (or the flash chip version) changes.

use super::PAGE_SIZE;

/// Number of slots in a bank table (four visible banks plus one reserved)
pub const BANK_SLOTS: usize = 5;

/// Which store a bank slot resolves against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    Ram,
    Flash,
}

/// One entry of a bank table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankSlot {
    pub store: StoreKind,
    pub page: u16,
    pub read_only: bool,
    pub no_exec: bool,
}

impl BankSlot {
    /// Placeholder for the reserved fifth slot
    pub const EMPTY: BankSlot = BankSlot {
        store: StoreKind::Flash,
        page: 0,
        read_only: false,
        no_exec: false,
    };

    pub const fn flash(page: u16) -> Self {
        Self {
            store: StoreKind::Flash,
            page,
            read_only: false,
            no_exec: false,
        }
    }

    pub const fn ram(page: u16) -> Self {
        Self {
            store: StoreKind::Ram,
            page,
            read_only: false,
            no_exec: false,
        }
    }

    #[inline]
    pub fn is_ram(&self) -> bool {
        self.store == StoreKind::Ram
    }

    /// Physical index of the first byte of the page
    #[inline]
    pub fn base(&self) -> usize {
        self.page as usize * PAGE_SIZE
    }
}

impl Default for BankSlot {
    fn default() -> Self {
        Self::EMPTY
    }
}

pub type BankTable = [BankSlot; BANK_SLOTS];

/// Active bank table selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BankView {
    #[default]
    Normal,
    BootMapped,
}

/// Bank index of a 16-bit address
#[inline]
pub fn bank_of(addr: u16) -> usize {
    (addr >> 14) as usize
}

/// Offset of a 16-bit address within its bank
#[inline]
pub fn offset_of(addr: u16) -> usize {
    (addr & 0x3FFF) as usize
}

/// Compute the boot-mapped table from the normal table.
///
/// Bank 0 is unchanged, bank 1 shows the even page of normal bank 1, bank 2
/// shows its odd sibling (or the even page again on version 1 chips) and
/// bank 3 shows normal bank 2.
pub fn derive_boot_map(normal: &BankTable, flash_version: u8) -> BankTable {
    let odd_bit = if flash_version == 1 { 0 } else { 1 };

    let mut boot = *normal;
    boot[1] = BankSlot {
        store: normal[1].store,
        page: normal[1].page & 0xFE,
        read_only: false,
        no_exec: false,
    };
    boot[2] = BankSlot {
        store: normal[1].store,
        page: normal[1].page | odd_bit,
        read_only: false,
        no_exec: false,
    };
    boot[3] = BankSlot {
        store: normal[2].store,
        page: normal[2].page,
        read_only: false,
        no_exec: false,
    };
    boot
}
