//! Banked memory for Z80-based TI calculators
//!
//! The 16-bit address space is split into four 16KB banks:
//! - 0x0000 - 0x3FFF: bank 0 (normally the boot page of flash)
//! - 0x4000 - 0x7FFF: bank 1 (port 0x06 page)
//! - 0x8000 - 0xBFFF: bank 2 (port 0x07 page)
//! - 0xC000 - 0xFFFF: bank 3 (RAM page 0)
//!
//! Each bank maps a page of either the RAM or the flash store. Two tables
//! exist: the normal table, written by port handlers, and the boot-mapped
//! table, a projection of the normal one used while the boot code runs.
//!
//! Reads and writes check, in order: the port 0x27 window at the top of
//! bank 3, the port 0x28 window at the start of bank 2 (both only in the
//! normal view), the RAM version 2 shadow of high RAM pages, and finally
//! the bank table.
//!
//! # References
//! - WikiTI memory map (https://wikiti.brandonw.net/index.php?title=83Plus:Memory_Mapping)

pub mod bank;
pub mod flash;
pub mod store;

pub use bank::{bank_of, offset_of, BankSlot, BankTable, BankView, StoreKind, BANK_SLOTS};
pub use flash::{FlashRead, FlashSignals, FlashState};
pub use store::{break_kind, ByteStore, CondBreakpoint};

use crate::error::{CoreError, CoreResult};
use crate::model::HardwareConfig;

/// Size of one page and of one bank window
pub const PAGE_SIZE: usize = 0x4000;

/// Size of one port 0x27/0x28 remap chunk
pub const REMAP_CHUNK: u32 = 64;

/// Address of a byte independent of the current bank mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WideAddr {
    pub page: u16,
    /// Offset within the page (0..16384)
    pub offset: u16,
    pub is_ram: bool,
}

impl WideAddr {
    pub fn new(page: u16, offset: u16, is_ram: bool) -> Self {
        Self {
            page,
            offset: offset & 0x3FFF,
            is_ram,
        }
    }

    /// Physical index within the owning store
    #[inline]
    pub fn index(&self) -> usize {
        self.page as usize * PAGE_SIZE + self.offset as usize
    }

    pub fn store(&self) -> StoreKind {
        if self.is_ram {
            StoreKind::Ram
        } else {
            StoreKind::Flash
        }
    }
}

/// RAM, flash and the bank tables that map them into the CPU's view
#[derive(Debug, Clone)]
pub struct MemoryContext {
    flash: ByteStore,
    ram: ByteStore,
    normal: BankTable,
    boot: BankTable,
    view: BankView,

    // Flash sequencer
    pub flash_state: FlashState,
    pub flash_locked: bool,
    /// Nominal program/erase delay, in T-states
    pub flash_write_delay: u32,
    pub(crate) flash_write_byte: u8,
    pub(crate) flash_error: bool,
    pub(crate) flash_toggles: u8,

    /// Boot page 0 has been swapped out after the first fetch from bank 1
    pub changed_page0: bool,

    // Execution protection
    pub protected_page_set: u8,
    pub protected_page: [u8; 4],
    pub prot_mode: u8,

    // Delay hardware penalties
    pub read_op_flash_tstates: u32,
    pub read_nop_flash_tstates: u32,
    pub write_flash_tstates: u32,
    pub read_op_ram_tstates: u32,
    pub read_nop_ram_tstates: u32,
    pub write_ram_tstates: u32,

    // Port values shared between devices
    pub port06: u8,
    pub port07: u8,
    pub port0e: u8,
    pub port0f: u8,
    pub port24: u8,
    /// Number of 64-byte chunks overlaid at the top of bank 3
    pub port27_remap_count: u32,
    /// Number of 64-byte chunks overlaid at the start of bank 2
    pub port28_remap_count: u32,
}

impl MemoryContext {
    pub fn new() -> Self {
        Self {
            flash: ByteStore::default(),
            ram: ByteStore::default(),
            normal: [BankSlot::EMPTY; BANK_SLOTS],
            boot: [BankSlot::EMPTY; BANK_SLOTS],
            view: BankView::Normal,
            flash_state: FlashState::Read,
            flash_locked: true,
            flash_write_delay: 0,
            flash_write_byte: 0,
            flash_error: false,
            flash_toggles: 0,
            changed_page0: false,
            protected_page_set: 0,
            protected_page: [0; 4],
            prot_mode: 0,
            read_op_flash_tstates: 0,
            read_nop_flash_tstates: 0,
            write_flash_tstates: 0,
            read_op_ram_tstates: 0,
            read_nop_ram_tstates: 0,
            write_ram_tstates: 0,
            port06: 0,
            port07: 0,
            port0e: 0,
            port0f: 0,
            port24: 0,
            port27_remap_count: 0,
            port28_remap_count: 0,
        }
    }

    /// Reset every field except store sizes and execution windows
    pub fn clear(&mut self) {
        let (flash, ram) = (std::mem::take(&mut self.flash), std::mem::take(&mut self.ram));
        *self = Self {
            flash,
            ram,
            ..Self::new()
        };
        self.flash.clear();
        self.ram.clear();
        self.recompute_boot_map();
    }

    /// Size the stores and apply protection parameters for a model.
    /// Flash comes up erased (0xFF), RAM zeroed.
    pub fn apply_config(&mut self, config: &HardwareConfig) {
        self.flash = ByteStore::new(config.flash_size());
        self.flash.fill(0, config.flash_size(), 0xFF);
        self.flash.version = config.flash_version;
        self.flash.lower = config.flash_lower as u32;
        self.flash.upper = config.flash_upper as u32;

        self.ram = ByteStore::new(config.ram_size());
        self.ram.version = config.ram_version;
        self.ram.lower = config.ram_lower;
        self.ram.upper = config.ram_upper;

        self.flash_locked = config.flash_locked;
        self.prot_mode = config.prot_mode;
        self.flash_state = FlashState::Read;
        self.recompute_boot_map();
    }

    // ========== Stores ==========

    pub fn flash(&self) -> &ByteStore {
        &self.flash
    }

    /// Mutable flash store. Change the chip version with
    /// [`set_flash_version`](Self::set_flash_version) so the boot map follows.
    pub fn flash_mut(&mut self) -> &mut ByteStore {
        &mut self.flash
    }

    pub fn ram(&self) -> &ByteStore {
        &self.ram
    }

    pub fn ram_mut(&mut self) -> &mut ByteStore {
        &mut self.ram
    }

    pub fn store(&self, kind: StoreKind) -> &ByteStore {
        match kind {
            StoreKind::Ram => &self.ram,
            StoreKind::Flash => &self.flash,
        }
    }

    pub fn store_mut(&mut self, kind: StoreKind) -> &mut ByteStore {
        match kind {
            StoreKind::Ram => &mut self.ram,
            StoreKind::Flash => &mut self.flash,
        }
    }

    pub fn set_flash_version(&mut self, version: u8) {
        self.flash.version = version;
        self.recompute_boot_map();
    }

    // ========== Bank tables ==========

    /// Table selected by the active view
    #[inline]
    pub fn banks(&self) -> &BankTable {
        match self.view {
            BankView::Normal => &self.normal,
            BankView::BootMapped => &self.boot,
        }
    }

    #[inline]
    pub fn bank(&self, index: usize) -> BankSlot {
        self.banks()[index]
    }

    pub fn normal_banks(&self) -> &BankTable {
        &self.normal
    }

    pub fn boot_banks(&self) -> &BankTable {
        &self.boot
    }

    #[inline]
    pub fn view(&self) -> BankView {
        self.view
    }

    pub fn set_view(&mut self, view: BankView) {
        self.view = view;
    }

    #[inline]
    pub fn is_boot_mapped(&self) -> bool {
        self.view == BankView::BootMapped
    }

    /// Map `page` of RAM or flash into `bank` of the normal table.
    /// The last flash page is mapped read-only.
    pub fn change_page(&mut self, bank: usize, page: u16, is_ram: bool) -> CoreResult<()> {
        let read_only = !is_ram && page as usize + 1 == self.flash.pages();
        let slot = BankSlot {
            store: if is_ram { StoreKind::Ram } else { StoreKind::Flash },
            page,
            read_only,
            no_exec: false,
        };
        self.set_normal_bank(bank, slot)
    }

    /// Replace one slot of the normal table
    pub fn set_normal_bank(&mut self, bank: usize, slot: BankSlot) -> CoreResult<()> {
        let entry = self
            .normal
            .get_mut(bank)
            .ok_or(CoreError::BankOutOfRange(bank))?;
        *entry = slot;
        self.recompute_boot_map();
        Ok(())
    }

    /// Map flash page 0 into bank 0 once the boot code has jumped out of it
    pub fn swap_out_boot_page(&mut self) {
        let read_only = self.flash.pages() == 1;
        self.normal[0] = BankSlot {
            read_only,
            ..BankSlot::flash(0)
        };
        self.changed_page0 = true;
        self.recompute_boot_map();
    }

    pub fn set_normal_banks(&mut self, table: BankTable) {
        self.normal = table;
        self.recompute_boot_map();
    }

    fn recompute_boot_map(&mut self) {
        self.boot = bank::derive_boot_map(&self.normal, self.flash.version);
    }

    // ========== Address resolution ==========

    /// Address falls in the port 0x27 overlay (top of bank 3, normal view)
    pub fn in_port27_window(&self, addr: u16) -> bool {
        let floor = 0x10000u32.saturating_sub(REMAP_CHUNK.saturating_mul(self.port27_remap_count));
        !self.is_boot_mapped()
            && self.port27_remap_count > 0
            && bank_of(addr) == 3
            && addr as u32 >= floor
            && addr >= 0xFB64
    }

    /// Address falls in the port 0x28 overlay (start of bank 2, normal view)
    pub fn in_port28_window(&self, addr: u16) -> bool {
        !self.is_boot_mapped()
            && self.port28_remap_count > 0
            && bank_of(addr) == 2
            && (offset_of(addr) as u32) < REMAP_CHUNK.saturating_mul(self.port28_remap_count)
    }

    /// Physical location of a CPU address under the current mapping
    pub fn locate(&self, addr: u16) -> (StoreKind, usize) {
        let bank = bank_of(addr);
        let offset = offset_of(addr);

        if self.in_port27_window(addr) {
            return (StoreKind::Ram, offset);
        }
        if self.in_port28_window(addr) {
            return (StoreKind::Ram, PAGE_SIZE + offset);
        }

        let slot = self.banks()[bank];
        if self.ram.version == 2 && slot.is_ram() && slot.page > 2 {
            return (StoreKind::Ram, 2 * PAGE_SIZE + offset);
        }
        (slot.store, slot.base() + offset)
    }

    /// Plain read: no bus update, no breakpoint checks, no timing
    pub fn read(&self, addr: u16) -> u8 {
        let (kind, index) = self.locate(addr);
        self.store(kind).get(index)
    }

    pub fn read16(&self, addr: u16) -> u16 {
        self.read(addr) as u16 | (self.read(addr.wrapping_add(1)) as u16) << 8
    }

    /// Plain write, ignoring read-only flags and the flash sequencer
    pub fn write(&mut self, addr: u16, value: u8) {
        let (kind, index) = self.locate(addr);
        self.store_mut(kind).set(index, value);
    }

    /// Canonical address of a CPU address under the current mapping
    pub fn addr_to_wide(&self, addr: u16) -> WideAddr {
        let slot = self.bank(bank_of(addr));
        WideAddr::new(slot.page, addr, slot.is_ram())
    }

    pub fn read_canonical(&self, waddr: WideAddr) -> u8 {
        self.store(waddr.store()).get(waddr.index())
    }

    /// Little-endian word; the high byte wraps within the page
    pub fn read_canonical16(&self, waddr: WideAddr) -> u16 {
        let high = WideAddr::new(waddr.page, waddr.offset.wrapping_add(1), waddr.is_ram);
        self.read_canonical(waddr) as u16 | (self.read_canonical(high) as u16) << 8
    }

    // ========== Breakpoints ==========

    pub fn check_break(&self, waddr: WideAddr, kind: u8) -> bool {
        self.store(waddr.store()).is_break(waddr.index(), kind)
    }

    pub fn set_break(&mut self, waddr: WideAddr, kind: u8) {
        self.store_mut(waddr.store())
            .enable_break(waddr.index(), kind, waddr);
    }

    pub fn clear_break(&mut self, waddr: WideAddr, kind: u8) {
        self.store_mut(waddr.store())
            .disable_break(waddr.index(), kind);
    }
}

impl Default for MemoryContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CalcModel;

    fn ti84p() -> MemoryContext {
        let mut mem = MemoryContext::new();
        mem.apply_config(&HardwareConfig::for_model(CalcModel::Ti84p));
        mem.set_normal_banks([
            BankSlot::flash(0x3F),
            BankSlot::flash(0),
            BankSlot::flash(0),
            BankSlot::ram(0),
            BankSlot::EMPTY,
        ]);
        mem
    }

    #[test]
    fn test_change_page_marks_last_flash_page_read_only() {
        let mut mem = ti84p();
        mem.change_page(1, 0x3F, false).unwrap();
        assert!(mem.normal_banks()[1].read_only);
        mem.change_page(1, 0x3E, false).unwrap();
        assert!(!mem.normal_banks()[1].read_only);
        mem.change_page(2, 0x3F, true).unwrap();
        assert!(!mem.normal_banks()[2].read_only);
        assert_eq!(mem.change_page(5, 0, true), Err(CoreError::BankOutOfRange(5)));
    }

    #[test]
    fn test_boot_map_follows_change_page() {
        let mut mem = ti84p();
        for page in [0x01, 0x02, 0x1B, 0x3F] {
            mem.change_page(1, page, false).unwrap();
            assert_eq!(mem.boot_banks()[1].page, page & 0xFE);
            assert_eq!(mem.boot_banks()[2].page, page | 1);
        }
        mem.change_page(2, 0x05, true).unwrap();
        assert_eq!(mem.boot_banks()[3], BankSlot::ram(5));
    }

    #[test]
    fn test_flash_version_recomputes_boot_map() {
        let mut mem = ti84p();
        mem.change_page(1, 0x04, false).unwrap();
        assert_eq!(mem.boot_banks()[2].page, 0x05);
        mem.set_flash_version(1);
        assert_eq!(mem.boot_banks()[2].page, 0x04);
    }

    #[test]
    fn test_view_switch_selects_table() {
        let mut mem = ti84p();
        mem.change_page(1, 0x03, false).unwrap();
        mem.set_view(BankView::BootMapped);
        assert_eq!(mem.bank(1).page, 0x02);
        mem.set_view(BankView::Normal);
        assert_eq!(mem.bank(1).page, 0x03);
    }

    #[test]
    fn test_read_write_through_banks() {
        let mut mem = ti84p();
        mem.change_page(2, 1, true).unwrap();
        mem.write(0x8010, 0x42);
        assert_eq!(mem.ram().get(PAGE_SIZE + 0x10), 0x42);
        assert_eq!(mem.read(0x8010), 0x42);

        mem.write(0xC000, 0x34);
        mem.write(0xC001, 0x12);
        assert_eq!(mem.read16(0xC000), 0x1234);
    }

    #[test]
    fn test_port27_window() {
        let mut mem = ti84p();
        mem.change_page(3, 4, true).unwrap();
        mem.port27_remap_count = 2;

        // Top 128 bytes of bank 3 show the start of RAM page 0
        mem.write(0xFF80, 0x11);
        assert_eq!(mem.locate(0xFF80), (StoreKind::Ram, 0x3F80));
        assert_eq!(mem.ram().get(0x3F80), 0x11);
        // Just below the window resolves through the bank
        assert_eq!(mem.locate(0xFF7F), (StoreKind::Ram, 4 * PAGE_SIZE + 0x3F7F));

        // Window is ignored while boot-mapped
        mem.set_view(BankView::BootMapped);
        assert_ne!(mem.locate(0xFF80), (StoreKind::Ram, 0x3F80));
    }

    #[test]
    fn test_port27_window_floor() {
        let mut mem = ti84p();
        mem.port27_remap_count = 40;
        // 40 chunks would reach 0xF600, the window never starts below 0xFB64
        assert_eq!(mem.locate(0xFB63), (StoreKind::Ram, 0x3B63));
        assert_eq!(mem.locate(0xFB64).1, 0x3B64);
        mem.change_page(3, 1, true).unwrap();
        assert_eq!(mem.locate(0xFB63), (StoreKind::Ram, PAGE_SIZE + 0x3B63));
        assert_eq!(mem.locate(0xFB64), (StoreKind::Ram, 0x3B64));
    }

    #[test]
    fn test_port28_window() {
        let mut mem = ti84p();
        mem.port28_remap_count = 1;
        assert_eq!(mem.locate(0x8000), (StoreKind::Ram, PAGE_SIZE));
        assert_eq!(mem.locate(0x803F), (StoreKind::Ram, PAGE_SIZE + 0x3F));
        assert_eq!(mem.locate(0x8040), (StoreKind::Flash, 0x40));
    }

    #[test]
    fn test_ram_v2_shadows_high_pages() {
        let mut mem = MemoryContext::new();
        let mut config = HardwareConfig::for_model(CalcModel::Ti83pse);
        config.ram_version = 2;
        mem.apply_config(&config);
        mem.change_page(2, 5, true).unwrap();
        mem.write(0x8001, 0x77);
        assert_eq!(mem.ram().get(2 * PAGE_SIZE + 1), 0x77);
        assert_eq!(mem.locate(0x8001), (StoreKind::Ram, 2 * PAGE_SIZE + 1));
    }

    #[test]
    fn test_se_preset_ram_pages_are_distinct() {
        let mut mem = MemoryContext::new();
        mem.apply_config(&HardwareConfig::for_model(CalcModel::Ti83pse));
        assert_eq!(mem.ram().pages(), 8);

        for page in 3..8u16 {
            mem.change_page(3, page, true).unwrap();
            mem.write(0xC000, 0x10 + page as u8);
        }
        for page in 3..8u16 {
            mem.change_page(3, page, true).unwrap();
            assert_eq!(mem.read(0xC000), 0x10 + page as u8);
            assert_eq!(mem.ram().get(page as usize * PAGE_SIZE), 0x10 + page as u8);
        }
        assert_eq!(mem.ram().get(2 * PAGE_SIZE), 0x00);
    }

    #[test]
    fn test_canonical_address_survives_remap() {
        let mut mem = ti84p();
        mem.change_page(1, 1, true).unwrap();
        mem.write(0x4123, 0x99);
        let waddr = mem.addr_to_wide(0x4123);
        assert_eq!(waddr, WideAddr::new(1, 0x0123, true));

        mem.change_page(1, 0, false).unwrap();
        mem.change_page(2, 1, true).unwrap();
        assert_eq!(mem.read_canonical(waddr), 0x99);
        assert_eq!(mem.read(0x8123), 0x99);
    }

    #[test]
    fn test_ram_round_trip_in_both_views() {
        let mut mem = ti84p();
        // Normal bank 2 RAM page 1 appears as boot bank 3
        mem.change_page(2, 1, true).unwrap();
        for value in [0u8, 0x5A, 0xFF] {
            mem.write(0x8200, value);
            mem.set_view(BankView::BootMapped);
            assert_eq!(mem.read(0xC200), value);
            mem.write(0xC201, value ^ 0xFF);
            mem.set_view(BankView::Normal);
            assert_eq!(mem.read(0x8201), value ^ 0xFF);
            assert_eq!(mem.read_canonical(WideAddr::new(1, 0x201, true)), value ^ 0xFF);
        }
    }

    #[test]
    fn test_breakpoints_by_canonical_address() {
        let mut mem = ti84p();
        let waddr = WideAddr::new(0, 0x0010, true);
        mem.set_break(waddr, break_kind::MEM_WRITE);
        assert!(mem.check_break(mem.addr_to_wide(0xC010), break_kind::MEM_WRITE));
        assert!(!mem.check_break(mem.addr_to_wide(0xC010), break_kind::MEM_READ));
        mem.clear_break(waddr, break_kind::MEM_WRITE);
        assert!(!mem.check_break(waddr, break_kind::MEM_WRITE));
    }

    #[test]
    fn test_clear_keeps_sizes() {
        let mut mem = ti84p();
        mem.port27_remap_count = 3;
        mem.write(0xC000, 1);
        mem.clear();
        assert_eq!(mem.port27_remap_count, 0);
        assert_eq!(mem.ram().get(0), 0);
        assert_eq!(mem.flash().pages(), 64);
    }
}
