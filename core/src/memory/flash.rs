//! JEDEC flash command sequencer
//!
//! Writes to flash never store directly. They drive a small state machine:
//!
//! ```text
//! Read --AA@AAA--> SawAA --55@555--> Saw55 --cmd@AAA--> Program | Erase | FastMode | Autoselect
//! Erase --AA@AAA--> EraseSawAA --55@555--> EraseSaw55 --10@AAA--> chip erase
//!                                                     --30------> sector erase
//! FastMode --A0--> FastModeProgram --byte--> FastMode
//! FastMode --90--> FastModeExit --any--> FastMode
//! ```
//!
//! Only the low 12 address bits are compared during the unlock handshake.
//! A write of 0xF0 outside a program cycle returns to Read. Anything out of
//! sequence is a protocol violation: the caller runs its invalid-flash hook
//! and then calls [`MemoryContext::end_flash`].
//!
//! Programming can only clear bits (`dest &= value`); erasing sets them.
//!
//! # References
//! - AMD Am29F400B / Am29LV160D datasheets (command definitions)

use crate::model::CalcModel;

use super::{bank_of, break_kind, offset_of, MemoryContext, PAGE_SIZE};

/// Command bytes accepted after the unlock handshake
pub mod command {
    pub const PROGRAM: u8 = 0xA0;
    pub const ERASE: u8 = 0x80;
    pub const FASTMODE: u8 = 0x20;
    pub const AUTOSELECT: u8 = 0x90;
    pub const FASTMODE_EXIT: u8 = 0x90;
    pub const FASTMODE_PROG: u8 = 0xA0;
    pub const CHIP_ERASE: u8 = 0x10;
    pub const SECTOR_ERASE: u8 = 0x30;
    pub const RESET: u8 = 0xF0;
}

/// Sequencer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlashState {
    #[default]
    Read,
    SawAA,
    Saw55,
    Program,
    Erase,
    EraseSawAA,
    EraseSaw55,
    FastMode,
    FastModeProgram,
    FastModeExit,
    Autoselect,
    Error,
}

/// Side effects of a flash write that the CPU must act on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub struct FlashSignals {
    /// Protocol violation: fire the invalid-flash hook, then `end_flash`
    pub invalid: bool,
    /// Number of written bytes that carry a write breakpoint
    pub write_breaks: u32,
}

/// Result of a read through the sequencer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct FlashRead {
    pub value: u8,
    pub invalid: bool,
}

/// Autoselect device id reported at offset 2
pub fn device_id(model: Option<CalcModel>, cpu_version: u8) -> u8 {
    match model {
        Some(CalcModel::Ti84p) => 0xDA,
        Some(CalcModel::Ti83pse | CalcModel::Ti84pse) => 0xC4,
        _ if cpu_version == 1 => 0x23,
        _ => 0xB9,
    }
}

#[inline]
fn low12(addr: u16) -> u16 {
    addr & 0x0FFF
}

impl MemoryContext {
    /// Return to array read mode (unless the chip is latched in Error)
    pub fn end_flash(&mut self) {
        if self.flash_state != FlashState::Error {
            self.flash_state = FlashState::Read;
        }
    }

    /// Read a byte from a flash bank through the sequencer
    pub fn flash_read(&mut self, addr: u16, device_id: u8) -> FlashRead {
        if self.flash_error {
            let value = ((!self.flash_write_byte & 0x80) | 0x20) | self.flash_toggles;
            self.flash_toggles ^= 0x40;
            self.flash_error = false;
            return FlashRead {
                value,
                invalid: false,
            };
        }

        match self.flash_state {
            FlashState::Read | FlashState::FastMode => FlashRead {
                value: self.read(addr),
                invalid: false,
            },
            FlashState::Autoselect => match offset_of(addr) {
                0 => FlashRead {
                    value: 0x01,
                    invalid: false,
                },
                2 => FlashRead {
                    value: device_id,
                    invalid: false,
                },
                4 => FlashRead {
                    value: 0x00,
                    invalid: false,
                },
                _ => FlashRead {
                    value: 0x00,
                    invalid: true,
                },
            },
            _ => FlashRead {
                value: self.read(addr),
                invalid: true,
            },
        }
    }

    /// Feed one written byte to the sequencer
    pub fn flash_write(&mut self, addr: u16, data: u8) -> FlashSignals {
        let mut signals = FlashSignals::default();

        if data == command::RESET
            && !matches!(
                self.flash_state,
                FlashState::Program | FlashState::FastModeProgram
            )
        {
            self.end_flash();
            return signals;
        }

        self.flash_error = false;
        let at_aaa = low12(addr) == 0x0AAA;
        let at_555 = low12(addr) == 0x0555;

        match self.flash_state {
            FlashState::Read if at_aaa && data == 0xAA => self.flash_state = FlashState::SawAA,
            FlashState::SawAA if at_555 && data == 0x55 => self.flash_state = FlashState::Saw55,
            FlashState::Saw55 if at_aaa => match data {
                command::PROGRAM => self.flash_state = FlashState::Program,
                command::ERASE => self.flash_state = FlashState::Erase,
                command::FASTMODE if self.flash().version != 1 => {
                    self.flash_state = FlashState::FastMode
                }
                command::AUTOSELECT => self.flash_state = FlashState::Autoselect,
                _ => signals.invalid = true,
            },
            FlashState::Program => {
                signals.write_breaks += self.program_byte(addr, data);
                self.end_flash();
            }
            FlashState::Erase if at_aaa && data == 0xAA => {
                self.flash_state = FlashState::EraseSawAA
            }
            FlashState::EraseSawAA if at_555 && data == 0x55 => {
                self.flash_state = FlashState::EraseSaw55
            }
            FlashState::EraseSaw55 => {
                if at_aaa && data == command::CHIP_ERASE {
                    let size = self.flash().size();
                    signals.write_breaks += self.erase_range(0, size);
                } else if data == command::SECTOR_ERASE {
                    match self.sector_bounds(addr) {
                        Some((start, end)) => signals.write_breaks += self.erase_range(start, end),
                        None => {
                            signals.invalid = true;
                            return signals;
                        }
                    }
                } else {
                    signals.invalid = true;
                }
                self.end_flash();
            }
            FlashState::FastMode => match data {
                command::FASTMODE_EXIT => self.flash_state = FlashState::FastModeExit,
                command::FASTMODE_PROG => self.flash_state = FlashState::FastModeProgram,
                _ => signals.invalid = true,
            },
            FlashState::FastModeExit => self.flash_state = FlashState::FastMode,
            FlashState::FastModeProgram => {
                signals.write_breaks += self.program_byte(addr, data);
                self.flash_state = FlashState::FastMode;
            }
            // Re-issuing the unlock from autoselect starts a new command
            FlashState::Autoselect if at_aaa && data == 0xAA => {
                self.flash_state = FlashState::SawAA
            }
            _ => signals.invalid = true,
        }

        signals
    }

    /// Program one byte at `addr`; returns 1 if it carries a write breakpoint
    fn program_byte(&mut self, addr: u16, data: u8) -> u32 {
        let slot = self.bank(bank_of(addr));
        let index = slot.base() + offset_of(addr);
        let store = self.store_mut(slot.store);
        let programmed = store.get(index) & data;
        store.set(index, programmed);

        self.flash_write_byte = data;
        if programmed != data {
            self.flash_error = true;
        }
        self.flash_state = FlashState::Read;

        u32::from(self.check_break(self.addr_to_wide(addr), break_kind::MEM_WRITE))
    }

    /// Erase `[start, end)` of flash to 0xFF, counting write breakpoints hit
    fn erase_range(&mut self, start: usize, end: usize) -> u32 {
        let flash = self.flash_mut();
        let end = end.min(flash.size());
        let mut hits = 0;
        for index in start..end {
            flash.set(index, 0xFF);
            if flash.is_break(index, break_kind::MEM_WRITE) {
                hits += 1;
            }
        }
        hits
    }

    /// Physical byte range of the sector containing `addr`.
    ///
    /// Sectors are 64KB except in the last four pages, which hold a 32KB
    /// sector, two 8KB parameter sectors and the 16KB boot sector.
    fn sector_bounds(&self, addr: u16) -> Option<(usize, usize)> {
        let page = self.bank(bank_of(addr)).page as usize;
        let spage = (page << 1) + ((addr as usize >> 13) & 1);
        let pages = self.flash().pages();
        let total = pages << 1;
        // Chips too small for the parameter sector layout erase nothing
        if pages < 4 {
            return None;
        }

        if spage + 8 < total {
            let start = (spage & 0x1FF) << 13;
            Some((start, start + (PAGE_SIZE << 2)))
        } else if spage + 4 < total {
            Some(((pages - 4) * PAGE_SIZE, (pages - 2) * PAGE_SIZE))
        } else if spage + 3 < total {
            let start = (pages - 2) * PAGE_SIZE;
            Some((start, start + PAGE_SIZE / 2))
        } else if spage + 2 < total {
            Some(((pages - 2) * PAGE_SIZE + PAGE_SIZE / 2, (pages - 1) * PAGE_SIZE))
        } else if spage < total {
            Some(((pages - 1) * PAGE_SIZE, pages * PAGE_SIZE))
        } else {
            None
        }
    }
}
