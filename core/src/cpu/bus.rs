//! Bus access from the CPU's side
//!
//! Every access the CPU makes goes through here: opcode fetches, data
//! reads and writes, and port I/O. This is where timing penalties are
//! charged, memory breakpoints fire and the flash and execution
//! protection rules are enforced.

use super::{Cpu, HookKind};
use crate::memory::flash::{self, FlashSignals, FlashState};
use crate::memory::{bank_of, break_kind, offset_of, PAGE_SIZE};
use crate::model::CalcModel;

impl Cpu {
    // ========== Memory ==========

    /// Fetch the opcode byte at PC onto the bus, advancing PC and R
    pub fn fetch_opcode(&mut self) {
        let bank_num = bank_of(self.pc);
        let slot = self.mem.bank(bank_num);

        // The boot code leaves page 0 mapped until it first jumps into bank 1
        if !self.mem.changed_page0
            && !slot.is_ram()
            && (bank_num == 1 || (self.mem.is_boot_mapped() && bank_num == 2))
        {
            self.mem.swap_out_boot_page();
        }

        if !self.is_allowed_exec() && !self.fire_hook(HookKind::ExeViolation) {
            log::warn!("Execution when not allowed - resetting");
            self.reset();
        }

        let slot = self.mem.bank(bank_of(self.pc));
        self.bus = if !slot.is_ram() && self.mem.flash_state != FlashState::Read {
            self.flash_read(self.pc)
        } else {
            self.mem.read(self.pc)
        };

        let penalty = if slot.is_ram() {
            self.mem.read_op_ram_tstates
        } else {
            self.mem.read_op_flash_tstates
        };
        self.timer.add_for_model(self.model, penalty as u64);

        self.pc = self.pc.wrapping_add(1);
        self.bump_r(1);
    }

    /// Data read through the bus: breakpoints, flash sequencer and timing
    pub fn mem_read(&mut self, addr: u16) -> u8 {
        if self
            .mem
            .check_break(self.mem.addr_to_wide(addr), break_kind::MEM_READ)
        {
            self.fire_hook(HookKind::MemReadBreak);
        }

        let value = if self.mem.bank(bank_of(addr)).is_ram() {
            let value = self.mem.read(addr);
            self.timer
                .add_for_model(self.model, self.mem.read_nop_ram_tstates as u64);
            value
        } else {
            let value = self.flash_read(addr);
            self.timer
                .add_for_model(self.model, self.mem.read_nop_flash_tstates as u64);
            value
        };
        self.bus = value;
        value
    }

    /// Data write through the bus. RAM writes honor read-only banks; flash
    /// writes go to the command sequencer if the page may be written.
    pub fn mem_write(&mut self, addr: u16, value: u8) {
        let slot = self.mem.bank(bank_of(addr));

        if slot.is_ram() {
            if !slot.read_only {
                self.mem.write(addr, value);
                if self
                    .mem
                    .check_break(self.mem.addr_to_wide(addr), break_kind::MEM_WRITE)
                {
                    self.fire_hook(HookKind::MemWriteBreak);
                }
            }
            self.timer
                .add_for_model(self.model, self.mem.write_ram_tstates as u64);
        } else {
            if self.is_flash_write_legal(slot.page) {
                let signals = self.mem.flash_write(addr, value);
                self.apply_flash_signals(signals);
            } else {
                self.fire_hook(HookKind::InvalidFlash);
            }
            self.timer
                .add_for_model(self.model, self.mem.write_flash_tstates as u64);
        }

        self.bus = value;
    }

    fn flash_read(&mut self, addr: u16) -> u8 {
        let id = flash::device_id(self.model, self.cpu_version);
        let read = self.mem.flash_read(addr, id);
        if read.invalid {
            self.flash_violation();
        }
        read.value
    }

    fn apply_flash_signals(&mut self, signals: FlashSignals) {
        for _ in 0..signals.write_breaks {
            self.fire_hook(HookKind::MemWriteBreak);
        }
        if signals.invalid {
            self.flash_violation();
        }
    }

    /// Out-of-sequence flash command: report, then back to read mode
    fn flash_violation(&mut self) {
        if !self.fire_hook(HookKind::InvalidFlash) {
            log::debug!(
                "flash command sequence aborted in state {:?}",
                self.mem.flash_state
            );
        }
        self.mem.end_flash();
    }

    // ========== Protection ==========

    /// Whether a write to flash `page` reaches the sequencer
    pub fn is_flash_write_legal(&self, page: u16) -> bool {
        let bits = self.model_bits;
        !self.mem.flash_locked
            && self.model >= Some(CalcModel::Ti73)
            && ((page != 0x3F && page != 0x2F) || bits & 0x03 != 0)
            && ((page != 0x7F && page != 0x6F) || bits & 0x02 != 0 || bits & 0x01 == 0)
    }

    /// Whether the page under PC may execute
    pub fn is_allowed_exec(&self) -> bool {
        let slot = self.mem.bank(bank_of(self.pc));
        let page = slot.page;

        if self.model <= Some(CalcModel::Ti83p) {
            if slot.is_ram() {
                let prot = self.mem.protected_page[3];
                if prot & 0x01 != 0 && page == 0 {
                    return false;
                }
                return prot & 0x20 == 0 || page != 1;
            }
            if !(0x08..0x1C).contains(&page) {
                return true;
            }
            let index = (page - 8) as usize;
            let prot = self.mem.protected_page[index / 8];
            return prot & (1 << (index % 8)) == 0;
        }

        if !slot.is_ram() {
            let flash = self.mem.flash();
            return page as u32 <= flash.lower || page as u32 > flash.upper;
        }

        let odd_mask = 2u16.checked_shr(u32::from(self.mem.prot_mode) + 1).unwrap_or(0);
        if page & odd_mask != 0 {
            return true;
        }

        let offset = offset_of(self.pc);
        let global = if self.mem.in_port27_window(self.pc) {
            offset
        } else if self.mem.in_port28_window(self.pc) {
            PAGE_SIZE + offset
        } else {
            page as usize * PAGE_SIZE + offset
        };
        let global = global as u32;

        let ram = self.mem.ram();
        ram.lower <= global && global <= ram.upper
    }

    /// Whether PC sits on a boot, certificate or other privileged flash page
    pub fn is_privileged_page(&self) -> bool {
        let slot = self.mem.bank(bank_of(self.pc));
        if slot.is_ram() {
            return false;
        }
        let max_pages = self.mem.flash().pages();
        let page = slot.page as usize;

        (page + 4 >= max_pages && page + 2 != max_pages)
            || (self.model >= Some(CalcModel::Ti84p) && max_pages.checked_sub(0x11) == Some(page))
    }

    // ========== Ports ==========

    /// `OUT (port),bus`: hand the bus value to the device at `port`
    pub fn device_output(&mut self, port: u8) {
        let Some(mut device) = self.pio.take_device(port) else {
            return;
        };
        if !device.is_active() {
            self.pio.restore_device(port, device);
            return;
        }

        self.output = true;
        self.pio.set_most_recent_output(port, self.bus);
        if !device.is_protected() || !self.mem.flash_locked {
            device.run(self);
        }
        let breakpoint = device.is_breakpoint();
        self.pio.restore_device(port, device);

        if breakpoint {
            self.fire_pio_breakpoint();
        }
        if self.output {
            log::warn!("Device {} not responding for output", port);
            self.output = false;
        }
    }

    /// `IN bus,(port)`: let the device at `port` drive the bus.
    /// Absent, inactive or silent devices read as 0xFF.
    pub fn device_input(&mut self, port: u8) {
        let (active, breakpoint) = match self.pio.device(port) {
            Some(device) => (device.is_active(), device.is_breakpoint()),
            None => (false, false),
        };
        if !active {
            self.bus = 0xFF;
            return;
        }

        self.input = true;
        if breakpoint {
            self.fire_pio_breakpoint();
        }
        self.run_device(port);

        if self.input {
            log::warn!("Device {} not responding for input", port);
            self.input = false;
            self.bus = 0xFF;
            self.pio.set_most_recent_input(port, 0xFF);
            return;
        }
        self.pio.set_most_recent_input(port, self.bus);
    }

    /// Write `value` to `port`
    pub fn port_out(&mut self, port: u8, value: u8) {
        self.bus = value;
        self.device_output(port);
    }

    /// Read from `port`
    pub fn port_in(&mut self, port: u8) -> u8 {
        self.device_input(port);
        self.bus
    }

    fn fire_pio_breakpoint(&mut self) {
        if let Some(mut hook) = self.pio.breakpoint_hook.take() {
            hook(self);
            if self.pio.breakpoint_hook.is_none() {
                self.pio.breakpoint_hook = Some(hook);
            }
        }
    }
}
