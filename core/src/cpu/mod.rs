//! Z80 execution core for TI-8x calculators
//!
//! The CPU owns the register file, the bus latch, the memory/timer/PIO
//! contexts and the debug facilities. Instruction semantics live in an
//! external [`OpcodeTables`]; the core only fetches, dispatches and accounts
//! for time.
//!
//! # Module Organization
//!
//! - `registers`: byte views of register pairs, exchanges, stack helpers
//! - `flags`: F register bit constants
//! - `bus`: memory and port access with timing, breakpoints and protection
//! - `dispatch`: opcode tables and prefix routers
//! - `hooks`: optional callbacks into the front end
//!
//! # Lifecycle
//!
//! `new` → `init` → `configure` → `reset`, then repeated `step` calls.
//!
//! # References
//! - Zilog Z80 CPU User Manual (UM0080)
//! - WikiTI hardware documentation (https://wikiti.brandonw.net)

mod bus;
pub mod dispatch;
pub mod flags;
mod hooks;
mod registers;

#[cfg(test)]
pub(crate) mod tests;

pub use dispatch::{IndexedCbFn, OpFn, OpcodeTables, ReverseFn};
pub use hooks::{CpuHook, CpuHooks, HookKind};

use crate::error::CoreResult;
use crate::history::History;
use crate::logging::log_event;
use crate::memory::{bank_of, offset_of, BankSlot, BankView, MemoryContext};
use crate::model::{CalcModel, HardwareConfig};
use crate::pio::PioContext;
use crate::profiler::Profiler;
use crate::timer::TimerContext;

/// T-states per HALT step are `4 * HALT_SCALE`; R advances by `HALT_SCALE`
pub const HALT_SCALE: u8 = 3;

/// Extra T-states for a mode 1 interrupt acknowledge (on top of RST 38h)
const IM1_TSTATES: u64 = 8;
/// T-states for a mode 2 interrupt acknowledge and vector fetch
const IM2_TSTATES: u64 = 19;

/// Interrupt modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterruptMode {
    /// Mode 0: execute the byte on the data bus
    #[default]
    Mode0,
    /// Mode 1: RST 38h
    Mode1,
    /// Mode 2: vector through the table at (I << 8) | bus
    Mode2,
}

/// Z80 CPU and the machine state it drives
pub struct Cpu {
    // Main registers
    pub a: u8,
    pub f: u8,
    pub bc: u16,
    pub de: u16,
    pub hl: u16,

    // Shadow registers (EX AF,AF' and EXX)
    pub a_prime: u8,
    pub f_prime: u8,
    pub bc_prime: u16,
    pub de_prime: u16,
    pub hl_prime: u16,

    pub ix: u16,
    pub iy: u16,
    pub sp: u16,
    pub pc: u16,
    /// Interrupt vector page
    pub i: u8,
    /// Refresh register (7-bit counter, bit 7 preserved)
    pub r: u8,

    pub iff1: bool,
    pub iff2: bool,
    pub im: InterruptMode,
    pub halted: bool,

    /// Data bus latch: last byte read or written
    pub bus: u8,
    /// A device must clear this to acknowledge an `IN`
    pub input: bool,
    /// A device must clear this to acknowledge an `OUT`
    pub output: bool,
    pub read: bool,
    pub write: bool,
    /// Interrupt line raised during this step
    pub interrupt: bool,
    /// Set by EI to hold off delivery until after the next instruction
    pub ei_block: bool,
    /// Active DD/FD prefix byte, 0 when none
    pub prefix: u8,
    /// Set by RET-class instructions, cleared before each opcode
    pub returned: bool,

    // Model parameters
    pub model: Option<CalcModel>,
    pub cpu_version: u8,
    pub model_bits: u8,

    pub mem: MemoryContext,
    pub timer: TimerContext,
    pub pio: PioContext,
    pub profiler: Profiler,
    pub history: History,
    pub hooks: CpuHooks,

    tables: &'static OpcodeTables,
}

impl Cpu {
    /// Create an unconfigured CPU dispatching through `tables`
    pub fn new(tables: &'static OpcodeTables) -> Self {
        Self {
            a: 0,
            f: 0,
            bc: 0,
            de: 0,
            hl: 0,
            a_prime: 0,
            f_prime: 0,
            bc_prime: 0,
            de_prime: 0,
            hl_prime: 0,
            ix: 0,
            iy: 0,
            sp: 0,
            pc: 0,
            i: 0,
            r: 0,
            iff1: false,
            iff2: false,
            im: InterruptMode::Mode0,
            halted: false,
            bus: 0,
            input: false,
            output: false,
            read: false,
            write: false,
            interrupt: false,
            ei_block: false,
            prefix: 0,
            returned: false,
            model: None,
            cpu_version: 0,
            model_bits: 0,
            mem: MemoryContext::new(),
            timer: TimerContext::default(),
            pio: PioContext::new(),
            profiler: Profiler::new(),
            history: History::new(),
            hooks: CpuHooks::default(),
            tables,
        }
    }

    pub fn tables(&self) -> &'static OpcodeTables {
        self.tables
    }

    // ========== Lifecycle ==========

    /// Clear all state, devices and hooks
    pub fn init(&mut self) {
        self.clear_registers();
        self.im = InterruptMode::Mode0;
        self.model = None;
        self.cpu_version = 0;
        self.model_bits = 0;

        self.mem.clear();
        self.mem.flash_write_delay = 200;
        self.timer.reset();
        self.pio = PioContext::new();
        self.profiler.clear();
        self.history.clear();
        self.hooks.clear();
        log_event("cpu init");
    }

    /// Size memory and apply protection parameters for `model`
    pub fn configure(&mut self, model: CalcModel, config: &HardwareConfig) {
        self.model = Some(model);
        self.cpu_version = config.cpu_version;
        self.model_bits = config.model_bits;
        self.mem.apply_config(config);
        self.timer.freq = config.clock_hz;
        self.install_power_on_banks();
        log_event(&format!(
            "configured {} ({} flash pages, {} RAM pages)",
            model.name(),
            config.flash_pages,
            config.ram_pages
        ));
    }

    /// Configure from a numeric model id with the model's preset
    pub fn configure_model_id(&mut self, id: i32) -> CoreResult<()> {
        let model = CalcModel::try_from(id)?;
        self.configure(model, &HardwareConfig::for_model(model));
        Ok(())
    }

    /// Power-on reset: zero registers, restore the model's bank layout.
    /// Memory contents are kept.
    pub fn reset(&mut self) {
        self.clear_registers();
        self.im = InterruptMode::Mode1;

        self.mem.port27_remap_count = 0;
        self.mem.port28_remap_count = 0;
        self.mem.ram_mut().lower = 0;
        self.mem.ram_mut().upper = 0x3FF;
        self.mem.set_view(BankView::Normal);
        self.mem.changed_page0 = false;
        self.mem.protected_page = [0; 4];
        self.mem.protected_page_set = 0;

        self.history.clear();
        self.install_power_on_banks();
        log_event("cpu reset");
    }

    fn clear_registers(&mut self) {
        self.a = 0;
        self.f = 0;
        self.bc = 0;
        self.de = 0;
        self.hl = 0;
        self.a_prime = 0;
        self.f_prime = 0;
        self.bc_prime = 0;
        self.de_prime = 0;
        self.hl_prime = 0;
        self.ix = 0;
        self.iy = 0;
        self.sp = 0;
        self.pc = 0;
        self.i = 0;
        self.r = 0;
        self.bus = 0;

        self.iff1 = false;
        self.iff2 = false;
        self.halted = false;
        self.input = false;
        self.output = false;
        self.read = false;
        self.write = false;
        self.interrupt = false;
        self.ei_block = false;
        self.prefix = 0;
        self.returned = false;
    }

    /// Bank layout the model's hardware comes up with
    fn install_power_on_banks(&mut self) {
        let Some(model) = self.model else {
            log::warn!("Unhandled model");
            return;
        };
        let layout = match model {
            CalcModel::Ti81 => [BankSlot::flash(0), BankSlot::flash(1), BankSlot::flash(1)],
            CalcModel::Ti82 | CalcModel::Ti83 => {
                [BankSlot::flash(0), BankSlot::flash(0), BankSlot::ram(1)]
            }
            CalcModel::Ti85 | CalcModel::Ti86 => {
                [BankSlot::flash(0), BankSlot::flash(0x0F), BankSlot::flash(0)]
            }
            _ => {
                let boot_page = self.mem.flash().pages().saturating_sub(1) as u16;
                [BankSlot::flash(boot_page), BankSlot::flash(0), BankSlot::flash(0)]
            }
        };
        self.mem.set_normal_banks([
            layout[0],
            layout[1],
            layout[2],
            BankSlot::ram(0),
            BankSlot::EMPTY,
        ]);
    }

    // ========== Execution ==========

    /// Execute one instruction (or one HALT cycle), poll devices and
    /// deliver a pending interrupt. Returns the T-states consumed.
    pub fn step(&mut self) -> u32 {
        self.interrupt = false;
        self.ei_block = false;

        let old_pc = self.pc;
        let old_tstates = self.timer.tstates;

        self.add_history();

        if self.halted {
            self.timer.add(4 * HALT_SCALE as u64);
            self.bump_r(HALT_SCALE);
        } else {
            self.fetch_opcode();
            self.run_opcode();
        }

        self.poll_interrupts();

        if self.interrupt && !self.ei_block {
            // LD A,I / LD A,R interrupted: PV reads back as 0
            let prefix = self.mem.read(self.pc.wrapping_sub(2));
            let opcode = self.mem.read(self.pc.wrapping_sub(1));
            if prefix == 0xED && (opcode == 0x57 || opcode == 0x5F) {
                self.f &= !flags::PV;
            }
            self.handle_interrupt();
        }

        let elapsed = self.timer.tstates - old_tstates;
        if self.profiler.running {
            let slot = self.mem.bank(bank_of(old_pc));
            self.profiler
                .record(slot.is_ram(), slot.page, offset_of(old_pc) as u16, elapsed);
        }

        elapsed as u32
    }

    /// Run the base-table entry for the byte on the bus
    pub fn run_opcode(&mut self) {
        self.returned = false;
        let index = self.bus as usize;
        if let Some(reverse) = self.tables.reverse[index] {
            reverse(self);
        }
        let op = self.tables.base[index];
        let cost = op(self);
        self.timer.add(cost as u64);
    }

    fn add_history(&mut self) {
        self.history.record(self.f, self.bus, self.r);
    }

    fn handle_interrupt(&mut self) {
        if !self.iff1 {
            return;
        }
        self.iff1 = false;
        self.iff2 = false;

        match self.im {
            InterruptMode::Mode0 => {
                self.halted = false;
                self.run_opcode();
            }
            InterruptMode::Mode1 => {
                self.timer.add(IM1_TSTATES);
                self.halted = false;
                self.bus = 0xFF;
                self.add_history();
                self.run_opcode();
            }
            InterruptMode::Mode2 => {
                self.timer.add(IM2_TSTATES);
                self.halted = false;
                let vector = (self.i as u16) << 8 | self.bus as u16;
                let lo = self.mem_read(vector);
                let hi = self.mem_read(vector.wrapping_add(1));
                self.push16(self.pc);
                self.pc = (hi as u16) << 8 | lo as u16;
            }
        }
    }

    /// Tick every interrupt entry, newest first, running devices that fire
    fn poll_interrupts(&mut self) {
        for index in (0..self.pio.interrupts().len()).rev() {
            let Some(entry) = self.pio.interrupt_mut(index) else {
                continue;
            };
            let (fired, device) = (entry.tick(), entry.device);
            if let (true, Some(port)) = (fired, device) {
                self.run_device(port);
            }
        }
    }

    /// Run the device at `port` if present and active
    pub(crate) fn run_device(&mut self, port: u8) {
        if let Some(mut device) = self.pio.take_device(port) {
            if device.is_active() {
                device.run(self);
            }
            self.pio.restore_device(port, device);
        }
    }

    // ========== Devices ==========

    /// Deactivate every device and empty the interrupt chain
    pub fn clear_devices(&mut self) {
        self.pio.clear_devices();
    }

    /// Port 0x20 speed code for the current clock
    pub fn cpu_speed(&self) -> u8 {
        self.timer.cpu_speed()
    }
}
