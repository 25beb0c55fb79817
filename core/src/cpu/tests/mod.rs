//! CPU tests
//!
//! The core carries no instruction set of its own, so these tests run a
//! small opcode table covering what the fetch/dispatch, interrupt and bus
//! paths need:
//! - step.rs: reset state, step timing, HALT, interrupt delivery
//! - bus.rs: memory and port access, protection, profiler and history
//! - flash.rs: flash command sequences driven through CPU writes

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::OnceLock;

use super::*;
use crate::pio::Device;

mod flash;

// ========== Test opcode table ==========

fn op_nop(_: &mut Cpu) -> u32 {
    4
}

fn op_indexed_nop(_: &mut Cpu, _: i8) -> u32 {
    8
}

fn op_halt(cpu: &mut Cpu) -> u32 {
    cpu.halted = true;
    4
}

fn op_ei(cpu: &mut Cpu) -> u32 {
    cpu.iff1 = true;
    cpu.iff2 = true;
    cpu.ei_block = true;
    4
}

fn op_di(cpu: &mut Cpu) -> u32 {
    cpu.iff1 = false;
    cpu.iff2 = false;
    4
}

fn op_ld_a_n(cpu: &mut Cpu) -> u32 {
    cpu.a = cpu.fetch_operand();
    7
}

fn op_ld_hl_nn(cpu: &mut Cpu) -> u32 {
    cpu.hl = cpu.fetch_operand16();
    10
}

fn op_ld_ind_hl_n(cpu: &mut Cpu) -> u32 {
    let value = cpu.fetch_operand();
    cpu.mem_write(cpu.hl, value);
    10
}

fn op_ld_ind_hl_a(cpu: &mut Cpu) -> u32 {
    cpu.mem_write(cpu.hl, cpu.a);
    7
}

fn rev_ld_ind_hl_a(cpu: &mut Cpu) {
    let old = cpu.mem.read(cpu.hl);
    let hl = cpu.hl;
    let record = cpu.history.current_mut();
    record.data1 = hl;
    record.data2 = old as u16;
}

fn op_ld_a_ind_hl(cpu: &mut Cpu) -> u32 {
    cpu.a = cpu.mem_read(cpu.hl);
    7
}

fn op_jp_nn(cpu: &mut Cpu) -> u32 {
    cpu.pc = cpu.fetch_operand16();
    10
}

fn op_ret(cpu: &mut Cpu) -> u32 {
    cpu.pc = cpu.pop16();
    cpu.returned = true;
    10
}

fn op_call_nn(cpu: &mut Cpu) -> u32 {
    let target = cpu.fetch_operand16();
    cpu.push16(cpu.pc);
    cpu.pc = target;
    17
}

fn op_rst38(cpu: &mut Cpu) -> u32 {
    cpu.push16(cpu.pc);
    cpu.pc = 0x0038;
    11
}

fn op_out_n_a(cpu: &mut Cpu) -> u32 {
    let port = cpu.fetch_operand();
    cpu.port_out(port, cpu.a);
    11
}

fn op_in_a_n(cpu: &mut Cpu) -> u32 {
    let port = cpu.fetch_operand();
    cpu.a = cpu.port_in(port);
    11
}

fn ed_ld_a_i(cpu: &mut Cpu) -> u32 {
    cpu.a = cpu.i;
    cpu.f = (cpu.f & flags::C) | if cpu.iff2 { flags::PV } else { 0 };
    9
}

fn ed_ld_a_r(cpu: &mut Cpu) -> u32 {
    cpu.a = cpu.r;
    cpu.f = (cpu.f & flags::C) | if cpu.iff2 { flags::PV } else { 0 };
    9
}

fn ed_im0(cpu: &mut Cpu) -> u32 {
    cpu.im = InterruptMode::Mode0;
    8
}

fn ed_im1(cpu: &mut Cpu) -> u32 {
    cpu.im = InterruptMode::Mode1;
    8
}

fn ed_im2(cpu: &mut Cpu) -> u32 {
    cpu.im = InterruptMode::Mode2;
    8
}

fn ed_ld_i_a(cpu: &mut Cpu) -> u32 {
    cpu.i = cpu.a;
    9
}

fn cb_set0_a(cpu: &mut Cpu) -> u32 {
    cpu.a |= 0x01;
    8
}

fn op_inc_index(cpu: &mut Cpu) -> u32 {
    let value = cpu.index_reg().wrapping_add(1);
    cpu.set_index_reg(value);
    if cpu.prefix == 0 {
        6
    } else {
        10
    }
}

fn index_cb_record(cpu: &mut Cpu, displacement: i8) -> u32 {
    cpu.a = displacement as u8;
    23
}

pub(crate) fn test_tables() -> &'static OpcodeTables {
    static TABLES: OnceLock<OpcodeTables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut tables = OpcodeTables::filled(op_nop, op_indexed_nop).with_prefix_routing();
        tables.base[0x21] = op_ld_hl_nn;
        tables.base[0x23] = op_inc_index;
        tables.base[0x36] = op_ld_ind_hl_n;
        tables.base[0x3E] = op_ld_a_n;
        tables.base[0x76] = op_halt;
        tables.base[0x77] = op_ld_ind_hl_a;
        tables.base[0x7E] = op_ld_a_ind_hl;
        tables.base[0xC3] = op_jp_nn;
        tables.base[0xC9] = op_ret;
        tables.base[0xCD] = op_call_nn;
        tables.base[0xD3] = op_out_n_a;
        tables.base[0xDB] = op_in_a_n;
        tables.base[0xF3] = op_di;
        tables.base[0xFB] = op_ei;
        tables.base[0xFF] = op_rst38;
        tables.reverse[0x77] = Some(rev_ld_ind_hl_a as ReverseFn);
        tables.cb[0xC7] = cb_set0_a;
        tables.ed[0x46] = ed_im0;
        tables.ed[0x47] = ed_ld_i_a;
        tables.ed[0x56] = ed_im1;
        tables.ed[0x57] = ed_ld_a_i;
        tables.ed[0x5E] = ed_im2;
        tables.ed[0x5F] = ed_ld_a_r;
        tables.index_cb[0x46] = index_cb_record;
        tables
    })
}

// ========== Test Helpers ==========

/// Configured and reset TI-84 Plus with every bank on an odd RAM page,
/// where execution is always allowed
pub(crate) fn test_cpu() -> Cpu {
    let mut cpu = Cpu::new(test_tables());
    cpu.init();
    cpu.configure(CalcModel::Ti84p, &HardwareConfig::for_model(CalcModel::Ti84p));
    cpu.reset();
    cpu.mem.set_normal_banks([
        BankSlot::ram(1),
        BankSlot::ram(3),
        BankSlot::ram(5),
        BankSlot::ram(7),
        BankSlot::EMPTY,
    ]);
    cpu
}

/// Like [`test_cpu`] but with unlocked flash page 4 in bank 1
pub(crate) fn flash_cpu() -> Cpu {
    let mut cpu = test_cpu();
    cpu.mem.flash_locked = false;
    cpu.mem.change_page(1, 4, false).unwrap();
    cpu
}

/// Copy `program` into memory at `addr` without touching timing or the bus
pub(crate) fn load(cpu: &mut Cpu, addr: u16, program: &[u8]) {
    for (i, byte) in program.iter().enumerate() {
        cpu.mem.write(addr.wrapping_add(i as u16), *byte);
    }
}

/// Records the hook invocations it is asked to count
pub(crate) fn counting_hook(counter: &Rc<Cell<u32>>) -> CpuHook {
    let counter = Rc::clone(counter);
    Box::new(move |_: &mut Cpu| counter.set(counter.get() + 1))
}

/// Port device for tests: answers input with a fixed value, records output,
/// and raises the interrupt line when polled, driving `value` onto the bus
pub(crate) struct ProbeDevice {
    pub active: bool,
    pub responds: bool,
    pub value: u8,
    pub outputs: Rc<RefCell<Vec<u8>>>,
    pub polls: Rc<Cell<u32>>,
}

impl ProbeDevice {
    pub fn new(value: u8) -> Self {
        Self {
            active: true,
            responds: true,
            value,
            outputs: Rc::new(RefCell::new(Vec::new())),
            polls: Rc::new(Cell::new(0)),
        }
    }
}

impl Device for ProbeDevice {
    fn is_active(&self) -> bool {
        self.active
    }

    fn run(&mut self, cpu: &mut Cpu) {
        if cpu.input {
            if self.responds {
                cpu.bus = self.value;
                cpu.input = false;
            }
        } else if cpu.output {
            if self.responds {
                self.outputs.borrow_mut().push(cpu.bus);
                cpu.output = false;
            }
        } else {
            self.polls.set(self.polls.get() + 1);
            cpu.bus = self.value;
            cpu.interrupt = true;
        }
    }

    fn clear(&mut self) {
        self.active = false;
    }
}
