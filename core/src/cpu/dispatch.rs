//! Opcode dispatch tables
//!
//! Instruction semantics are supplied from outside the core as four dense
//! tables of plain function pointers, mirroring the Z80's decoding:
//!
//! - `base`: unprefixed opcodes
//! - `cb`: opcodes after a CB prefix
//! - `ed`: opcodes after an ED prefix
//! - `index_cb`: DD CB d op / FD CB d op, receiving the signed displacement
//!
//! Each entry returns the T-states it took. The tables are immutable and
//! may be shared by any number of CPUs.
//!
//! The core provides the routers that link the tables: [`cb_prefix`],
//! [`ed_prefix`] and [`index_prefix`]. Install them in the base table with
//! [`OpcodeTables::with_prefix_routing`], or supply your own.

use super::Cpu;

/// Handler for one opcode; returns T-states
pub type OpFn = fn(&mut Cpu) -> u32;

/// Handler for DD CB / FD CB opcodes, given the displacement byte
pub type IndexedCbFn = fn(&mut Cpu, i8) -> u32;

/// Captures undo information into the current history record
pub type ReverseFn = fn(&mut Cpu);

/// Number of entries in each table
pub const TABLE_SIZE: usize = 256;

/// The four dispatch tables plus optional reverse-info handlers
#[derive(Clone)]
pub struct OpcodeTables {
    pub base: [OpFn; TABLE_SIZE],
    pub cb: [OpFn; TABLE_SIZE],
    pub ed: [OpFn; TABLE_SIZE],
    pub index_cb: [IndexedCbFn; TABLE_SIZE],
    /// Run before the base handler of the same opcode
    pub reverse: [Option<ReverseFn>; TABLE_SIZE],
}

impl OpcodeTables {
    /// Tables with every entry set to the given handlers
    pub fn filled(op: OpFn, indexed: IndexedCbFn) -> Self {
        Self {
            base: [op; TABLE_SIZE],
            cb: [op; TABLE_SIZE],
            ed: [op; TABLE_SIZE],
            index_cb: [indexed; TABLE_SIZE],
            reverse: [None; TABLE_SIZE],
        }
    }

    /// Route 0xCB, 0xED, 0xDD and 0xFD in the base table through the core's
    /// prefix handlers
    pub fn with_prefix_routing(mut self) -> Self {
        self.base[0xCB] = cb_prefix;
        self.base[0xED] = ed_prefix;
        self.base[0xDD] = index_prefix;
        self.base[0xFD] = index_prefix;
        self
    }
}

/// CB prefix: fetch the next opcode and run it from the CB table
pub fn cb_prefix(cpu: &mut Cpu) -> u32 {
    cpu.fetch_opcode();
    let op = cpu.tables().cb[cpu.bus as usize];
    op(cpu)
}

/// ED prefix: fetch the next opcode and run it from the ED table
pub fn ed_prefix(cpu: &mut Cpu) -> u32 {
    cpu.fetch_opcode();
    let op = cpu.tables().ed[cpu.bus as usize];
    op(cpu)
}

/// DD/FD prefix: latch the prefix, then run the next opcode from the base
/// table, or from the indexed CB table for `xD CB d op`.
///
/// For the indexed CB form the displacement and final opcode byte are read
/// as data, so R advances only for the prefix bytes.
pub fn index_prefix(cpu: &mut Cpu) -> u32 {
    cpu.prefix = cpu.bus;
    cpu.fetch_opcode();

    let cost = if cpu.bus == 0xCB {
        let displacement = cpu.fetch_operand() as i8;
        let opcode = cpu.fetch_operand();
        let op = cpu.tables().index_cb[opcode as usize];
        op(cpu, displacement)
    } else {
        let op = cpu.tables().base[cpu.bus as usize];
        op(cpu)
    };

    cpu.prefix = 0;
    cost
}
