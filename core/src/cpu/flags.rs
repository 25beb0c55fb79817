//! Z80 F register bits
//!
//! Only PV is touched by the core itself (interrupt delivery after
//! `LD A,I` / `LD A,R`); opcode tables use the rest.

pub const C: u8 = 0x01;
/// Set after a subtraction, read by DAA
pub const N: u8 = 0x02;
/// Parity or overflow, and IFF2 after `LD A,I` / `LD A,R`
pub const PV: u8 = 0x04;
/// Undocumented copy of result bit 3
pub const X: u8 = 0x08;
pub const H: u8 = 0x10;
/// Undocumented copy of result bit 5
pub const Y: u8 = 0x20;
pub const Z: u8 = 0x40;
pub const S: u8 = 0x80;
