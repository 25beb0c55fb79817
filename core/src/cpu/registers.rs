//! Register access helpers
//!
//! Register pairs are stored as `u16` fields on [`Cpu`]; the helpers here
//! give byte-wide views and the exchange operations. All arithmetic on
//! registers wraps at the register width.

use super::Cpu;

macro_rules! byte_access {
    ($pair:ident, $hi:ident, $set_hi:ident, $lo:ident, $set_lo:ident) => {
        #[inline]
        pub fn $hi(&self) -> u8 {
            (self.$pair >> 8) as u8
        }

        #[inline]
        pub fn $set_hi(&mut self, value: u8) {
            self.$pair = (self.$pair & 0x00FF) | (value as u16) << 8;
        }

        #[inline]
        pub fn $lo(&self) -> u8 {
            self.$pair as u8
        }

        #[inline]
        pub fn $set_lo(&mut self, value: u8) {
            self.$pair = (self.$pair & 0xFF00) | value as u16;
        }
    };
}

impl Cpu {
    byte_access!(bc, b, set_b, c, set_c);
    byte_access!(de, d, set_d, e, set_e);
    byte_access!(hl, h, set_h, l, set_l);
    byte_access!(ix, ixh, set_ixh, ixl, set_ixl);
    byte_access!(iy, iyh, set_iyh, iyl, set_iyl);

    #[inline]
    pub fn af(&self) -> u16 {
        (self.a as u16) << 8 | self.f as u16
    }

    #[inline]
    pub fn set_af(&mut self, value: u16) {
        self.a = (value >> 8) as u8;
        self.f = value as u8;
    }

    /// EX AF,AF'
    pub fn ex_af(&mut self) {
        std::mem::swap(&mut self.a, &mut self.a_prime);
        std::mem::swap(&mut self.f, &mut self.f_prime);
    }

    /// EXX
    pub fn exx(&mut self) {
        std::mem::swap(&mut self.bc, &mut self.bc_prime);
        std::mem::swap(&mut self.de, &mut self.de_prime);
        std::mem::swap(&mut self.hl, &mut self.hl_prime);
    }

    /// Index register selected by the active DD/FD prefix (HL if none)
    pub fn index_reg(&self) -> u16 {
        match self.prefix {
            0xDD => self.ix,
            0xFD => self.iy,
            _ => self.hl,
        }
    }

    pub fn set_index_reg(&mut self, value: u16) {
        match self.prefix {
            0xDD => self.ix = value,
            0xFD => self.iy = value,
            _ => self.hl = value,
        }
    }

    /// Advance the 7-bit refresh counter, keeping bit 7
    #[inline]
    pub fn bump_r(&mut self, n: u8) {
        self.r = (self.r & 0x80) | (self.r.wrapping_add(n) & 0x7F);
    }

    // ========== Stack ==========

    /// Push a word through the bus (high byte first)
    pub fn push16(&mut self, value: u16) {
        self.sp = self.sp.wrapping_sub(1);
        self.mem_write(self.sp, (value >> 8) as u8);
        self.sp = self.sp.wrapping_sub(1);
        self.mem_write(self.sp, value as u8);
    }

    pub fn pop16(&mut self) -> u16 {
        let lo = self.mem_read(self.sp);
        self.sp = self.sp.wrapping_add(1);
        let hi = self.mem_read(self.sp);
        self.sp = self.sp.wrapping_add(1);
        (hi as u16) << 8 | lo as u16
    }

    /// Fetch the immediate byte at PC through the bus
    pub fn fetch_operand(&mut self) -> u8 {
        let value = self.mem_read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    pub fn fetch_operand16(&mut self) -> u16 {
        let lo = self.fetch_operand();
        let hi = self.fetch_operand();
        (hi as u16) << 8 | lo as u16
    }
}
