//! T-state accounting
//!
//! Every memory access, instruction and interrupt acknowledge adds T-states
//! here. Elapsed emulated time is kept alongside so the front end can pace
//! the run loop against wall-clock time.

use crate::model::{clock, CalcModel};

/// T-state counter and emulated clock
#[derive(Debug, Clone, PartialEq)]
pub struct TimerContext {
    /// Total T-states executed
    pub tstates: u64,
    /// CPU clock in Hz
    pub freq: u32,
    /// Emulated seconds since init
    pub elapsed: f64,
    /// Elapsed time at the last device sync
    pub last_time: f64,
}

impl TimerContext {
    pub fn new(freq: u32) -> Self {
        Self {
            tstates: 0,
            freq,
            elapsed: 0.0,
            last_time: 0.0,
        }
    }

    /// Advance by `tstates` clock cycles
    #[inline]
    pub fn add(&mut self, tstates: u64) {
        self.tstates += tstates;
        if self.freq != 0 {
            self.elapsed += tstates as f64 / self.freq as f64;
        }
    }

    /// Advance only on models with delay hardware (TI-83+SE and later)
    #[inline]
    pub fn add_for_model(&mut self, model: Option<CalcModel>, tstates: u64) {
        if model >= Some(CalcModel::Ti83pse) {
            self.add(tstates);
        }
    }

    /// Port 0x20 speed code for the current clock
    pub fn cpu_speed(&self) -> u8 {
        match self.freq {
            clock::MHZ_15 => 1,
            clock::MHZ_20 => 2,
            clock::MHZ_25 => 3,
            _ => 0,
        }
    }

    pub fn reset(&mut self) {
        self.tstates = 0;
        self.elapsed = 0.0;
        self.last_time = 0.0;
    }
}

impl Default for TimerContext {
    fn default() -> Self {
        Self::new(clock::MHZ_6)
    }
}
