//! Run loop driving [`Cpu::step`]
//!
//! The runner executes instructions for a T-state budget, carrying any
//! overshoot into the next call so the long-run average matches the clock.
//! Execution breakpoints are checked at the canonical address of PC before
//! every step except the first, so a run can resume from a breakpoint.

use crate::cpu::{Cpu, CpuHook};
use crate::memory::{break_kind, WideAddr};

/// Why a run call returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The T-state budget or step count was used up
    Completed,
    /// Execution breakpoint at this address; the runner is now stopped
    Breakpoint(WideAddr),
    /// PC reached the requested address (not executed)
    ReachedTarget,
    /// A RET-class instruction just executed
    Returned,
    /// The runner was stopped before or during the call
    NotRunning,
}

/// Budgeted execution with breakpoint checks
pub struct Runner {
    pub running: bool,
    /// T-states the previous run went past its budget
    time_error: u64,
    /// Called when a breakpoint stops the run
    pub breakpoint_hook: Option<CpuHook>,
}

impl Runner {
    pub fn new() -> Self {
        Self {
            running: true,
            time_error: 0,
            breakpoint_hook: None,
        }
    }

    pub fn time_error(&self) -> u64 {
        self.time_error
    }

    /// Run for about `tstates` T-states
    pub fn run_tstates(&mut self, cpu: &mut Cpu, tstates: u64) -> StopReason {
        self.run(cpu, tstates, None, false)
    }

    /// Run until PC reaches `target` or the budget is spent
    pub fn run_to_address(&mut self, cpu: &mut Cpu, tstates: u64, target: WideAddr) -> StopReason {
        self.run(cpu, tstates, Some(target), false)
    }

    /// Run until a return instruction executes or the budget is spent
    pub fn run_to_return(&mut self, cpu: &mut Cpu, tstates: u64) -> StopReason {
        self.run(cpu, tstates, None, true)
    }

    /// Execute `steps` instructions, stopping early at a breakpoint
    pub fn run_steps(&mut self, cpu: &mut Cpu, steps: u32) -> StopReason {
        if !self.running {
            return StopReason::NotRunning;
        }
        if steps == 0 {
            return StopReason::Completed;
        }
        cpu.step();
        for _ in 1..steps {
            if !self.running {
                return StopReason::NotRunning;
            }
            if let Some(stop) = self.check_breakpoint(cpu) {
                return stop;
            }
            cpu.step();
        }
        StopReason::Completed
    }

    /// Stop at a normal execution breakpoint under PC
    fn check_breakpoint(&mut self, cpu: &mut Cpu) -> Option<StopReason> {
        let waddr = cpu.mem.addr_to_wide(cpu.pc);
        if !cpu.mem.check_break(waddr, break_kind::NORMAL) {
            return None;
        }
        self.running = false;
        log::debug!("breakpoint at {:02X}:{:04X}", waddr.page, waddr.offset);
        if let Some(hook) = self.breakpoint_hook.as_mut() {
            hook(cpu);
        }
        Some(StopReason::Breakpoint(waddr))
    }

    fn run(
        &mut self,
        cpu: &mut Cpu,
        tstates: u64,
        target: Option<WideAddr>,
        until_return: bool,
    ) -> StopReason {
        if !self.running {
            return StopReason::NotRunning;
        }
        let time_end = (cpu.timer.tstates + tstates).saturating_sub(self.time_error);

        // First instruction runs unchecked so a run can leave a breakpoint
        cpu.step();

        while self.running {
            let waddr = cpu.mem.addr_to_wide(cpu.pc);
            if target == Some(waddr) {
                return StopReason::ReachedTarget;
            }
            if let Some(stop) = self.check_breakpoint(cpu) {
                return stop;
            }

            cpu.step();

            if cpu.timer.tstates >= time_end {
                self.time_error = cpu.timer.tstates - time_end;
                return StopReason::Completed;
            }
            if until_return && cpu.returned {
                return StopReason::Returned;
            }
        }
        StopReason::NotRunning
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}
