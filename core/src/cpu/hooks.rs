//! Optional callbacks invoked synchronously from inside the core
//!
//! A hook receives the whole CPU and may do anything with it, including
//! resetting it. While a hook runs it is detached from its slot, so it can
//! install a replacement for itself; the original is put back only if the
//! slot is still empty afterwards.

use super::Cpu;

/// Callback taking the CPU
pub type CpuHook = Box<dyn FnMut(&mut Cpu)>;

/// The five hook slots
#[derive(Default)]
pub struct CpuHooks {
    /// Fetch from a page where execution is not allowed.
    /// When absent the CPU logs a warning and resets.
    pub exe_violation: Option<CpuHook>,
    /// Rejected or out-of-sequence flash access
    pub invalid_flash: Option<CpuHook>,
    pub mem_read_break: Option<CpuHook>,
    pub mem_write_break: Option<CpuHook>,
    /// Called by LCD devices when a frame is ready
    pub lcd_enqueue: Option<CpuHook>,
}

/// Selects one hook slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    ExeViolation,
    InvalidFlash,
    MemReadBreak,
    MemWriteBreak,
    LcdEnqueue,
}

impl CpuHooks {
    pub fn slot(&mut self, kind: HookKind) -> &mut Option<CpuHook> {
        match kind {
            HookKind::ExeViolation => &mut self.exe_violation,
            HookKind::InvalidFlash => &mut self.invalid_flash,
            HookKind::MemReadBreak => &mut self.mem_read_break,
            HookKind::MemWriteBreak => &mut self.mem_write_break,
            HookKind::LcdEnqueue => &mut self.lcd_enqueue,
        }
    }

    pub fn is_set(&self, kind: HookKind) -> bool {
        match kind {
            HookKind::ExeViolation => self.exe_violation.is_some(),
            HookKind::InvalidFlash => self.invalid_flash.is_some(),
            HookKind::MemReadBreak => self.mem_read_break.is_some(),
            HookKind::MemWriteBreak => self.mem_write_break.is_some(),
            HookKind::LcdEnqueue => self.lcd_enqueue.is_some(),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl Cpu {
    /// Install or remove a hook
    pub fn set_hook(&mut self, kind: HookKind, hook: Option<CpuHook>) {
        *self.hooks.slot(kind) = hook;
    }

    /// Run a hook if installed. Returns false when the slot was empty.
    pub fn fire_hook(&mut self, kind: HookKind) -> bool {
        let Some(mut hook) = self.hooks.slot(kind).take() else {
            return false;
        };
        hook(self);
        let slot = self.hooks.slot(kind);
        if slot.is_none() {
            *slot = Some(hook);
        }
        true
    }
}
