//! Port I/O: device table and interrupt polling chain
//!
//! Every port index 0x00-0xFF can hold one device. `IN`/`OUT` instructions
//! dispatch to the device at the port; the interrupt chain runs devices
//! periodically regardless of port traffic, emulating the timer and link
//! hardware that raise the CPU's interrupt line.
//!
//! A device signals that it handled an access by clearing `cpu.input` or
//! `cpu.output`. If the flag is still set afterwards the device is treated
//! as absent for that access.

use crate::cpu::{Cpu, CpuHook};
use crate::error::{CoreError, CoreResult};

/// Number of port slots and maximum interrupt entries
pub const NUM_PORTS: usize = 256;

/// Peripheral bound to a port
pub trait Device {
    /// Inactive devices are skipped by I/O and interrupt polling
    fn is_active(&self) -> bool;

    /// Accesses to this port invoke the PIO breakpoint hook
    fn is_breakpoint(&self) -> bool {
        false
    }

    /// Writes are ignored while flash is locked
    fn is_protected(&self) -> bool {
        false
    }

    /// Handle a pending access or an interrupt tick
    fn run(&mut self, cpu: &mut Cpu);

    /// Deactivate and drop any latched state
    fn clear(&mut self);
}

/// One link of the interrupt polling chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptEntry {
    /// Port of the device to run
    pub device: Option<u8>,
    pub skip_factor: u32,
    /// Polls remaining until the device runs; zero disables the entry
    pub skip_count: u32,
}

impl InterruptEntry {
    /// Count down one poll; returns true when the entry fires
    pub fn tick(&mut self) -> bool {
        if self.skip_count == 0 {
            return false;
        }
        self.skip_count -= 1;
        if self.skip_count == 0 {
            self.skip_count = self.skip_factor;
            true
        } else {
            false
        }
    }
}

impl Default for InterruptEntry {
    fn default() -> Self {
        Self {
            device: None,
            skip_factor: 1,
            skip_count: 1,
        }
    }
}

/// Device table, interrupt chain and I/O value cache
pub struct PioContext {
    devices: Vec<Option<Box<dyn Device>>>,
    interrupts: Vec<InterruptEntry>,
    most_recent_input: [u8; NUM_PORTS],
    most_recent_output: [u8; NUM_PORTS],
    /// Called when a breakpoint-flagged device is accessed
    pub breakpoint_hook: Option<CpuHook>,
}

impl PioContext {
    pub fn new() -> Self {
        Self {
            devices: (0..NUM_PORTS).map(|_| None).collect(),
            interrupts: Vec::with_capacity(NUM_PORTS),
            most_recent_input: [0; NUM_PORTS],
            most_recent_output: [0; NUM_PORTS],
            breakpoint_hook: None,
        }
    }

    // ========== Devices ==========

    /// Bind a device to a port, returning the previous one
    pub fn set_device(&mut self, port: u8, device: Box<dyn Device>) -> Option<Box<dyn Device>> {
        self.devices[port as usize].replace(device)
    }

    pub fn remove_device(&mut self, port: u8) -> Option<Box<dyn Device>> {
        self.devices[port as usize].take()
    }

    pub fn device(&self, port: u8) -> Option<&dyn Device> {
        self.devices[port as usize].as_deref()
    }

    pub fn device_mut(&mut self, port: u8) -> Option<&mut (dyn Device + 'static)> {
        self.devices[port as usize].as_deref_mut()
    }

    /// Detach a device while it runs against the CPU
    pub(crate) fn take_device(&mut self, port: u8) -> Option<Box<dyn Device>> {
        self.devices[port as usize].take()
    }

    /// Reattach a device after it ran, unless it was replaced meanwhile
    pub(crate) fn restore_device(&mut self, port: u8, device: Box<dyn Device>) {
        let slot = &mut self.devices[port as usize];
        if slot.is_none() {
            *slot = Some(device);
        }
    }

    pub fn most_recent_input(&self, port: u8) -> u8 {
        self.most_recent_input[port as usize]
    }

    pub fn most_recent_output(&self, port: u8) -> u8 {
        self.most_recent_output[port as usize]
    }

    pub(crate) fn set_most_recent_input(&mut self, port: u8, value: u8) {
        self.most_recent_input[port as usize] = value;
    }

    pub(crate) fn set_most_recent_output(&mut self, port: u8, value: u8) {
        self.most_recent_output[port as usize] = value;
    }

    // ========== Interrupt chain ==========

    /// Add the device at `port` to the polling chain, running every `skip` polls
    pub fn append_interrupt_device(&mut self, port: u8, skip: u32) -> CoreResult<()> {
        if self.interrupts.len() >= NUM_PORTS {
            return Err(CoreError::InterruptTableFull);
        }
        self.interrupts.push(InterruptEntry {
            device: Some(port),
            skip_factor: skip,
            skip_count: skip,
        });
        Ok(())
    }

    /// Change the period of the first entry bound to `port`.
    /// The new period applies after the entry next fires.
    pub fn modify_interrupt_device(&mut self, port: u8, skip: u32) {
        if let Some(entry) = self
            .interrupts
            .iter_mut()
            .find(|entry| entry.device == Some(port))
        {
            entry.skip_factor = skip;
        }
    }

    pub fn interrupts(&self) -> &[InterruptEntry] {
        &self.interrupts
    }

    pub(crate) fn interrupt_mut(&mut self, index: usize) -> Option<&mut InterruptEntry> {
        self.interrupts.get_mut(index)
    }

    /// Deactivate every device and empty the polling chain
    pub fn clear_devices(&mut self) {
        for device in self.devices.iter_mut().flatten() {
            device.clear();
        }
        self.interrupts.clear();
    }
}

impl Default for PioContext {
    fn default() -> Self {
        Self::new()
    }
}
