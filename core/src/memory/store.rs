//! Flat byte stores backing RAM and flash
//!
//! A store is a plain byte array plus a parallel array of breakpoint flags.
//! Conditional breakpoints are attached sparsely, keyed by physical index.

use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};

use super::{WideAddr, PAGE_SIZE};

/// Breakpoint kind bit flags stored per byte
pub mod break_kind {
    /// Execution breakpoint, checked by the run loop
    pub const NORMAL: u8 = 0x01;
    pub const MEM_WRITE: u8 = 0x02;
    pub const MEM_READ: u8 = 0x04;
}

/// Breakpoint record attached to one byte of a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CondBreakpoint {
    pub active: bool,
    pub kind: u8,
    pub waddr: WideAddr,
    pub label: String,
}

impl CondBreakpoint {
    fn new(kind: u8, waddr: WideAddr) -> Self {
        Self {
            active: true,
            kind,
            waddr,
            label: format!("{:02X}:{:04X}", waddr.page, waddr.offset),
        }
    }
}

/// One block of RAM or flash
#[derive(Debug, Clone, Default)]
pub struct ByteStore {
    data: Vec<u8>,
    breaks: Vec<u8>,
    cond_breaks: HashMap<usize, CondBreakpoint>,
    /// Hardware revision of this block (flash chip or RAM variant)
    pub version: u8,
    /// Lower bound of the execution window (page or address, by store)
    pub lower: u32,
    /// Upper bound of the execution window
    pub upper: u32,
}

impl ByteStore {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
            breaks: vec![0; size],
            ..Default::default()
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Number of whole 16KB pages
    #[inline]
    pub fn pages(&self) -> usize {
        self.data.len() / PAGE_SIZE
    }

    /// Out-of-range reads return 0xFF (floating bus)
    #[inline]
    pub fn get(&self, index: usize) -> u8 {
        self.data.get(index).copied().unwrap_or(0xFF)
    }

    /// Out-of-range writes are dropped
    #[inline]
    pub fn set(&mut self, index: usize, value: u8) {
        if let Some(byte) = self.data.get_mut(index) {
            *byte = value;
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Resize, keeping the overlapping prefix. New bytes are zero.
    pub fn set_size(&mut self, size: usize) {
        self.data.resize(size, 0);
        self.breaks.resize(size, 0);
        self.cond_breaks.retain(|&index, _| index < size);
    }

    /// Fill `len` bytes from `start`, clipped to the store
    pub fn fill(&mut self, start: usize, len: usize, value: u8) {
        let end = start.saturating_add(len).min(self.data.len());
        if start < end {
            self.data[start..end].fill(value);
        }
    }

    /// Copy an image into the start of the store
    pub fn load(&mut self, image: &[u8]) -> CoreResult<()> {
        if image.len() > self.data.len() {
            return Err(CoreError::ImageTooLarge {
                len: image.len(),
                capacity: self.data.len(),
            });
        }
        self.data[..image.len()].copy_from_slice(image);
        Ok(())
    }

    // ========== Breakpoints ==========

    #[inline]
    pub fn is_break(&self, index: usize, kind: u8) -> bool {
        self.breaks.get(index).is_some_and(|b| b & kind != 0)
    }

    pub fn break_flags(&self, index: usize) -> u8 {
        self.breaks.get(index).copied().unwrap_or(0)
    }

    pub(crate) fn enable_break(&mut self, index: usize, kind: u8, waddr: WideAddr) {
        if let Some(flags) = self.breaks.get_mut(index) {
            *flags |= kind;
            self.cond_breaks.insert(index, CondBreakpoint::new(kind, waddr));
        }
    }

    pub(crate) fn disable_break(&mut self, index: usize, kind: u8) {
        if let Some(flags) = self.breaks.get_mut(index) {
            *flags &= !kind;
            self.cond_breaks.remove(&index);
        }
    }

    pub fn cond_break(&self, index: usize) -> Option<&CondBreakpoint> {
        self.cond_breaks.get(&index)
    }

    pub fn cond_break_mut(&mut self, index: usize) -> Option<&mut CondBreakpoint> {
        self.cond_breaks.get_mut(&index)
    }

    pub fn clear_breaks(&mut self) {
        self.breaks.fill(0);
        self.cond_breaks.clear();
    }

    /// Zero contents and drop all breakpoints, keeping the size
    pub fn clear(&mut self) {
        self.data.fill(0);
        self.clear_breaks();
    }
}
