//! Per-page execution time histogram
//!
//! When running, every step attributes its T-states to the block holding
//! the program counter the step started at.

use crate::error::{CoreError, CoreResult};
use crate::memory::PAGE_SIZE;

/// Pages tracked per store
pub const PROFILER_PAGES: usize = 256;

pub const MIN_BLOCK_SIZE: usize = 16;

/// Cycle histogram keyed by (store, page, block)
#[derive(Debug, Clone)]
pub struct Profiler {
    pub running: bool,
    block_size: usize,
    /// T-states recorded since the last clear
    pub total_time: u64,
    flash_data: Vec<Vec<u64>>,
    ram_data: Vec<Vec<u64>>,
}

impl Profiler {
    pub fn new() -> Self {
        let block_size = 64;
        Self {
            running: false,
            block_size,
            total_time: 0,
            flash_data: Self::empty_table(block_size),
            ram_data: Self::empty_table(block_size),
        }
    }

    fn empty_table(block_size: usize) -> Vec<Vec<u64>> {
        vec![vec![0; PAGE_SIZE / block_size]; PROFILER_PAGES]
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Change the histogram resolution; clears collected data
    pub fn set_block_size(&mut self, block_size: usize) -> CoreResult<()> {
        if !block_size.is_power_of_two() || !(MIN_BLOCK_SIZE..=PAGE_SIZE).contains(&block_size) {
            return Err(CoreError::InvalidBlockSize(block_size));
        }
        self.block_size = block_size;
        self.flash_data = Self::empty_table(block_size);
        self.ram_data = Self::empty_table(block_size);
        self.total_time = 0;
        Ok(())
    }

    /// Attribute `time` T-states to the block holding `offset` of `page`
    pub fn record(&mut self, is_ram: bool, page: u16, offset: u16, time: u64) {
        self.total_time += time;
        let table = if is_ram {
            &mut self.ram_data
        } else {
            &mut self.flash_data
        };
        let block = (offset as usize % PAGE_SIZE) / self.block_size;
        if let Some(cell) = table
            .get_mut(page as usize)
            .and_then(|blocks| blocks.get_mut(block))
        {
            *cell += time;
        }
    }

    pub fn flash_page(&self, page: u16) -> &[u64] {
        self.flash_data.get(page as usize).map_or(&[], Vec::as_slice)
    }

    pub fn ram_page(&self, page: u16) -> &[u64] {
        self.ram_data.get(page as usize).map_or(&[], Vec::as_slice)
    }

    pub fn clear(&mut self) {
        self.total_time = 0;
        for blocks in self.flash_data.iter_mut().chain(self.ram_data.iter_mut()) {
            blocks.fill(0);
        }
    }
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_size_validation() {
        let mut profiler = Profiler::new();
        assert_eq!(profiler.set_block_size(8), Err(CoreError::InvalidBlockSize(8)));
        assert_eq!(profiler.set_block_size(48), Err(CoreError::InvalidBlockSize(48)));
        assert_eq!(
            profiler.set_block_size(PAGE_SIZE * 2),
            Err(CoreError::InvalidBlockSize(PAGE_SIZE * 2))
        );
        profiler.set_block_size(256).unwrap();
        assert_eq!(profiler.flash_page(0).len(), PAGE_SIZE / 256);
        profiler.set_block_size(PAGE_SIZE).unwrap();
        assert_eq!(profiler.ram_page(255).len(), 1);
    }

    #[test]
    fn test_record_buckets() {
        let mut profiler = Profiler::new();
        profiler.set_block_size(1024).unwrap();
        profiler.record(false, 0x1F, 0x0400, 7);
        profiler.record(false, 0x1F, 0x07FF, 4);
        profiler.record(true, 0x01, 0x0000, 11);

        assert_eq!(profiler.flash_page(0x1F)[1], 11);
        assert_eq!(profiler.ram_page(0x01)[0], 11);
        assert_eq!(profiler.total_time, 22);

        profiler.clear();
        assert_eq!(profiler.total_time, 0);
        assert_eq!(profiler.flash_page(0x1F)[1], 0);
    }
}
