//! Error types for machine setup
//!
//! Nothing on the execution path returns an error: reads, writes, device
//! I/O and `step()` always succeed and report protocol problems through
//! the CPU hooks. Only configuration calls made by the front end can fail.

use thiserror::Error;

/// Errors returned by configuration and setup operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Numeric model id does not name a known calculator
    #[error("unknown calculator model id {0}")]
    UnknownModel(i32),
    /// Image does not fit into the destination store
    #[error("image of {len} bytes does not fit in a {capacity}-byte store")]
    ImageTooLarge { len: usize, capacity: usize },
    /// Bank index outside the five-slot table
    #[error("bank index {0} out of range")]
    BankOutOfRange(usize),
    /// All 256 interrupt entries are in use
    #[error("interrupt table is full")]
    InterruptTableFull,
    /// Profiler block size is not a power of two in 16..=16384
    #[error("profiler block size {0} must be a power of two between 16 and 16384")]
    InvalidBlockSize(usize),
}

pub type CoreResult<T> = Result<T, CoreError>;
