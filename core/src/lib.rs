//! TI-8x Z80 Execution Core
//!
//! This crate provides the machine core shared by the Z80-based TI
//! calculators (TI-81 through TI-84 Plus C SE): banked memory, the flash
//! command sequencer, T-state accounting, port I/O with interrupt polling,
//! and the debugging facilities built on top of them. It has a stable C ABI
//! for logging and no OS dependencies.
//!
//! Instruction semantics are not part of the core. Callers supply an
//! [`OpcodeTables`] and the core fetches, dispatches and times.
//!
//! # Architecture
//!
//! - `memory`: RAM/flash stores, bank tables, flash state machine
//! - `cpu`: register file, step loop, bus access and protection, hooks
//! - `timer`: T-state counter and emulated clock
//! - `pio`: device table and interrupt polling chain
//! - `profiler`: per-page cycle histogram
//! - `history`: reverse-step ring
//! - `runner`: budgeted execution with breakpoints
//! - `model`: calculator models and their hardware presets
//!
//! # Memory Map (16-bit Z80 address space)
//!
//! | Address Range   | Bank | Power-on mapping (flash models) |
//! |-----------------|------|---------------------------------|
//! | 0x0000 - 0x3FFF | 0    | Flash, boot page                |
//! | 0x4000 - 0x7FFF | 1    | Flash page 0                    |
//! | 0x8000 - 0xBFFF | 2    | Flash page 0                    |
//! | 0xC000 - 0xFFFF | 3    | RAM page 0                      |

pub mod cpu;
pub mod error;
pub mod history;
pub mod logging;
pub mod memory;
pub mod model;
pub mod pio;
pub mod profiler;
pub mod runner;
pub mod timer;

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::*;


use std::os::raw::c_char;

pub use cpu::{Cpu, CpuHook, HookKind, InterruptMode, OpcodeTables};
pub use error::{CoreError, CoreResult};
pub use logging::log_event;
pub use memory::{MemoryContext, WideAddr};
pub use model::{CalcModel, HardwareConfig};
pub use pio::{Device, PioContext};
pub use runner::{Runner, StopReason};

/// Set an optional log callback for core diagnostics.
/// The callback is called with a null-terminated C string.
#[cfg_attr(not(feature = "ios_prefixed"), no_mangle)]
#[cfg_attr(feature = "ios_prefixed", export_name = "rust_ti8x_set_log_callback")]
pub extern "C" fn ti8x_set_log_callback(cb: Option<extern "C" fn(*const c_char)>) {
    logging::set_log_callback(cb);
}

/// Numeric id of a model name such as "TI-84+", or -1 if unknown.
/// `name` must be null or a valid null-terminated string.
#[cfg_attr(not(feature = "ios_prefixed"), no_mangle)]
#[cfg_attr(feature = "ios_prefixed", export_name = "rust_ti8x_model_id")]
pub extern "C" fn ti8x_model_id(name: *const c_char) -> i32 {
    if name.is_null() {
        return -1;
    }
    let name = unsafe { std::ffi::CStr::from_ptr(name) };
    name.to_str()
        .ok()
        .and_then(CalcModel::from_name)
        .map_or(-1, |model| model as i32)
}
