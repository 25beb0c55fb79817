//! Log routing for native front ends
//!
//! The core reports diagnostics through the `log` facade. Hosts that already
//! run a Rust logger get them for free; C and Swift front ends register a
//! plain callback instead and receive one NUL-terminated line per record.

use log::{LevelFilter, Log, Metadata, Record};
use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

static LOG_CALLBACK: AtomicPtr<std::ffi::c_void> = AtomicPtr::new(ptr::null_mut());
static LOGGER_INSTALLED: AtomicBool = AtomicBool::new(false);

/// `log::Log` implementation that forwards records to the registered callback
struct CallbackLogger;

static LOGGER: CallbackLogger = CallbackLogger;

impl Log for CallbackLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        !LOG_CALLBACK.load(Ordering::Relaxed).is_null()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("{} {}: {}", record.level(), record.target(), record.args());
        forward(&line);
    }

    fn flush(&self) {}
}

fn forward(message: &str) {
    let cb_ptr = LOG_CALLBACK.load(Ordering::SeqCst);
    if cb_ptr.is_null() {
        return;
    }
    let cb: extern "C" fn(*const c_char) = unsafe { std::mem::transmute(cb_ptr) };
    if let Ok(cstr) = CString::new(message) {
        cb(cstr.as_ptr());
    }
}

/// Register (or clear, with `None`) the callback that receives log lines.
///
/// The first call installs the forwarding logger as the process logger. If
/// the host already installed its own logger that one keeps receiving
/// records and the callback stays silent.
pub fn set_log_callback(cb: Option<extern "C" fn(*const c_char)>) {
    let ptr = cb.map(|f| f as *mut std::ffi::c_void).unwrap_or(ptr::null_mut());
    LOG_CALLBACK.store(ptr, Ordering::SeqCst);

    if !LOGGER_INSTALLED.swap(true, Ordering::SeqCst) && log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

/// Lifecycle event (init, reset, configure) at info level
pub fn log_event(message: &str) {
    log::info!(target: "ti8x_core", "{}", message);
}
