//! Verbose diagnostics for encoder internals.
//!
//! `set_verbose(true)` turns on the `verbose!()` macro, which prints codec
//! parameters and failure details to stderr.

use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Enable or disable verbose logging
pub fn set_verbose(enabled: bool) {
    VERBOSE.store(enabled, Ordering::Relaxed);
}

/// Check if verbose logging is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Log a formatted message if verbose mode is enabled
///
/// The message is also passed to `log::debug!` so `RUST_LOG` picks it up.
#[macro_export]
macro_rules! verbose {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::log::debug!("{}", message);
        if $crate::verbose::is_verbose() {
            eprintln!("[verbose] {}", message);
        }
    }};
}
