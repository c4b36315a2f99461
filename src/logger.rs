//! Developer diagnostics, gated behind the CLI's `--verbose` flag.

use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn toggle(enabled: bool) {
    VERBOSE.store(enabled, Ordering::Relaxed);
}

pub fn enabled() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Log to stderr, but only when verbose mode is on.
macro_rules! verbose {
    ($($arg:tt)*) => {
        if $crate::logger::enabled() {
            eprintln!($($arg)*);
        }
    };
}

pub(crate) use verbose;
