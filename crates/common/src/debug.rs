//! Debug infrastructure with per-module loggers.
//!
//! Control via the WEFT_DEBUG environment variable:
//! - `WEFT_DEBUG=*` - Enable all loggers
//! - `WEFT_DEBUG=vm` - Enable only the VM logger
//! - `WEFT_DEBUG=vm,compiler` - Enable multiple
//!
//! Verbosity via WEFT_DEBUG_VERBOSITY (0-3, default 1)

use std::collections::HashSet;
use std::env;
use std::sync::OnceLock;

enum Selection {
    All,
    None,
    Named(HashSet<String>),
}

struct Config {
    selection: Selection,
    verbosity: u8,
}

static CONFIG: OnceLock<Config> = OnceLock::new();

fn config() -> &'static Config {
    CONFIG.get_or_init(|| {
        let selection = match env::var("WEFT_DEBUG").ok().as_deref() {
            None | Some("") => Selection::None,
            Some("*") | Some("1") | Some("true") => Selection::All,
            Some(spec) => {
                let names: HashSet<_> = spec
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if names.is_empty() {
                    Selection::None
                } else {
                    Selection::Named(names)
                }
            }
        };
        let verbosity = env::var("WEFT_DEBUG_VERBOSITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(|v: u8| v.min(3))
            .unwrap_or(1);
        Config { selection, verbosity }
    })
}

fn selected(name: &str) -> bool {
    match &config().selection {
        Selection::None => false,
        Selection::All => true,
        Selection::Named(names) => names.contains(name),
    }
}

fn verbosity() -> u8 {
    config().verbosity
}

pub struct Logger {
    name: &'static str,
    enabled: bool,
}

impl Logger {
    pub const fn disabled() -> Self {
        Self { name: "", enabled: false }
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn log(&self, msg: &str) {
        if self.enabled && verbosity() >= 1 {
            eprintln!("[{}] {}", self.name, msg);
        }
    }

    #[inline]
    pub fn detail(&self, msg: &str) {
        if self.enabled && verbosity() >= 2 {
            eprintln!("[{}] {}", self.name, msg);
        }
    }

    #[inline]
    pub fn success(&self, msg: &str) {
        if self.enabled && verbosity() >= 1 {
            eprintln!("[{}] OK: {}", self.name, msg);
        }
    }

    #[inline]
    pub fn fail(&self, msg: &str) {
        if self.enabled && verbosity() >= 1 {
            eprintln!("[{}] FAIL: {}", self.name, msg);
        }
    }
}

/// Create a logger. The name must be a static string.
pub fn create_logger(name: &'static str) -> Logger {
    if selected(name) {
        Logger { name, enabled: true }
    } else {
        Logger::disabled()
    }
}

// Macros avoid the format! cost when the logger is disabled.

#[macro_export]
macro_rules! log {
    ($logger:expr, $($arg:tt)*) => {
        if $logger.enabled() {
            $logger.log(&format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_detail {
    ($logger:expr, $($arg:tt)*) => {
        if $logger.enabled() {
            $logger.detail(&format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_success {
    ($logger:expr, $($arg:tt)*) => {
        if $logger.enabled() {
            $logger.success(&format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_fail {
    ($logger:expr, $($arg:tt)*) => {
        if $logger.enabled() {
            $logger.fail(&format!($($arg)*));
        }
    };
}
