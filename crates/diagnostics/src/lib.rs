//! Logging setup shared by the celldock crates
//!
//! Usage:
//! - Set CELLDOCK_LOG=off (default) - no logs
//! - Set CELLDOCK_LOG=info - dataset loads, transfers, push iterations
//! - Set CELLDOCK_LOG=debug - cache hits and misses, subprocess details

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

static INIT: Once = Once::new();

/// Environment variable holding the minimum level
pub const LOG_ENV: &str = "CELLDOCK_LOG";

/// Parsed value of `CELLDOCK_LOG`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    /// Unknown values fall back to `Info`; the second field reports whether that happened.
    pub fn parse(value: &str) -> (Self, bool) {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "off" => (LogLevel::Off, true),
            "error" => (LogLevel::Error, true),
            "warn" => (LogLevel::Warn, true),
            "info" => (LogLevel::Info, true),
            "debug" => (LogLevel::Debug, true),
            _ => (LogLevel::Info, false),
        }
    }

    fn as_emit(self) -> Option<emit::Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(emit::Level::Error),
            LogLevel::Warn => Some(emit::Level::Warn),
            LogLevel::Info => Some(emit::Level::Info),
            LogLevel::Debug => Some(emit::Level::Debug),
        }
    }
}

/// Initialize diagnostics based on the CELLDOCK_LOG environment variable
///
/// Call once at startup. Later calls are ignored.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let raw = std::env::var(LOG_ENV).unwrap_or_else(|_| "off".to_string());
        let (level, known) = LogLevel::parse(&raw);

        let Some(min) = level.as_emit() else {
            return;
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(min))
            .init();

        if !known {
            emit::warn!("unknown CELLDOCK_LOG value {raw}, using info", raw: raw);
        }

        // The runtime lives for the whole process.
        std::mem::forget(rt);
    });
}

/// Log basic operations (dataset opened, transfer finished, push iteration)
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log detailed diagnostics (cache hits, command lines, resolved keys)
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log warning conditions (fallbacks, retries)
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log failures that end a request or a task
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

pub use init_diagnostics as init;
