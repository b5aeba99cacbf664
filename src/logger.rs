// src/logger.rs
//
//! Diagnostic sinks injected into a [`crate::Client`] at construction.
//!
//! Per-operation failures are reported through a [`DiagnosticSink`] at the
//! point where they happen. The default sink forwards into `tracing`, so an
//! application that installs a subscriber (see [`init_tracing`]) sees them
//! alongside the crate's own debug/info events.

use std::io::Write;
use std::sync::Mutex;

use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::EnvFilter;

pub use tracing::Level;

pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, level: Level, message: &str);
}

/// Forwards every message to the matching `tracing` macro.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => error!("{}", message),
            Level::WARN => warn!("{}", message),
            Level::INFO => info!("{}", message),
            Level::DEBUG => debug!("{}", message),
            _ => trace!("{}", message),
        }
    }
}

/// Writes one line per message to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl StdoutSink {
    fn write_line<W: Write>(out: &mut W, level: Level, message: &str) -> std::io::Result<()> {
        writeln!(out, "[{}] {}", level, message)
    }
}

impl DiagnosticSink for StdoutSink {
    fn emit(&self, level: Level, message: &str) {
        // A closed stdout is not worth failing an upload over
        let _ = Self::write_line(&mut std::io::stdout().lock(), level, message);
    }
}

/// Keeps messages in memory; handy for asserting on failures in tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(Level, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|(_, m)| m).collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries().iter().any(|(_, m)| m.contains(needle))
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, level: Level, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((level, message.to_string()));
        }
    }
}

/// Install a `fmt` subscriber: 0 = warn, 1 = info, 2+ = debug.
/// `RUST_LOG` wins when set. Calling twice is harmless.
pub fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .try_init();
}
