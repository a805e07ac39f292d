//! Operator-facing progress entries of a scan.
//!
//! Every entry handed to a [`ScanLogSink`] by the orchestrator is also emitted through `tracing`
//! at the matching level.

use std::fmt;

use strum::Display;
use tracing::{error, info};

/// Severity of a [`ScanLog`] entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum ScanLogKind {
    /// Progress and timing
    Info,
    /// Rejections and violations
    Error,
}

/// A single progress entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanLog {
    /// Severity
    pub kind: ScanLogKind,
    /// The message
    pub message: String,
}

impl ScanLog {
    /// An informational entry
    pub fn info(message: impl Into<String>) -> Self {
        ScanLog {
            kind: ScanLogKind::Info,
            message: message.into(),
        }
    }

    /// An error entry
    pub fn error(message: impl Into<String>) -> Self {
        ScanLog {
            kind: ScanLogKind::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for ScanLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Receiver of scan progress
///
/// Implemented for every `FnMut(ScanLog)`, so a closure or a `Vec` push can be used directly.
pub trait ScanLogSink {
    /// Handle one entry
    fn log(&mut self, entry: ScanLog);
}

impl<F: FnMut(ScanLog)> ScanLogSink for F {
    fn log(&mut self, entry: ScanLog) {
        self(entry);
    }
}

/// Emit `entry` through `tracing` and forward it to `sink`
pub(crate) fn emit(sink: &mut dyn ScanLogSink, entry: ScanLog) {
    match entry.kind {
        ScanLogKind::Info => info!("{}", entry.message),
        ScanLogKind::Error => error!("{}", entry.message),
    }
    sink.log(entry);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_sinks() {
        let mut entries = Vec::new();
        {
            let mut sink = |entry: ScanLog| entries.push(entry);
            emit(&mut sink, ScanLog::info("References loaded... 3ms"));
            emit(&mut sink, ScanLog::error("Sandbox violation: x"));
        }

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, ScanLogKind::Info);
        assert_eq!(entries[1].to_string(), "[Error] Sandbox violation: x");
    }
}
