//! Error types for the sysmon-store crate.

use thiserror::Error;

/// Errors that can occur while collecting, storing or querying samples.
///
/// Every variant is recoverable at the caller boundary; nothing in this crate
/// terminates the process.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The requested metric name is not in the known set.
    #[error("unknown metric: {name} (known: {known})")]
    UnknownMetric {
        /// The metric name that was requested.
        name: String,
        /// Comma-separated list of known metric names.
        known: String,
    },

    /// A metric provider could not produce a reading.
    #[error("metric unavailable: {name}: {reason}")]
    MetricUnavailable {
        /// The metric that failed.
        name: String,
        /// Why the reading failed.
        reason: String,
    },

    /// A time expression could not be parsed.
    #[error("invalid time spec '{input}': expected {expected}")]
    InvalidTimeSpec {
        /// The offending input.
        input: String,
        /// Description of the accepted forms.
        expected: &'static str,
    },

    /// The durable medium cannot be opened, written or read within the timeout.
    #[error("storage unavailable: {reason}")]
    StorageUnavailable {
        /// The reason the storage operation failed.
        reason: String,
    },

    /// A persisted row could not be decoded.
    #[error("corrupt record at {location}: {reason}")]
    CorruptRecord {
        /// Where the row lives (row id or line number).
        location: String,
        /// Why the row could not be decoded.
        reason: String,
    },

    /// A write was attempted on a store opened read-only.
    #[error("store at {path} is read-only")]
    ReadOnly {
        /// Path of the store.
        path: String,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {reason}")]
    Config {
        /// The reason the configuration is invalid.
        reason: String,
    },
}

impl MonitorError {
    /// Shorthand for a [`MonitorError::StorageUnavailable`] built from any displayable cause.
    pub(crate) fn storage(reason: impl std::fmt::Display) -> Self {
        Self::StorageUnavailable {
            reason: reason.to_string(),
        }
    }
}

/// Result type for sysmon-store operations.
pub type Result<T> = std::result::Result<T, MonitorError>;
