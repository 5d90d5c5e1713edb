//! Store configuration.
//!
//! The store never falls back to a global default path: callers build a
//! [`StoreConfig`] (directly, from TOML, or from CLI flags) and hand it to
//! [`crate::store::open_store`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

/// Default bound on waiting for the write lock.
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 10_000;

/// Which persistence backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Indexed, transactional SQLite database.
    #[default]
    Sqlite,
    /// Flat append-only CSV file.
    Csv,
}

impl Backend {
    /// Policy applied when the config does not name one.
    #[must_use]
    pub const fn default_corrupt_row_policy(self) -> CorruptRowPolicy {
        match self {
            Self::Sqlite => CorruptRowPolicy::Fail,
            Self::Csv => CorruptRowPolicy::Skip,
        }
    }
}

/// What a bulk read does when it meets a row it cannot decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptRowPolicy {
    /// Skip the row, count it and keep reading.
    Skip,
    /// Abort the whole read with [`MonitorError::CorruptRecord`].
    Fail,
}

/// Configuration passed to a store constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// Storage location.
    pub path: PathBuf,
    /// Bound on the wait for the write lock, in milliseconds.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    /// Disables the write path.
    #[serde(default)]
    pub read_only: bool,
    /// Persistence backend.
    #[serde(default)]
    pub backend: Backend,
    /// Corrupt-row policy. `None` picks the backend's default.
    #[serde(default)]
    pub corrupt_rows: Option<CorruptRowPolicy>,
}

const fn default_write_timeout_ms() -> u64 {
    DEFAULT_WRITE_TIMEOUT_MS
}

impl StoreConfig {
    /// Creates a config for the given path with default settings.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            read_only: false,
            backend: Backend::default(),
            corrupt_rows: None,
        }
    }

    /// Sets the backend.
    #[must_use]
    pub const fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Sets the write-lock timeout.
    #[must_use]
    pub const fn with_write_timeout_ms(mut self, ms: u64) -> Self {
        self.write_timeout_ms = ms;
        self
    }

    /// Opens the store read-only.
    #[must_use]
    pub const fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Sets the corrupt-row policy explicitly.
    #[must_use]
    pub const fn with_corrupt_rows(mut self, policy: CorruptRowPolicy) -> Self {
        self.corrupt_rows = Some(policy);
        self
    }

    /// The effective corrupt-row policy.
    #[must_use]
    pub fn corrupt_row_policy(&self) -> CorruptRowPolicy {
        self.corrupt_rows
            .unwrap_or_else(|| self.backend.default_corrupt_row_policy())
    }

    /// The write-lock timeout as a [`Duration`].
    #[must_use]
    pub const fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| MonitorError::Config {
            reason: format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ),
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| MonitorError::Config {
            reason: format!("invalid TOML: {e}"),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(MonitorError::Config {
                reason: "store path cannot be empty".to_string(),
            });
        }

        if self.write_timeout_ms == 0 {
            return Err(MonitorError::Config {
                reason: "writeTimeoutMs must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
