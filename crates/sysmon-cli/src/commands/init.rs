//! Init command implementation.

use std::io::Write;

use serde::Serialize;
use sysmon_store::{Backend, StoreConfig};

use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay};

/// Handler for `sysmon init`.
pub struct InitCommand<'a> {
    config: &'a StoreConfig,
}

impl<'a> InitCommand<'a> {
    /// Creates a new init command handler.
    #[must_use]
    pub const fn new(config: &'a StoreConfig) -> Self {
        Self { config }
    }

    /// Creates the store, or does nothing if it already exists.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be created.
    pub fn execute<W: Write>(&self, out: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let store = super::open(self.config, false)?;
        store.init()?;

        let report = InitReport {
            path: self.config.path.display().to_string(),
            backend: self.config.backend,
            rows: store.count()?,
        };
        format.write(out, &report)
    }
}

/// Result of `sysmon init`.
#[derive(Debug, Clone, Serialize)]
pub struct InitReport {
    /// Store path.
    pub path: String,
    /// Backend in use.
    pub backend: Backend,
    /// Rows already present.
    pub rows: usize,
}

impl TableDisplay for InitReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let backend = match self.backend {
            Backend::Sqlite => "sqlite",
            Backend::Csv => "csv",
        };
        writeln!(writer, "Store initialized at {} ({backend})", self.path)?;
        if self.rows > 0 {
            writeln!(writer, "Existing samples: {}", self.rows)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Format;

    #[test]
    fn init_twice_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path().join("m.db"));
        let cmd = InitCommand::new(&config);

        let mut out = Vec::new();
        cmd.execute(&mut out, &OutputFormat::new(Format::Table)).unwrap();
        cmd.execute(&mut out, &OutputFormat::new(Format::Table)).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("Store initialized").count(), 2);
        assert!(config.path.exists());
    }

    #[test]
    fn json_report_names_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path().join("m.csv")).with_backend(Backend::Csv);

        let mut out = Vec::new();
        InitCommand::new(&config)
            .execute(&mut out, &OutputFormat::new(Format::Json))
            .unwrap();

        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["backend"], "csv");
        assert_eq!(json["rows"], 0);
    }
}
