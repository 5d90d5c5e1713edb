//! Export command implementation.

use std::io::Write;

use serde::Serialize;
use sysmon_store::{StoreConfig, export_to_path};

use crate::cli::ExportArgs;
use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay};

/// Handler for `sysmon export`.
pub struct ExportCommand<'a> {
    config: &'a StoreConfig,
}

impl<'a> ExportCommand<'a> {
    /// Creates a new export command handler.
    #[must_use]
    pub const fn new(config: &'a StoreConfig) -> Self {
        Self { config }
    }

    /// Writes every stored sample to the destination file.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read or the file cannot be written.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &ExportArgs,
    ) -> Result<(), CliError> {
        let store = super::open(self.config, true)?;
        let summary = export_to_path(store.as_ref(), &args.out)?;

        let report = ExportReport {
            path: args.out.display().to_string(),
            rows: summary.rows,
            skipped: summary.skipped,
        };
        format.write(out, &report)
    }
}

/// Result of `sysmon export`.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    /// Destination file.
    pub path: String,
    /// Rows written.
    pub rows: usize,
    /// Corrupt rows left out.
    pub skipped: usize,
}

impl TableDisplay for ExportReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Exported {} rows to {}", self.rows, self.path)?;
        if self.skipped > 0 {
            writeln!(writer, "Skipped {} corrupt row(s)", self.skipped)?;
        }
        Ok(())
    }
}
