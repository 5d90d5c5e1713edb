//! Prune command implementation.
//!
//! Deletion is permanent. There is no dry run and no undo.

use std::io::Write;

use serde::Serialize;
use sysmon_store::{Clock, PruneReport, RetentionPolicy, StoreConfig, apply_retention, format_timestamp};

use crate::cli::PruneArgs;
use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay};

/// Handler for `sysmon prune`.
pub struct PruneCommand<'a> {
    config: &'a StoreConfig,
    clock: &'a dyn Clock,
}

impl<'a> PruneCommand<'a> {
    /// Creates a new prune command handler.
    #[must_use]
    pub const fn new(config: &'a StoreConfig, clock: &'a dyn Clock) -> Self {
        Self { config, clock }
    }

    /// Deletes samples older than the retention period.
    ///
    /// # Errors
    ///
    /// Returns error if the store is read-only or cannot be written.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &PruneArgs,
    ) -> Result<(), CliError> {
        let store = super::open(self.config, false)?;
        let policy = RetentionPolicy::days(args.retention_days);
        let report = apply_retention(store.as_ref(), policy, self.clock, args.compact)?;

        format.write(
            out,
            &PruneView {
                retention_days: args.retention_days,
                report,
            },
        )
    }
}

/// Result of `sysmon prune`.
#[derive(Debug, Clone, Serialize)]
pub struct PruneView {
    /// Requested retention.
    pub retention_days: u32,
    /// What was done.
    #[serde(flatten)]
    pub report: PruneReport,
}

impl TableDisplay for PruneView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(
            writer,
            "Deleted {} rows older than {} days (before {})",
            self.report.deleted,
            self.retention_days,
            format_timestamp(&self.report.cutoff)
        )?;
        if self.report.compacted {
            writeln!(writer, "Store compacted")?;
        }
        Ok(())
    }
}
