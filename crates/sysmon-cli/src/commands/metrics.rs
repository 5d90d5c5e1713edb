//! Metrics command implementation.
//!
//! Lists the metric names `measure` accepts.

use std::io::Write;

use serde::Serialize;
use sysmon_store::MetricRegistry;

use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay};

/// Handler for `sysmon metrics`.
pub struct MetricsCommand<'a> {
    registry: &'a MetricRegistry,
}

impl<'a> MetricsCommand<'a> {
    /// Creates a new metrics command handler.
    #[must_use]
    pub const fn new(registry: &'a MetricRegistry) -> Self {
        Self { registry }
    }

    /// Prints the known metric names.
    ///
    /// # Errors
    ///
    /// Returns error if writing fails.
    pub fn execute<W: Write>(&self, out: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let list = MetricList {
            metrics: self.registry.names().into_iter().map(String::from).collect(),
        };
        format.write(out, &list)
    }
}

/// Known metric names.
#[derive(Debug, Clone, Serialize)]
pub struct MetricList {
    /// Names, sorted.
    pub metrics: Vec<String>,
}

impl TableDisplay for MetricList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        for name in &self.metrics {
            writeln!(writer, "{name}")?;
        }
        Ok(())
    }
}
