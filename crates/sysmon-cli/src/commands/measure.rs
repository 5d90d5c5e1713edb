//! Measure command implementation.
//!
//! Reads the requested metrics once and appends them to the store. A
//! metric that cannot be read is reported and skipped; the command only
//! fails when nothing could be recorded.

use std::io::Write;

use serde::Serialize;
use sysmon_store::{Clock, MetricRegistry, StoreConfig, collect_batch, record_batch};

use crate::cli::MeasureArgs;
use crate::error::CliError;
use crate::identity::resolve_origin;
use crate::output::{OutputFormat, TableDisplay, format_reading};
use crate::system::system_registry;

/// Handler for `sysmon measure`.
pub struct MeasureCommand<'a> {
    config: &'a StoreConfig,
    clock: &'a dyn Clock,
    registry: MetricRegistry,
}

impl<'a> MeasureCommand<'a> {
    /// Creates a handler reading this host's metrics.
    #[must_use]
    pub fn new(config: &'a StoreConfig, clock: &'a dyn Clock) -> Self {
        Self {
            config,
            clock,
            registry: system_registry(),
        }
    }

    /// Replaces the metric providers.
    #[must_use]
    pub fn with_registry(mut self, registry: MetricRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Collects and records the requested metrics.
    ///
    /// Failures for individual metrics go to `err`.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be written or no metric was recorded.
    pub fn execute<W: Write, E: Write>(
        &self,
        out: &mut W,
        err: &mut E,
        format: &OutputFormat,
        args: &MeasureArgs,
    ) -> Result<(), CliError> {
        let origin = resolve_origin(args.host.as_deref(), args.address.as_deref());
        let mut batch = collect_batch(&self.registry, &args.metrics, &origin, self.clock);

        for (name, e) in &batch.failures {
            writeln!(err, "warning: skipping {name}: {e}")?;
        }

        if batch.is_empty() {
            return Err(match batch.failures.len() {
                1 => batch.failures.swap_remove(0).1.into(),
                _ => CliError::Command("no metric could be recorded".into()),
            });
        }

        let store = super::open(self.config, false)?;
        store.init()?;
        let ids = record_batch(store.as_ref(), &batch)?;

        let report = MeasureReport {
            recorded: ids
                .iter()
                .zip(&batch.samples)
                .map(|(id, s)| RecordedReading {
                    id: id.0,
                    timestamp: s.timestamp_str(),
                    host: s.host.clone(),
                    address: s.address.clone(),
                    metric: s.metric.clone(),
                    value: s.value,
                })
                .collect(),
            failed: batch
                .failures
                .iter()
                .map(|(metric, e)| FailedMetric {
                    metric: metric.clone(),
                    reason: e.to_string(),
                })
                .collect(),
            verbose: args.verbose,
        };
        format.write(out, &report)
    }
}

/// Result of `sysmon measure`.
#[derive(Debug, Clone, Serialize)]
pub struct MeasureReport {
    /// Readings written to the store.
    pub recorded: Vec<RecordedReading>,
    /// Metrics that produced no reading.
    pub failed: Vec<FailedMetric>,
    #[serde(skip)]
    verbose: bool,
}

/// One stored reading.
#[derive(Debug, Clone, Serialize)]
pub struct RecordedReading {
    /// Store id.
    pub id: i64,
    /// UTC timestamp.
    pub timestamp: String,
    /// Host.
    pub host: String,
    /// Address.
    pub address: String,
    /// Metric name.
    pub metric: String,
    /// Reading.
    pub value: f64,
}

/// A metric that could not be read.
#[derive(Debug, Clone, Serialize)]
pub struct FailedMetric {
    /// Metric name.
    pub metric: String,
    /// Why it failed.
    pub reason: String,
}

impl TableDisplay for MeasureReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.verbose {
            for r in &self.recorded {
                writeln!(
                    writer,
                    "{} | {} | {} | {} | {}",
                    r.timestamp,
                    r.host,
                    r.address,
                    r.metric,
                    format_reading(r.value)
                )?;
            }
        }
        writeln!(writer, "Recorded {} sample(s)", self.recorded.len())?;
        Ok(())
    }
}
