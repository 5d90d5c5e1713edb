//! Show command implementation.
//!
//! Handles windowed queries with optional average and sum.

use std::io::Write;

use serde::Serialize;
use sysmon_store::{Aggregation, Clock, SampleQuery, ScanResult, SortOrder, StoreConfig};

use crate::cli::ShowArgs;
use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay, format_reading, truncate};

/// Handler for `sysmon show`.
pub struct ShowCommand<'a> {
    config: &'a StoreConfig,
    clock: &'a dyn Clock,
}

impl<'a> ShowCommand<'a> {
    /// Creates a new show command handler.
    #[must_use]
    pub const fn new(config: &'a StoreConfig, clock: &'a dyn Clock) -> Self {
        Self { config, clock }
    }

    /// Runs the query and prints rows and requested aggregates.
    ///
    /// # Errors
    ///
    /// Returns error if a time bound is malformed or the store cannot be read.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &ShowArgs,
    ) -> Result<(), CliError> {
        // One resolution, so both bounds share the same "now". A malformed
        // bound fails before the store is opened.
        let filter = build_query(args).resolve(self.clock)?;

        let store = super::open(self.config, true)?;
        let result = if filter.is_inverted() {
            ScanResult::default()
        } else {
            store.query(&filter)?
        };

        let scope = args.metric.clone().unwrap_or_else(|| "ALL".to_string());
        let mut aggregates = Vec::new();
        if args.average {
            aggregates.push(AggregateLine::new(Aggregation::Avg, &scope, &result));
        }
        if args.sum {
            aggregates.push(AggregateLine::new(Aggregation::Sum, &scope, &result));
        }

        let view = SampleTable {
            rows: result
                .samples
                .iter()
                .map(|row| SampleRow {
                    id: row.id.0,
                    timestamp: row.sample.timestamp_str(),
                    host: row.sample.host.clone(),
                    address: row.sample.address.clone(),
                    metric: row.sample.metric.clone(),
                    value: row.sample.value,
                })
                .collect(),
            skipped: result.skipped,
            aggregates,
        };
        format.write(out, &view)
    }
}

fn build_query(args: &ShowArgs) -> SampleQuery {
    let mut query = SampleQuery::new();
    query.metric.clone_from(&args.metric);
    query.host.clone_from(&args.host);
    query.start.clone_from(&args.start);
    query.end.clone_from(&args.end);
    query.limit = args.limit;
    if args.oldest_first {
        query = query.order(SortOrder::OldestFirst);
    }
    query
}

/// Rows shown by `sysmon show`.
#[derive(Debug, Clone, Serialize)]
pub struct SampleTable {
    /// Matching samples.
    pub rows: Vec<SampleRow>,
    /// Corrupt rows skipped while reading.
    pub skipped: usize,
    /// Requested aggregates.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aggregates: Vec<AggregateLine>,
}

/// One sample.
#[derive(Debug, Clone, Serialize)]
pub struct SampleRow {
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

/// An aggregate over the shown rows. `value` is `None` when no rows matched.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateLine {
    /// Aggregation applied.
    pub aggregation: Aggregation,
    /// Metric the rows were filtered to, or `ALL`.
    pub scope: String,
    /// Result.
    pub value: Option<f64>,
}

impl AggregateLine {
    fn new(aggregation: Aggregation, scope: &str, result: &ScanResult) -> Self {
        Self {
            aggregation,
            scope: scope.to_string(),
            value: result.aggregate(aggregation),
        }
    }
}

impl TableDisplay for SampleTable {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.rows.is_empty() {
            writeln!(writer, "(no data)")?;
        } else {
            writeln!(
                writer,
                "{:<20}  {:<16}  {:<15}  {:<16}  {:>10}",
                "TIMESTAMP", "HOST", "ADDRESS", "METRIC", "VALUE"
            )?;
            writeln!(writer, "{}", "─".repeat(85))?;
            for row in &self.rows {
                writeln!(
                    writer,
                    "{:<20}  {:<16}  {:<15}  {:<16}  {:>10}",
                    row.timestamp,
                    truncate(&row.host, 16),
                    truncate(&row.address, 15),
                    truncate(&row.metric, 16),
                    format_reading(row.value)
                )?;
            }
        }

        if self.skipped > 0 {
            writeln!(writer, "({} corrupt row(s) skipped)", self.skipped)?;
        }

        if !self.aggregates.is_empty() {
            writeln!(writer)?;
        }
        for agg in &self.aggregates {
            let value = agg.value.map_or_else(|| "no data".to_string(), format_reading);
            writeln!(writer, "{}({}) = {value}", agg.aggregation.label(), agg.scope)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Format;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use sysmon_store::{FixedClock, MonitorError, Sample, open_store};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 27, 16, 0, 0).unwrap()
    }

    fn seeded(dir: &tempfile::TempDir) -> StoreConfig {
        let config = StoreConfig::new(dir.path().join("m.db"));
        let store = open_store(config.clone()).unwrap();
        store.init().unwrap();
        store
            .insert_batch(&[
                Sample::new(now(), "host1", "10.0.0.1", "cpu-usage", 12.5),
                Sample::new(now(), "host1", "10.0.0.1", "memory-usage", 40.0),
                Sample::new(now() - TimeDelta::days(2), "host1", "10.0.0.1", "cpu-usage", 90.0),
            ])
            .unwrap();
        config
    }

    fn run(config: &StoreConfig, format: Format, args: &ShowArgs) -> Result<String, CliError> {
        let clock = FixedClock(now());
        let mut out = Vec::new();
        ShowCommand::new(config, &clock).execute(&mut out, &OutputFormat::new(format), args)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn average_of_recent_window() {
        let dir = tempfile::tempdir().unwrap();
        let config = seeded(&dir);
        let args = ShowArgs {
            start: Some("-1h".into()),
            average: true,
            ..ShowArgs::default()
        };

        let text = run(&config, Format::Table, &args).unwrap();
        assert!(text.contains("cpu-usage"));
        assert!(text.contains("Average(ALL) = 26.25"));
    }

    #[test]
    fn metric_filter_and_sum() {
        let dir = tempfile::tempdir().unwrap();
        let config = seeded(&dir);
        let args = ShowArgs {
            metric: Some("cpu-usage".into()),
            sum: true,
            ..ShowArgs::default()
        };

        let text = run(&config, Format::Table, &args).unwrap();
        assert!(text.contains("Total(cpu-usage) = 102.50"));
        assert!(!text.contains("memory-usage"));
    }

    #[test]
    fn empty_window_reports_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let config = seeded(&dir);
        let args = ShowArgs {
            start: Some("-1h".into()),
            end: Some("-2h".into()),
            average: true,
            ..ShowArgs::default()
        };

        let text = run(&config, Format::Table, &args).unwrap();
        assert!(text.contains("(no data)"));
        assert!(text.contains("Average(ALL) = no data"));
    }

    #[test]
    fn json_aggregate_is_null_without_rows() {
        let dir = tempfile::tempdir().unwrap();
        let config = seeded(&dir);
        let args = ShowArgs {
            metric: Some("disk-0-usage".into()),
            sum: true,
            ..ShowArgs::default()
        };

        let json: serde_json::Value =
            serde_json::from_str(&run(&config, Format::Json, &args).unwrap()).unwrap();
        assert_eq!(json["rows"].as_array().unwrap().len(), 0);
        assert!(json["aggregates"][0]["value"].is_null());
        assert_eq!(json["aggregates"][0]["aggregation"], "sum");
    }

    #[test]
    fn limit_and_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let config = seeded(&dir);
        let args = ShowArgs {
            limit: Some(1),
            oldest_first: true,
            ..ShowArgs::default()
        };

        let json: serde_json::Value =
            serde_json::from_str(&run(&config, Format::Json, &args).unwrap()).unwrap();
        let rows = json["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["value"], 90.0);
    }

    /// Advances one second on every read.
    struct TickingClock(std::sync::atomic::AtomicI64);

    impl Clock for TickingClock {
        fn now(&self) -> DateTime<Utc> {
            let tick = self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            now() + TimeDelta::seconds(tick)
        }
    }

    #[test]
    fn window_is_resolved_against_one_instant() {
        let dir = tempfile::tempdir().unwrap();
        let config = seeded(&dir);
        let clock = TickingClock(std::sync::atomic::AtomicI64::new(0));
        let args = ShowArgs {
            start: Some("-0m".into()),
            end: Some("-0m".into()),
            sum: true,
            ..ShowArgs::default()
        };

        let mut out = Vec::new();
        ShowCommand::new(&config, &clock)
            .execute(&mut out, &OutputFormat::new(Format::Table), &args)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Total(ALL) = 52.50"));
    }

    #[test]
    fn bad_time_spec_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = seeded(&dir);
        let args = ShowArgs {
            start: Some("yesterday".into()),
            ..ShowArgs::default()
        };

        assert!(matches!(
            run(&config, Format::Table, &args),
            Err(CliError::Store(MonitorError::InvalidTimeSpec { .. }))
        ));
    }

    #[test]
    fn show_does_not_create_a_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path().join("absent.db"));
        assert!(run(&config, Format::Table, &ShowArgs::default()).is_err());
        assert!(!config.path.exists());
    }
}
