//! Core types for the metrics store.
//!
//! This module provides the fundamental types used throughout the sysmon-store crate:
//! - [`Sample`]: A single reading with timestamp, origin, metric name and value
//! - [`StoredSample`]: A sample together with its store-assigned [`SampleId`]
//! - [`SampleFilter`]: Optional predicates for store queries
//! - [`Aggregation`]: Aggregation functions over a filtered result
//! - [`ScanResult`]: Rows returned by a read, with the count of skipped rows

use std::fmt;

use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Persisted timestamp layout: UTC, second precision, explicit `Z`.
///
/// Values in this layout sort lexicographically in time order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Formats an instant in the persisted layout.
#[must_use]
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a timestamp in the persisted layout.
///
/// Returns `None` for anything that does not match [`TIMESTAMP_FORMAT`] exactly.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// First whole second at or after `cutoff`.
///
/// Stored timestamps carry whole seconds, so `ts < prune_bound(cutoff)`
/// selects exactly the rows strictly before `cutoff`. Every backend prunes
/// against this bound.
pub(crate) fn prune_bound(cutoff: &DateTime<Utc>) -> DateTime<Utc> {
    let floor = cutoff.trunc_subsecs(0);
    if floor == *cutoff {
        return floor;
    }
    floor
        .checked_add_signed(TimeDelta::seconds(1))
        .unwrap_or(floor)
}

/// Store-assigned surrogate key. Strictly increasing, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleId(pub i64);

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single metric reading.
///
/// Samples are append-only: once written they are never updated, only
/// removed in bulk by pruning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Instant of observation, UTC, whole seconds.
    pub timestamp: DateTime<Utc>,
    /// Identifier of the measured system.
    pub host: String,
    /// Network address of the measured system.
    pub address: String,
    /// Metric name, e.g. `cpu-usage`.
    pub metric: String,
    /// The reading. Unit is implied by the metric name.
    pub value: f64,
}

impl Sample {
    /// Creates a new sample. Sub-second precision is truncated.
    #[must_use]
    pub fn new(
        timestamp: DateTime<Utc>,
        host: impl Into<String>,
        address: impl Into<String>,
        metric: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            timestamp: timestamp.trunc_subsecs(0),
            host: host.into(),
            address: address.into(),
            metric: metric.into(),
            value,
        }
    }

    /// Returns the timestamp in the persisted layout.
    #[must_use]
    pub fn timestamp_str(&self) -> String {
        format_timestamp(&self.timestamp)
    }
}

/// A sample as read back from a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSample {
    /// Store-assigned id.
    pub id: SampleId,
    /// The persisted reading.
    #[serde(flatten)]
    pub sample: Sample,
}

/// Ordering of query results by timestamp. Ties are broken by id in the same direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Most recent first.
    #[default]
    NewestFirst,
    /// Oldest first.
    OldestFirst,
}

/// Filter for store queries. Every field is optional; an empty filter
/// matches every row.
///
/// Both time bounds are inclusive and compared at whole-second precision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleFilter {
    /// Exact metric name.
    pub metric: Option<String>,
    /// Exact host.
    pub host: Option<String>,
    /// Inclusive lower bound.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    pub end: Option<DateTime<Utc>>,
    /// Maximum number of rows.
    pub limit: Option<usize>,
    /// Result ordering.
    #[serde(default)]
    pub order: SortOrder,
}

impl SampleFilter {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one metric.
    #[must_use]
    pub fn metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = Some(metric.into());
        self
    }

    /// Restricts to one host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the inclusive lower bound.
    #[must_use]
    pub fn start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Sets the inclusive upper bound.
    #[must_use]
    pub fn end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Caps the number of returned rows.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the result ordering.
    #[must_use]
    pub const fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Lower bound at stored precision.
    #[must_use]
    pub fn start_bound(&self) -> Option<DateTime<Utc>> {
        self.start.map(|t| t.trunc_subsecs(0))
    }

    /// Upper bound at stored precision.
    #[must_use]
    pub fn end_bound(&self) -> Option<DateTime<Utc>> {
        self.end.map(|t| t.trunc_subsecs(0))
    }

    /// Returns true if start is after end, which no row can satisfy.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        matches!((self.start_bound(), self.end_bound()), (Some(s), Some(e)) if s > e)
    }

    /// Checks whether a sample satisfies every predicate (limit and order aside).
    #[must_use]
    pub fn matches(&self, sample: &Sample) -> bool {
        if self.metric.as_ref().is_some_and(|m| *m != sample.metric) {
            return false;
        }
        if self.host.as_ref().is_some_and(|h| *h != sample.host) {
            return false;
        }
        if self.start_bound().is_some_and(|s| sample.timestamp < s) {
            return false;
        }
        if self.end_bound().is_some_and(|e| sample.timestamp > e) {
            return false;
        }
        true
    }
}

/// Aggregation functions over a filtered result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Sum of all values.
    Sum,
    /// Unweighted arithmetic mean.
    Avg,
    /// Minimum value.
    Min,
    /// Maximum value.
    Max,
    /// Number of rows.
    Count,
}

impl Aggregation {
    /// Applies this aggregation to a slice of values.
    ///
    /// Returns `None` if the slice is empty, so that "no data" stays
    /// distinguishable from a computed zero.
    #[must_use]
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }

        match self {
            Self::Sum => Some(values.iter().sum()),
            Self::Avg => Some(values.iter().sum::<f64>() / values.len() as f64),
            Self::Min => values.iter().copied().reduce(f64::min),
            Self::Max => values.iter().copied().reduce(f64::max),
            Self::Count => Some(values.len() as f64),
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Sum => "Total",
            Self::Avg => "Average",
            Self::Min => "Minimum",
            Self::Max => "Maximum",
            Self::Count => "Count",
        }
    }
}

/// Rows returned by a store read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Decoded rows in the requested order.
    pub samples: Vec<StoredSample>,
    /// Rows skipped as corrupt under [`crate::config::CorruptRowPolicy::Skip`].
    pub skipped: usize,
}

impl ScanResult {
    /// Creates a result with no skipped rows.
    #[must_use]
    pub const fn new(samples: Vec<StoredSample>) -> Self {
        Self { samples, skipped: 0 }
    }

    /// Number of decoded rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if no rows were decoded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Values of the decoded rows, in result order.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.sample.value).collect()
    }

    /// Applies an aggregation over the decoded rows.
    #[must_use]
    pub fn aggregate(&self, aggregation: Aggregation) -> Option<f64> {
        aggregation.apply(&self.values())
    }

    /// Sum of values, `None` when there are no rows.
    #[must_use]
    pub fn sum(&self) -> Option<f64> {
        self.aggregate(Aggregation::Sum)
    }

    /// Mean of values, `None` when there are no rows.
    #[must_use]
    pub fn average(&self) -> Option<f64> {
        self.aggregate(Aggregation::Avg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 27, h, m, s).unwrap()
    }

    mod timestamp_tests {
        use super::*;

        #[test]
        fn format_uses_z_suffix() {
            assert_eq!(format_timestamp(&at(16, 0, 0)), "2025-09-27T16:00:00Z");
        }

        #[test]
        fn parse_accepts_persisted_layout() {
            assert_eq!(parse_timestamp("2025-09-27T15:30:05Z"), Some(at(15, 30, 5)));
        }

        #[test]
        fn parse_rejects_other_layouts() {
            assert!(parse_timestamp("2025-09-27 15:30:05").is_none());
            assert!(parse_timestamp("2025-09-27T15:30:05").is_none());
            assert!(parse_timestamp("").is_none());
        }

        #[test]
        fn persisted_layout_sorts_lexicographically() {
            let a = format_timestamp(&at(9, 59, 59));
            let b = format_timestamp(&at(10, 0, 0));
            assert!(a < b);
        }

        #[test]
        fn prune_bound_rounds_fractions_up() {
            let fractional = at(10, 0, 0) + chrono::Duration::milliseconds(500);
            assert_eq!(prune_bound(&fractional), at(10, 0, 1));
            assert_eq!(prune_bound(&at(10, 0, 0)), at(10, 0, 0));
        }
    }

    mod sample_tests {
        use super::*;

        #[test]
        fn new_truncates_subseconds() {
            let ts = at(12, 0, 0) + chrono::Duration::milliseconds(750);
            let sample = Sample::new(ts, "host1", "10.0.0.1", "cpu-usage", 1.0);
            assert_eq!(sample.timestamp, at(12, 0, 0));
            assert_eq!(sample.timestamp_str(), "2025-09-27T12:00:00Z");
        }

        #[test]
        fn stored_sample_serializes_flat() {
            let stored = StoredSample {
                id: SampleId(3),
                sample: Sample::new(at(12, 0, 0), "h", "a", "cpu-usage", 2.5),
            };
            let json = serde_json::to_value(&stored).unwrap();
            assert_eq!(json["id"], 3);
            assert_eq!(json["metric"], "cpu-usage");
            assert_eq!(json["timestamp"], "2025-09-27T12:00:00Z");
        }
    }

    mod filter_tests {
        use super::*;

        fn sample(ts: DateTime<Utc>, metric: &str) -> Sample {
            Sample::new(ts, "host1", "10.0.0.1", metric, 1.0)
        }

        #[test]
        fn empty_filter_matches_everything() {
            let filter = SampleFilter::new();
            assert!(filter.matches(&sample(at(0, 0, 0), "cpu-usage")));
            assert!(!filter.is_inverted());
        }

        #[test]
        fn bounds_are_inclusive() {
            let filter = SampleFilter::new().start(at(10, 0, 0)).end(at(11, 0, 0));
            assert!(filter.matches(&sample(at(10, 0, 0), "m")));
            assert!(filter.matches(&sample(at(11, 0, 0), "m")));
            assert!(!filter.matches(&sample(at(9, 59, 59), "m")));
            assert!(!filter.matches(&sample(at(11, 0, 1), "m")));
        }

        #[test]
        fn bounds_compare_at_second_precision() {
            let start = at(10, 0, 0) + chrono::Duration::milliseconds(400);
            let filter = SampleFilter::new().start(start);
            assert!(filter.matches(&sample(at(10, 0, 0), "m")));
        }

        #[test]
        fn metric_and_host_are_exact() {
            let filter = SampleFilter::new().metric("cpu-usage").host("host1");
            assert!(filter.matches(&sample(at(0, 0, 0), "cpu-usage")));
            assert!(!filter.matches(&sample(at(0, 0, 0), "cpu-usage-2")));

            let other_host = Sample::new(at(0, 0, 0), "host2", "a", "cpu-usage", 1.0);
            assert!(!filter.matches(&other_host));
        }

        #[test]
        fn inverted_window_detected() {
            let filter = SampleFilter::new().start(at(11, 0, 0)).end(at(10, 0, 0));
            assert!(filter.is_inverted());

            let same = SampleFilter::new().start(at(10, 0, 0)).end(at(10, 0, 0));
            assert!(!same.is_inverted());
        }

        #[test]
        fn default_order_is_newest_first() {
            assert_eq!(SampleFilter::new().order, SortOrder::NewestFirst);
        }
    }

    mod aggregation_tests {
        use super::*;

        #[test]
        fn empty_input_yields_none() {
            for agg in [
                Aggregation::Sum,
                Aggregation::Avg,
                Aggregation::Min,
                Aggregation::Max,
                Aggregation::Count,
            ] {
                assert!(agg.apply(&[]).is_none());
            }
        }

        #[test]
        fn sum_of_zeros_is_some_zero() {
            assert_eq!(Aggregation::Sum.apply(&[0.0, 0.0]), Some(0.0));
        }

        #[test]
        fn average_is_unweighted_mean() {
            let avg = Aggregation::Avg.apply(&[12.5, 40.0]).unwrap();
            assert!((avg - 26.25).abs() < f64::EPSILON);
        }

        #[test]
        fn min_max_count() {
            let values = [3.0, 1.0, 2.0];
            assert_eq!(Aggregation::Min.apply(&values), Some(1.0));
            assert_eq!(Aggregation::Max.apply(&values), Some(3.0));
            assert_eq!(Aggregation::Count.apply(&values), Some(3.0));
        }
    }

    mod scan_result_tests {
        use super::*;

        #[test]
        fn aggregates_over_rows() {
            let rows = vec![
                StoredSample {
                    id: SampleId(1),
                    sample: Sample::new(at(0, 0, 0), "h", "a", "cpu-usage", 12.5),
                },
                StoredSample {
                    id: SampleId(2),
                    sample: Sample::new(at(0, 0, 0), "h", "a", "memory-usage", 40.0),
                },
            ];
            let result = ScanResult::new(rows);
            assert_eq!(result.len(), 2);
            assert_eq!(result.sum(), Some(52.5));
            assert_eq!(result.average(), Some(26.25));
        }

        #[test]
        fn empty_result_has_no_aggregate() {
            let result = ScanResult::default();
            assert!(result.is_empty());
            assert!(result.sum().is_none());
            assert!(result.average().is_none());
        }
    }
}
