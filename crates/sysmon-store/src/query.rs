//! Query engine: turns user-facing query parameters into a store read.
//!
//! Time bounds arrive as raw expressions and are resolved through
//! [`crate::timespec`] against an injected clock. Aggregates are computed
//! over the rows the store returns.

use tracing::debug;

use crate::error::Result;
use crate::store::SampleStore;
use crate::timespec::{Clock, FixedClock, TimeSpec};
use crate::types::{Aggregation, SampleFilter, ScanResult, SortOrder};

/// A query as a caller expresses it, before time expressions are resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleQuery {
    /// Exact metric name.
    pub metric: Option<String>,
    /// Exact host.
    pub host: Option<String>,
    /// Inclusive lower bound as a time expression.
    pub start: Option<String>,
    /// Inclusive upper bound as a time expression.
    pub end: Option<String>,
    /// Maximum number of rows.
    pub limit: Option<usize>,
    /// Result ordering.
    pub order: SortOrder,
}

impl SampleQuery {
    /// Creates a query that matches every row.
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

    /// Sets the lower bound expression, e.g. `-1h`.
    #[must_use]
    pub fn start(mut self, spec: impl Into<String>) -> Self {
        self.start = Some(spec.into());
        self
    }

    /// Sets the upper bound expression.
    #[must_use]
    pub fn end(mut self, spec: impl Into<String>) -> Self {
        self.end = Some(spec.into());
        self
    }

    /// Caps the number of rows.
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

    /// Resolves time expressions into a concrete filter.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MonitorError::InvalidTimeSpec`] if either bound is malformed.
    pub fn resolve(&self, clock: &dyn Clock) -> Result<SampleFilter> {
        // Both bounds are relative to the same instant.
        let now = FixedClock(clock.now());
        let start = self
            .start
            .as_deref()
            .map(|spec| TimeSpec::parse(spec)?.resolve(&now))
            .transpose()?;
        let end = self
            .end
            .as_deref()
            .map(|spec| TimeSpec::parse(spec)?.resolve(&now))
            .transpose()?;

        Ok(SampleFilter {
            metric: self.metric.clone(),
            host: self.host.clone(),
            start,
            end,
            limit: self.limit,
            order: self.order,
        })
    }

    /// Resolves the query and runs it against a store.
    ///
    /// A window whose start is after its end yields an empty result without
    /// touching the store.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MonitorError::InvalidTimeSpec`] for a malformed bound,
    /// or any error the store reports.
    pub fn execute(&self, store: &dyn SampleStore, clock: &dyn Clock) -> Result<ScanResult> {
        let filter = self.resolve(clock)?;
        if filter.is_inverted() {
            debug!(start = ?filter.start, end = ?filter.end, "inverted window, returning no rows");
            return Ok(ScanResult::default());
        }

        let result = store.query(&filter)?;
        debug!(
            metric = ?filter.metric,
            host = ?filter.host,
            rows = result.len(),
            skipped = result.skipped,
            "query complete"
        );
        Ok(result)
    }

    /// Runs the query and applies one aggregation to the matching values.
    ///
    /// # Errors
    ///
    /// Same as [`SampleQuery::execute`].
    pub fn aggregate(
        &self,
        store: &dyn SampleStore,
        clock: &dyn Clock,
        aggregation: Aggregation,
    ) -> Result<Option<f64>> {
        Ok(self.execute(store, clock)?.aggregate(aggregation))
    }
}
