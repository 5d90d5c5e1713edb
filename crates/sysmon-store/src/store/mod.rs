//! Durable sample storage.
//!
//! This module provides:
//! - [`SampleStore`] - the storage capability shared by every backend
//! - [`SqliteStore`] - indexed, transactional backend (default)
//! - [`CsvStore`] - flat append-only CSV file backend
//! - [`open_store`] - picks a backend from a [`StoreConfig`]
//!
//! Writers serialize against each other with a bounded wait; readers never
//! observe a partially written row.

mod csv;
mod sqlite;

pub use self::csv::CsvStore;
pub(crate) use self::csv::replace_file;
pub use self::sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::config::{Backend, CorruptRowPolicy, StoreConfig};
use crate::error::{MonitorError, Result};
use crate::types::{Sample, SampleFilter, SampleId, ScanResult, StoredSample};

/// Storage capability for samples.
///
/// Implementors must be safe to use from several independent processes
/// against the same file.
pub trait SampleStore: Send + Sync {
    /// Ensures the schema exists. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::StorageUnavailable`] if the medium cannot be written.
    fn init(&self) -> Result<()>;

    /// Appends one sample and returns its id. Existing rows are never touched.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::StorageUnavailable`] or [`MonitorError::ReadOnly`].
    fn insert(&self, sample: &Sample) -> Result<SampleId> {
        let ids = self.insert_batch(std::slice::from_ref(sample))?;
        ids.first().copied().ok_or_else(|| MonitorError::storage("insert returned no id"))
    }

    /// Appends all samples atomically, returning their ids in input order.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::StorageUnavailable`] or [`MonitorError::ReadOnly`].
    fn insert_batch(&self, samples: &[Sample]) -> Result<Vec<SampleId>>;

    /// Returns rows matching the filter, in the filter's order, capped by its limit.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::StorageUnavailable`] if the read fails, or
    /// [`MonitorError::CorruptRecord`] under [`CorruptRowPolicy::Fail`].
    fn query(&self, filter: &SampleFilter) -> Result<ScanResult>;

    /// Deletes every sample with a timestamp strictly before `cutoff` and
    /// returns how many were removed.
    ///
    /// This is deliberately destructive: there is no soft delete and no undo.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::StorageUnavailable`] or [`MonitorError::ReadOnly`].
    fn prune(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    /// Reclaims space after pruning. Never changes query results.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::StorageUnavailable`] or [`MonitorError::ReadOnly`].
    fn compact(&self) -> Result<()>;

    /// Returns every row in insertion (id) order.
    ///
    /// # Errors
    ///
    /// Same as [`SampleStore::query`].
    fn export_all(&self) -> Result<ScanResult>;

    /// Returns the number of stored rows.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::StorageUnavailable`] if the read fails.
    fn count(&self) -> Result<usize>;

    /// The configuration this store was opened with.
    fn config(&self) -> &StoreConfig;
}

/// Opens the backend named by the config.
///
/// # Errors
///
/// Returns [`MonitorError::Config`] for an invalid config, or
/// [`MonitorError::StorageUnavailable`] if the medium cannot be opened.
pub fn open_store(config: StoreConfig) -> Result<Box<dyn SampleStore>> {
    config.validate()?;
    match config.backend {
        Backend::Sqlite => Ok(Box::new(SqliteStore::open(config)?)),
        Backend::Csv => Ok(Box::new(CsvStore::open(config)?)),
    }
}

/// Collects decoded rows, applying the corrupt-row policy to failures.
pub(crate) struct RowCollector {
    policy: CorruptRowPolicy,
    samples: Vec<StoredSample>,
    skipped: usize,
}

impl RowCollector {
    pub(crate) const fn new(policy: CorruptRowPolicy) -> Self {
        Self {
            policy,
            samples: Vec::new(),
            skipped: 0,
        }
    }

    /// Accepts one decoded row, or handles a decode failure per policy.
    pub(crate) fn push(
        &mut self,
        row: std::result::Result<StoredSample, String>,
        location: impl FnOnce() -> String,
    ) -> Result<()> {
        match row {
            Ok(sample) => {
                self.samples.push(sample);
                Ok(())
            }
            Err(reason) => {
                let location = location();
                match self.policy {
                    CorruptRowPolicy::Skip => {
                        warn!(%location, %reason, "skipping corrupt record");
                        self.skipped += 1;
                        Ok(())
                    }
                    CorruptRowPolicy::Fail => Err(MonitorError::CorruptRecord { location, reason }),
                }
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.samples.len()
    }

    pub(crate) fn finish(self) -> ScanResult {
        ScanResult {
            samples: self.samples,
            skipped: self.skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SampleId;
    use chrono::TimeZone;

    fn stored(id: i64) -> StoredSample {
        StoredSample {
            id: SampleId(id),
            sample: Sample::new(
                Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                "h",
                "a",
                "cpu-usage",
                1.0,
            ),
        }
    }

    #[test]
    fn collector_skip_counts_failures() {
        let mut rows = RowCollector::new(CorruptRowPolicy::Skip);
        rows.push(Ok(stored(1)), || "id 1".into()).unwrap();
        rows.push(Err("bad timestamp".into()), || "id 2".into()).unwrap();
        rows.push(Ok(stored(3)), || "id 3".into()).unwrap();

        let result = rows.finish();
        assert_eq!(result.len(), 2);
        assert_eq!(result.skipped, 1);
    }

    #[test]
    fn collector_fail_aborts_with_location() {
        let mut rows = RowCollector::new(CorruptRowPolicy::Fail);
        rows.push(Ok(stored(1)), || "id 1".into()).unwrap();
        let err = rows
            .push(Err("bad timestamp".into()), || "id 2".into())
            .unwrap_err();

        match err {
            MonitorError::CorruptRecord { location, reason } => {
                assert_eq!(location, "id 2");
                assert_eq!(reason, "bad timestamp");
            }
            other => panic!("expected CorruptRecord, got {other:?}"),
        }
    }

    #[test]
    fn open_store_rejects_invalid_config() {
        let config = StoreConfig::new("").with_backend(Backend::Csv);
        assert!(matches!(
            open_store(config),
            Err(MonitorError::Config { .. })
        ));
    }
}
