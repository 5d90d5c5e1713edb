//! Durable store for host metric samples.
#![forbid(unsafe_code)]
//!
//! `sysmon-store` persists timestamped metric readings taken from a host
//! and answers time-windowed queries over them. It is the library behind
//! the `sysmon` command-line tool.
//!
//! # Features
//!
//! - **Two backends**: an indexed SQLite database (default) or a flat CSV file
//! - **Relative time windows**: `-30m`, `-1h`, `-2d` or ISO-8601 timestamps
//! - **Aggregates**: sum and average over any filtered window
//! - **Export**: portable CSV with fixed three-digit values
//! - **Retention**: prune samples older than N days, then compact
//! - **Multi-process safe**: writers serialize with a bounded wait
//!
//! # Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use sysmon_store::{FixedClock, Sample, SampleQuery, SampleStore, SqliteStore};
//!
//! let store = SqliteStore::open_in_memory().unwrap();
//! store.init().unwrap();
//!
//! let now = Utc.with_ymd_and_hms(2025, 9, 27, 16, 0, 0).unwrap();
//! store
//!     .insert(&Sample::new(now, "host1", "10.0.0.1", "cpu-usage", 12.5))
//!     .unwrap();
//!
//! let rows = SampleQuery::new()
//!     .metric("cpu-usage")
//!     .start("-1h")
//!     .execute(&store, &FixedClock(now))
//!     .unwrap();
//! assert_eq!(rows.average(), Some(12.5));
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod codec;
pub mod collect;
pub mod config;
pub mod error;
pub mod export;
pub mod query;
pub mod retention;
pub mod store;
pub mod timespec;
pub mod types;

// Re-export main types at crate root
pub use collect::{Batch, FnProvider, MetricProvider, MetricRegistry, Origin, collect_batch, record_batch};
pub use config::{Backend, CorruptRowPolicy, DEFAULT_WRITE_TIMEOUT_MS, StoreConfig};
pub use error::{MonitorError, Result};
pub use export::{ExportSummary, export_csv, export_to_path};
pub use query::SampleQuery;
pub use retention::{PruneReport, RetentionPolicy, apply_retention};
pub use store::{CsvStore, SampleStore, SqliteStore, open_store};
pub use timespec::{Clock, FixedClock, SystemClock, TimeSpec};
pub use types::{
    Aggregation, Sample, SampleFilter, SampleId, ScanResult, SortOrder, StoredSample,
    format_timestamp, parse_timestamp,
};
