//! CSV export of the whole store.
//!
//! Output is UTF-8 with the header `timestamp,host,address,metric,value`
//! and one line per sample in id order. Values carry exactly three
//! fractional digits.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::codec;
use crate::error::{MonitorError, Result};
use crate::store::{SampleStore, replace_file};
use crate::types::StoredSample;

/// Column header of exported files.
pub const EXPORT_HEADER: [&str; 5] = ["timestamp", "host", "address", "metric", "value"];

/// Outcome of an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    /// Rows written.
    pub rows: usize,
    /// Rows skipped as corrupt while reading the store.
    pub skipped: usize,
}

/// Formats a value the way exports carry it.
#[must_use]
pub fn format_value(value: f64) -> String {
    format!("{value:.3}")
}

/// Writes every sample to `writer`. The store is only read.
///
/// # Errors
///
/// Returns any error raised by the store read, or
/// [`MonitorError::StorageUnavailable`] if the writer fails.
pub fn export_csv<W: Write>(store: &dyn SampleStore, writer: &mut W) -> Result<ExportSummary> {
    let result = store.export_all()?;
    write_rows(writer, &result.samples)?;
    if result.skipped > 0 {
        warn!(skipped = result.skipped, "export omitted corrupt rows");
    }

    Ok(ExportSummary {
        rows: result.samples.len(),
        skipped: result.skipped,
    })
}

/// Exports to a file, replacing it atomically if it exists.
///
/// # Errors
///
/// Same as [`export_csv`], plus [`MonitorError::StorageUnavailable`] if the
/// destination cannot be written.
pub fn export_to_path(store: &dyn SampleStore, path: &Path) -> Result<ExportSummary> {
    let mut buf = Vec::new();
    let summary = export_csv(store, &mut buf)?;
    replace_file(path, &buf)?;

    info!(path = %path.display(), rows = summary.rows, "exported samples");
    Ok(summary)
}

fn write_rows<W: Write>(writer: &mut W, rows: &[StoredSample]) -> Result<()> {
    codec::write_record(writer, &EXPORT_HEADER).map_err(MonitorError::storage)?;
    for row in rows {
        let sample = &row.sample;
        let ts = sample.timestamp_str();
        let value = format_value(sample.value);
        codec::write_record(
            writer,
            &[&ts, &sample.host, &sample.address, &sample.metric, &value],
        )
        .map_err(MonitorError::storage)?;
    }
    writer.flush().map_err(MonitorError::storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::Sample;
    use chrono::{TimeZone, Utc};
    use test_case::test_case;

    fn seeded() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init().unwrap();
        let ts = Utc.with_ymd_and_hms(2025, 9, 27, 15, 0, 0).unwrap();
        store
            .insert_batch(&[
                Sample::new(ts, "host1", "10.0.0.1", "cpu-usage", 12.5),
                Sample::new(ts, "host1", "10.0.0.1", "memory-usage", 40.0),
            ])
            .unwrap();
        store
    }

    #[test_case(12.5, "12.500" ; "pads fraction")]
    #[test_case(0.0, "0.000" ; "zero")]
    #[test_case(1e20, "100000000000000000000.000" ; "no scientific notation")]
    #[test_case(1.0 / 3.0, "0.333" ; "rounds to three digits")]
    fn value_formatting(value: f64, expected: &str) {
        assert_eq!(format_value(value), expected);
    }

    #[test]
    fn writes_header_and_rows_in_id_order() {
        let mut out = Vec::new();
        let summary = export_csv(&seeded(), &mut out).unwrap();

        assert_eq!(summary, ExportSummary { rows: 2, skipped: 0 });
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "timestamp,host,address,metric,value\n\
             2025-09-27T15:00:00Z,host1,10.0.0.1,cpu-usage,12.500\n\
             2025-09-27T15:00:00Z,host1,10.0.0.1,memory-usage,40.000\n"
        );
    }

    #[test]
    fn empty_store_exports_header_only() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init().unwrap();
        let mut out = Vec::new();
        export_csv(&store, &mut out).unwrap();
        assert_eq!(out, b"timestamp,host,address,metric,value\n");
    }

    #[test]
    fn export_to_path_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "stale").unwrap();

        let store = seeded();
        export_to_path(&store, &path).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        export_to_path(&store, &path).unwrap();
        let second = std::fs::read_to_string(&path).unwrap();

        assert!(first.starts_with("timestamp,"));
        assert_eq!(first, second);
        assert_eq!(store.count().unwrap(), 2);
    }
}
