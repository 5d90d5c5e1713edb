//! SQLite backend.
//!
//! WAL journaling lets readers proceed while a writer commits. Writers open
//! `IMMEDIATE` transactions and wait at most `writeTimeoutMs` for the lock.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, OpenFlags, Row, TransactionBehavior, params, params_from_iter};
use tracing::{debug, info};

use super::{RowCollector, SampleStore};
use crate::config::StoreConfig;
use crate::error::{MonitorError, Result};
use crate::types::{
    Sample, SampleFilter, SampleId, ScanResult, SortOrder, StoredSample, format_timestamp,
    parse_timestamp, prune_bound,
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS sample (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ts TEXT NOT NULL,
        host TEXT NOT NULL,
        address TEXT NOT NULL,
        metric TEXT NOT NULL,
        value REAL NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_sample_host_metric_ts ON sample(host, metric, ts);
    CREATE INDEX IF NOT EXISTS idx_sample_ts ON sample(ts);
";

const SELECT_COLUMNS: &str = "SELECT id, ts, host, address, metric, value FROM sample";

/// Sample store backed by a single SQLite database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    config: StoreConfig,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Opens (creating if needed) the database named by the config.
    ///
    /// A read-only store requires the file to exist already.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::StorageUnavailable`] if the database cannot be opened.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let conn = if config.read_only {
            Connection::open_with_flags(&config.path, OpenFlags::SQLITE_OPEN_READ_ONLY)
                .map_err(|e| open_error(&config.path, e))?
        } else {
            if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| open_error(&config.path, e))?;
            }
            Connection::open(&config.path).map_err(|e| open_error(&config.path, e))?
        };

        let store = Self::with_connection(conn, config)?;
        if !store.config.read_only {
            store
                .conn
                .lock()
                .execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
                .map_err(MonitorError::storage)?;
        }
        Ok(store)
    }

    /// Opens a private in-memory database. Useful for tests.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::StorageUnavailable`] if SQLite cannot allocate it.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(MonitorError::storage)?;
        Self::with_connection(conn, StoreConfig::new(":memory:"))
    }

    fn with_connection(conn: Connection, config: StoreConfig) -> Result<Self> {
        conn.busy_timeout(config.write_timeout())
            .map_err(MonitorError::storage)?;
        debug!(path = %config.path.display(), read_only = config.read_only, "opened sqlite store");
        Ok(Self {
            conn: Mutex::new(conn),
            config,
        })
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.config.read_only {
            return Err(MonitorError::ReadOnly {
                path: self.config.path.display().to_string(),
            });
        }
        Ok(())
    }

    fn select(&self, sql: &str, args: Vec<Value>) -> Result<ScanResult> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql).map_err(MonitorError::storage)?;
        let mut rows = stmt
            .query(params_from_iter(args))
            .map_err(MonitorError::storage)?;

        let mut collector = RowCollector::new(self.config.corrupt_row_policy());
        while let Some(row) = rows.next().map_err(MonitorError::storage)? {
            let id: Option<i64> = row.get(0).ok();
            collector.push(decode_row(row), || match id {
                Some(id) => format!("row id {id}"),
                None => "row with unreadable id".to_string(),
            })?;
        }
        Ok(collector.finish())
    }
}

impl SampleStore for SqliteStore {
    fn init(&self) -> Result<()> {
        self.ensure_writable()?;
        let conn = self.conn.lock();
        conn.execute_batch(SCHEMA).map_err(MonitorError::storage)?;
        debug!(path = %self.config.path.display(), "schema ready");
        Ok(())
    }

    fn insert_batch(&self, samples: &[Sample]) -> Result<Vec<SampleId>> {
        self.ensure_writable()?;
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(MonitorError::storage)?;

        let mut ids = Vec::with_capacity(samples.len());
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO sample (ts, host, address, metric, value) VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(MonitorError::storage)?;
            for sample in samples {
                stmt.execute(params![
                    sample.timestamp_str(),
                    sample.host,
                    sample.address,
                    sample.metric,
                    sample.value,
                ])
                .map_err(MonitorError::storage)?;
                ids.push(SampleId(tx.last_insert_rowid()));
            }
        }
        tx.commit().map_err(MonitorError::storage)?;

        debug!(rows = ids.len(), "inserted samples");
        Ok(ids)
    }

    fn query(&self, filter: &SampleFilter) -> Result<ScanResult> {
        if filter.is_inverted() {
            return Ok(ScanResult::default());
        }

        let (sql, args) = build_query(filter);
        self.select(&sql, args)
    }

    fn prune(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.ensure_writable()?;
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(MonitorError::storage)?;
        let bound = format_timestamp(&prune_bound(&cutoff));
        let deleted = tx
            .execute("DELETE FROM sample WHERE ts < ?1", params![bound])
            .map_err(MonitorError::storage)?;
        tx.commit().map_err(MonitorError::storage)?;

        info!(cutoff = %format_timestamp(&cutoff), deleted, "pruned samples");
        Ok(deleted)
    }

    fn compact(&self) -> Result<()> {
        self.ensure_writable()?;
        let conn = self.conn.lock();
        conn.execute_batch("VACUUM;").map_err(MonitorError::storage)?;
        debug!(path = %self.config.path.display(), "vacuumed database");
        Ok(())
    }

    fn export_all(&self) -> Result<ScanResult> {
        self.select(&format!("{SELECT_COLUMNS} ORDER BY id ASC"), Vec::new())
    }

    fn count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sample", [], |row| row.get(0))
            .map_err(MonitorError::storage)?;
        usize::try_from(count).map_err(MonitorError::storage)
    }

    fn config(&self) -> &StoreConfig {
        &self.config
    }
}

/// Translates a filter into SQL with positional placeholders.
///
/// Only constant fragments are appended to the statement text; every
/// caller-supplied value is bound.
fn build_query(filter: &SampleFilter) -> (String, Vec<Value>) {
    let mut sql = String::from(SELECT_COLUMNS);
    let mut args: Vec<Value> = Vec::new();
    let mut clauses: Vec<&str> = Vec::new();

    if let Some(metric) = &filter.metric {
        args.push(Value::Text(metric.clone()));
        clauses.push("metric = ?");
    }
    if let Some(host) = &filter.host {
        args.push(Value::Text(host.clone()));
        clauses.push("host = ?");
    }
    if let Some(start) = filter.start_bound() {
        args.push(Value::Text(format_timestamp(&start)));
        clauses.push("ts >= ?");
    }
    if let Some(end) = filter.end_bound() {
        args.push(Value::Text(format_timestamp(&end)));
        clauses.push("ts <= ?");
    }

    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    sql.push_str(match filter.order {
        SortOrder::NewestFirst => " ORDER BY ts DESC, id DESC",
        SortOrder::OldestFirst => " ORDER BY ts ASC, id ASC",
    });

    if let Some(limit) = filter.limit {
        args.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        sql.push_str(" LIMIT ?");
    }

    (sql, args)
}

/// Decodes one row. The outer error is reserved for I/O; decode problems
/// are returned as a reason string so the corrupt-row policy can decide.
fn decode_row(row: &Row<'_>) -> std::result::Result<StoredSample, String> {
    let id = match row.get_ref(0).map_err(|e| e.to_string())? {
        ValueRef::Integer(id) => id,
        other => return Err(format!("id is {:?}, expected integer", other.data_type())),
    };
    let ts_text = text_column(row, 1, "ts")?;
    let timestamp =
        parse_timestamp(&ts_text).ok_or_else(|| format!("unparseable timestamp '{ts_text}'"))?;
    let host = text_column(row, 2, "host")?;
    let address = text_column(row, 3, "address")?;
    let metric = text_column(row, 4, "metric")?;
    let value = match row.get_ref(5).map_err(|e| e.to_string())? {
        ValueRef::Real(v) => v,
        #[allow(clippy::cast_precision_loss)]
        ValueRef::Integer(v) => v as f64,
        other => return Err(format!("value is {:?}, expected number", other.data_type())),
    };

    Ok(StoredSample {
        id: SampleId(id),
        sample: Sample {
            timestamp,
            host,
            address,
            metric,
            value,
        },
    })
}

fn text_column(row: &Row<'_>, idx: usize, name: &str) -> std::result::Result<String, String> {
    match row.get_ref(idx).map_err(|e| e.to_string())? {
        ValueRef::Text(bytes) => String::from_utf8(bytes.to_vec())
            .map_err(|_| format!("{name} is not valid UTF-8")),
        other => Err(format!("{name} is {:?}, expected text", other.data_type())),
    }
}

fn open_error(path: &Path, err: impl std::fmt::Display) -> MonitorError {
    MonitorError::storage(format!("cannot open {}: {err}", path.display()))
}
