//! Flat CSV file backend.
//!
//! Layout: a header line followed by one record per sample,
//! `id,timestamp,host,address,metric,value`. Two sidecar files sit next to
//! the data file:
//!
//! - `<path>.lock` exists while a writer holds the write lock and names
//!   the holder's pid; a lock left by a dead process is taken over
//! - `<path>.seq` holds the last id handed out, so ids survive pruning
//!
//! Readers take no lock. A single sample is appended as one complete line;
//! an unterminated final line is an append still in flight and is ignored.
//! Multi-sample batches and prune replace the file through a rename, so a
//! reader sees a batch either whole or not at all.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, info, warn};

use super::{RowCollector, SampleStore};
use crate::codec::{self, Record, Records};
use crate::config::StoreConfig;
use crate::error::{MonitorError, Result};
use crate::types::{
    Sample, SampleFilter, SampleId, ScanResult, SortOrder, StoredSample, format_timestamp,
    parse_timestamp, prune_bound,
};

/// Column header of the data file.
pub const CSV_HEADER: [&str; 6] = ["id", "timestamp", "host", "address", "metric", "value"];

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// A lock file naming no holder is abandoned once it is this old.
const UNOWNED_LOCK_AGE: Duration = Duration::from_secs(30);

/// Sample store backed by a CSV file.
#[derive(Debug)]
pub struct CsvStore {
    config: StoreConfig,
    lock_path: PathBuf,
    seq_path: PathBuf,
}

impl CsvStore {
    /// Prepares a store for the file named by the config. The data file
    /// itself is created by [`SampleStore::init`] or the first insert.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::StorageUnavailable`] if the parent directory
    /// cannot be created, or if a read-only store's file does not exist.
    pub fn open(config: StoreConfig) -> Result<Self> {
        if config.read_only {
            if !config.path.is_file() {
                return Err(MonitorError::storage(format!(
                    "cannot open {}: no such file",
                    config.path.display()
                )));
            }
        } else if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_error("create directory", parent, &e))?;
        }

        debug!(path = %config.path.display(), read_only = config.read_only, "opened csv store");
        Ok(Self {
            lock_path: sidecar(&config.path, ".lock"),
            seq_path: sidecar(&config.path, ".seq"),
            config,
        })
    }

    fn path(&self) -> &Path {
        &self.config.path
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.config.read_only {
            return Err(MonitorError::ReadOnly {
                path: self.path().display().to_string(),
            });
        }
        Ok(())
    }

    fn lock(&self) -> Result<WriteLock> {
        self.ensure_writable()?;
        WriteLock::acquire(&self.lock_path, self.config.write_timeout())
    }

    /// Reads the raw file. A missing file reads as empty.
    fn read_raw(&self) -> Result<Vec<u8>> {
        match File::open(self.path()) {
            Ok(mut file) => {
                let mut content = Vec::new();
                file.read_to_end(&mut content)
                    .map_err(|e| io_error("read", self.path(), &e))?;
                Ok(content)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(io_error("open", self.path(), &e)),
        }
    }

    /// Decodes every complete record in file order.
    fn scan(&self) -> Result<ScanResult> {
        let content = self.read_raw()?;
        let mut collector = RowCollector::new(self.config.corrupt_row_policy());

        for record in data_records(&content) {
            if !record.terminated {
                debug!(line = record.line, "ignoring unterminated trailing record");
                continue;
            }
            let line = record.line;
            collector.push(decode_record(&record), || format!("line {line}"))?;
        }

        debug!(rows = collector.len(), "scanned csv store");
        Ok(collector.finish())
    }

    /// Writes the header if the file is missing or empty. Caller holds the lock.
    fn ensure_header(&self) -> Result<()> {
        let empty = match fs::metadata(self.path()) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => return Err(io_error("stat", self.path(), &e)),
        };
        if !empty {
            return Ok(());
        }

        let mut buf = Vec::new();
        codec::write_record(&mut buf, &CSV_HEADER).map_err(MonitorError::storage)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path())
            .map_err(|e| io_error("create", self.path(), &e))?;
        file.write_all(&buf)
            .and_then(|()| file.sync_data())
            .map_err(|e| io_error("write", self.path(), &e))
    }

    /// Last id handed out. Falls back to the largest id in the file when the
    /// sequence sidecar is missing or unreadable. Caller holds the lock.
    fn last_id(&self) -> Result<i64> {
        match fs::read_to_string(&self.seq_path) {
            Ok(text) => {
                if let Ok(id) = text.trim().parse::<i64>() {
                    return Ok(id);
                }
                warn!(path = %self.seq_path.display(), "sequence file unreadable, rescanning data file");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_error("read", &self.seq_path, &e)),
        }

        let content = self.read_raw()?;
        Ok(data_records(&content)
            .filter_map(|record| record.fields.first().and_then(|id| id.parse::<i64>().ok()))
            .max()
            .unwrap_or(0))
    }

    /// Persists the last id handed out. Caller holds the lock.
    fn store_last_id(&self, id: i64) -> Result<()> {
        replace_file(&self.seq_path, format!("{id}\n").as_bytes())
    }

}

impl SampleStore for CsvStore {
    fn init(&self) -> Result<()> {
        let _lock = self.lock()?;
        self.ensure_header()?;
        debug!(path = %self.path().display(), "csv store ready");
        Ok(())
    }

    fn insert_batch(&self, samples: &[Sample]) -> Result<Vec<SampleId>> {
        self.ensure_writable()?;
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let _lock = self.lock()?;
        self.ensure_header()?;

        let first = self.last_id()? + 1;
        let ids: Vec<SampleId> = (first..).take(samples.len()).map(SampleId).collect();

        // A non-empty file without a final newline means an earlier writer
        // died mid-append.
        let mut content = self.read_raw()?;
        let mut buf = Vec::new();
        if content.last().is_some_and(|&b| b != b'\n') {
            warn!(path = %self.path().display(), "terminating torn trailing record");
            buf.push(b'\n');
        }
        for (id, sample) in ids.iter().zip(samples) {
            let id = id.to_string();
            let ts = sample.timestamp_str();
            let value = sample.value.to_string();
            codec::write_record(
                &mut buf,
                &[&id, &ts, &sample.host, &sample.address, &sample.metric, &value],
            )
            .map_err(MonitorError::storage)?;
        }

        // Reserve the ids before appending so a crash can skip ids but never reuse them.
        if let Some(last) = ids.last() {
            self.store_last_id(last.0)?;
        }

        if ids.len() == 1 {
            let mut file = OpenOptions::new()
                .append(true)
                .open(self.path())
                .map_err(|e| io_error("open", self.path(), &e))?;
            file.write_all(&buf)
                .and_then(|()| file.sync_data())
                .map_err(|e| io_error("append to", self.path(), &e))?;
        } else {
            // Lock-free readers could see a prefix of a multi-line append.
            content.extend_from_slice(&buf);
            replace_file(self.path(), &content)?;
        }

        debug!(rows = ids.len(), "appended samples");
        Ok(ids)
    }

    fn query(&self, filter: &SampleFilter) -> Result<ScanResult> {
        if filter.is_inverted() {
            return Ok(ScanResult::default());
        }

        let ScanResult { mut samples, skipped } = self.scan()?;
        samples.retain(|s| filter.matches(&s.sample));
        match filter.order {
            SortOrder::NewestFirst => samples.sort_by(|a, b| {
                b.sample
                    .timestamp
                    .cmp(&a.sample.timestamp)
                    .then(b.id.cmp(&a.id))
            }),
            SortOrder::OldestFirst => samples.sort_by(|a, b| {
                a.sample
                    .timestamp
                    .cmp(&b.sample.timestamp)
                    .then(a.id.cmp(&b.id))
            }),
        }
        if let Some(limit) = filter.limit {
            samples.truncate(limit);
        }

        Ok(ScanResult { samples, skipped })
    }

    fn prune(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let _lock = self.lock()?;
        let content = self.read_raw()?;
        if content.is_empty() {
            return Ok(0);
        }

        let bound = prune_bound(&cutoff);
        let mut buf = Vec::new();
        codec::write_record(&mut buf, &CSV_HEADER).map_err(MonitorError::storage)?;
        let mut deleted = 0;

        for record in data_records(&content) {
            if !record.terminated {
                warn!(line = record.line, "dropping torn trailing record");
                continue;
            }
            let expired = decode_record(&record)
                .map(|row| row.sample.timestamp < bound)
                .unwrap_or(false);
            if expired {
                deleted += 1;
                continue;
            }
            // Kept byte for byte, corrupt records included.
            buf.extend_from_slice(&content[record.span.clone()]);
        }

        if deleted > 0 {
            replace_file(self.path(), &buf)?;
        }

        info!(cutoff = %format_timestamp(&cutoff), deleted, "pruned samples");
        Ok(deleted)
    }

    fn compact(&self) -> Result<()> {
        self.ensure_writable()?;
        debug!(path = %self.path().display(), "csv store needs no compaction");
        Ok(())
    }

    fn export_all(&self) -> Result<ScanResult> {
        let mut result = self.scan()?;
        result.samples.sort_by_key(|s| s.id);
        Ok(result)
    }

    fn count(&self) -> Result<usize> {
        Ok(self.scan()?.len())
    }

    fn config(&self) -> &StoreConfig {
        &self.config
    }
}

/// Exclusive write lock held through a lock file. Released on drop.
#[derive(Debug)]
struct WriteLock {
    path: PathBuf,
}

impl WriteLock {
    fn acquire(path: &Path, timeout: Duration) -> Result<Self> {
        let deadline = Instant::now() + timeout;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    // Holder pid, checked by waiters to detect a dead holder.
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if is_stale(path) {
                        warn!(path = %path.display(), "taking over stale write lock");
                        match fs::remove_file(path) {
                            Ok(()) => continue,
                            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                            Err(e) => return Err(io_error("remove stale lock", path, &e)),
                        }
                    }
                    if Instant::now() >= deadline {
                        return Err(MonitorError::storage(format!(
                            "timed out after {}ms waiting for write lock {}",
                            timeout.as_millis(),
                            path.display()
                        )));
                    }
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => return Err(io_error("create lock", path, &e)),
            }
        }
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release write lock");
        }
    }
}

/// True if the lock's holder is gone: the recorded pid is not running, or
/// no pid was recorded and the file has outlived [`UNOWNED_LOCK_AGE`].
fn is_stale(path: &Path) -> bool {
    let Ok(text) = fs::read_to_string(path) else {
        // Released meanwhile, or unreadable; retry the create.
        return false;
    };
    match text.trim().parse::<u32>() {
        Ok(pid) if sysinfo::IS_SUPPORTED_SYSTEM => !process_alive(pid),
        _ => fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age > UNOWNED_LOCK_AGE),
    }
}

fn process_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).is_some()
}

/// Records after the header line.
fn data_records(content: &[u8]) -> impl Iterator<Item = Record> + '_ {
    let mut records = Records::new(content).peekable();
    if records.peek().is_some_and(is_header) {
        records.next();
    }
    records
}

fn is_header(record: &Record) -> bool {
    record.fields.iter().map(String::as_str).eq(CSV_HEADER)
}

fn decode_record(record: &Record) -> std::result::Result<StoredSample, String> {
    if let Some(reason) = &record.malformed {
        return Err(reason.clone());
    }
    let [id, ts, host, address, metric, value] = record.fields.as_slice() else {
        return Err(format!(
            "expected {} fields, found {}",
            CSV_HEADER.len(),
            record.fields.len()
        ));
    };

    let id = id
        .parse::<i64>()
        .map_err(|_| format!("unparseable id '{id}'"))?;
    let timestamp = parse_timestamp(ts).ok_or_else(|| format!("unparseable timestamp '{ts}'"))?;
    let value = value
        .parse::<f64>()
        .map_err(|_| format!("unparseable value '{value}'"))?;

    Ok(StoredSample {
        id: SampleId(id),
        sample: Sample {
            timestamp,
            host: host.clone(),
            address: address.clone(),
            metric: metric.clone(),
            value,
        },
    })
}

/// `<path><suffix>`, e.g. `metrics.csv.lock`.
fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Atomically replaces `path` with `content` via a temp file and rename.
pub(crate) fn replace_file(path: &Path, content: &[u8]) -> Result<()> {
    let tmp = sidecar(path, &format!(".tmp-{}", std::process::id()));
    let written = File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(content)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp, path));

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(io_error("replace", path, &e));
    }
    Ok(())
}

fn io_error(action: &str, path: &Path, err: &io::Error) -> MonitorError {
    MonitorError::storage(format!("cannot {action} {}: {err}", path.display()))
}
