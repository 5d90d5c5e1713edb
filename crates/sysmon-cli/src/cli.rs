//! Command-line argument parsing with clap.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use sysmon_store::{Backend, StoreConfig};

use crate::error::CliError;

/// Store path used when neither a flag, env var nor config file names one.
pub const DEFAULT_DB: &str = "metrics.db";

/// sysmon - collect, query and prune host metrics.
#[derive(Parser, Debug, Clone)]
#[command(name = "sysmon")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Store path [default: metrics.db].
    #[arg(short, long, env = "SYSMON_DB", global = true)]
    pub db: Option<PathBuf>,

    /// TOML file with store settings. Flags override its values.
    #[arg(short, long, env = "SYSMON_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Storage backend. Inferred from a `.csv` extension when omitted.
    #[arg(long, value_enum, global = true)]
    pub backend: Option<BackendArg>,

    /// Open the store read-only.
    #[arg(long, global = true)]
    pub read_only: bool,

    /// Maximum wait for the write lock, in milliseconds.
    #[arg(long, global = true)]
    pub write_timeout_ms: Option<u64>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table, global = true)]
    pub format: Format,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Builds the store configuration: config file first, then flags and env.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or the result is invalid.
    pub fn store_config(&self) -> Result<StoreConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => StoreConfig::from_file(path)?,
            None => {
                let path = self.db.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_DB));
                let backend = infer_backend(&path);
                StoreConfig::new(path).with_backend(backend)
            }
        };

        if let Some(db) = &self.db {
            config.path.clone_from(db);
        }
        if let Some(backend) = self.backend {
            config.backend = backend.into();
        }
        if self.read_only {
            config.read_only = true;
        }
        if let Some(ms) = self.write_timeout_ms {
            config.write_timeout_ms = ms;
        }

        config.validate()?;
        Ok(config)
    }
}

fn infer_backend(path: &Path) -> Backend {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => Backend::Csv,
        _ => Backend::Sqlite,
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Storage backend argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    /// SQLite database.
    Sqlite,
    /// CSV file.
    Csv,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Sqlite => Self::Sqlite,
            BackendArg::Csv => Self::Csv,
        }
    }
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Create the store if it does not exist.
    #[command(visible_alias = "init-db")]
    Init,

    /// Take readings now and append them to the store.
    Measure(MeasureArgs),

    /// Show stored samples, optionally within a time window.
    Show(ShowArgs),

    /// Export every sample to a CSV file.
    Export(ExportArgs),

    /// Delete samples older than the retention period.
    ///
    /// This is destructive: pruned samples cannot be recovered.
    Prune(PruneArgs),

    /// List the metrics `measure` knows about.
    Metrics,
}

/// Arguments for the measure command.
#[derive(Args, Debug, Clone)]
pub struct MeasureArgs {
    /// Metrics to read (see `sysmon metrics`).
    #[arg(short, long, num_args = 1.., value_delimiter = ',', required = true)]
    pub metrics: Vec<String>,

    /// Print each recorded reading.
    #[arg(short, long)]
    pub verbose: bool,

    /// Host name to record instead of this machine's.
    #[arg(long)]
    pub host: Option<String>,

    /// Address to record instead of the resolved one.
    #[arg(long)]
    pub address: Option<String>,
}

/// Arguments for the show command.
#[derive(Args, Debug, Clone, Default)]
pub struct ShowArgs {
    /// Only this metric.
    #[arg(short, long)]
    pub metric: Option<String>,

    /// Only this host.
    #[arg(long)]
    pub host: Option<String>,

    /// Window start: -30m, -1h, -2d or an ISO-8601 timestamp.
    #[arg(short, long, allow_hyphen_values = true)]
    pub start: Option<String>,

    /// Window end, same forms as --start.
    #[arg(short, long, allow_hyphen_values = true)]
    pub end: Option<String>,

    /// Maximum number of rows.
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Print the average of the shown values.
    #[arg(long)]
    pub average: bool,

    /// Print the sum of the shown values.
    #[arg(long, visible_alias = "total")]
    pub sum: bool,

    /// Oldest samples first.
    #[arg(long)]
    pub oldest_first: bool,
}

/// Arguments for the export command.
#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Destination file. Overwritten if it exists.
    #[arg(short, long)]
    pub out: PathBuf,
}

/// Arguments for the prune command.
#[derive(Args, Debug, Clone)]
pub struct PruneArgs {
    /// Keep this many days of samples.
    #[arg(long)]
    pub retention_days: u32,

    /// Reclaim disk space afterwards.
    #[arg(long, visible_alias = "vacuum")]
    pub compact: bool,
}
