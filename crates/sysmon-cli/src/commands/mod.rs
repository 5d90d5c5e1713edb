//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command:
//! - [`init`] - Store creation
//! - [`measure`] - Metric collection
//! - [`show`] - Windowed queries and aggregates
//! - [`export`] - CSV export
//! - [`prune`] - Retention
//! - [`metrics`] - Known metric names

pub mod export;
pub mod init;
pub mod measure;
pub mod metrics;
pub mod prune;
pub mod show;

pub use export::ExportCommand;
pub use init::InitCommand;
pub use measure::MeasureCommand;
pub use metrics::MetricsCommand;
pub use prune::PruneCommand;
pub use show::ShowCommand;

use sysmon_store::{SampleStore, StoreConfig, open_store};

use crate::error::CliError;

/// Opens the configured store. Read commands pass `read_only` so they never
/// create or modify the file.
pub(crate) fn open(config: &StoreConfig, read_only: bool) -> Result<Box<dyn SampleStore>, CliError> {
    let config = config.clone().with_read_only(config.read_only || read_only);
    Ok(open_store(config)?)
}
