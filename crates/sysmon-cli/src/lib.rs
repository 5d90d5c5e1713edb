//! # sysmon-cli
//!
//! Command-line front end for the sysmon metrics store.
//!
//! Provides commands for:
//! - Store creation (`init`)
//! - Taking host readings (`measure`)
//! - Windowed queries with average and sum (`show`)
//! - CSV export (`export`)
//! - Retention (`prune`)
//!
//! # Architecture
//!
//! Every command resolves a [`sysmon_store::StoreConfig`] from the config
//! file, environment and flags, then opens the store through
//! [`sysmon_store::open_store`]. Read commands open it read-only.
//!
//! ```text
//! ┌────────────┐   StoreConfig   ┌──────────────┐
//! │ sysmon-cli │────────────────►│ sysmon-store │──► metrics.db / metrics.csv
//! └────────────┘                 └──────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod identity;
pub mod output;
pub mod system;

pub use cli::{Cli, Commands, Format};
pub use error::CliError;
pub use output::OutputFormat;
