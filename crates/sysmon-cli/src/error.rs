//! CLI error types.

use std::fmt;

use sysmon_store::MonitorError;

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// The store or a collection step failed.
    Store(MonitorError),
    /// Command execution failed.
    Command(String),
    /// Output formatting error.
    Format(String),
    /// IO error.
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "{e}"),
            Self::Command(msg) => write!(f, "command error: {msg}"),
            Self::Format(msg) => write!(f, "format error: {msg}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<MonitorError> for CliError {
    fn from(err: MonitorError) -> Self {
        Self::Store(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_error_display_store_passes_through() {
        let err = CliError::from(MonitorError::ReadOnly {
            path: "metrics.db".into(),
        });
        assert_eq!(err.to_string(), "store at metrics.db is read-only");
    }

    #[test]
    fn cli_error_display_command() {
        let err = CliError::Command("no metric could be recorded".into());
        assert_eq!(err.to_string(), "command error: no metric could be recorded");
    }

    #[test]
    fn cli_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err = CliError::from(io_err);
        assert!(matches!(cli_err, CliError::Io(_)));
    }
}
