//! Retention: drop samples older than a configured age.
//!
//! Pruning is destructive and irreversible. Deleted samples cannot be
//! recovered from the store.

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MonitorError, Result};
use crate::store::SampleStore;
use crate::timespec::Clock;
use crate::types::format_timestamp;

/// How long samples are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Samples older than this many days are deleted.
    pub days: u32,
}

impl RetentionPolicy {
    /// Creates a policy keeping `days` days of samples.
    #[must_use]
    pub const fn days(days: u32) -> Self {
        Self { days }
    }

    /// `now - days`, truncated to whole seconds.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Config`] if the cutoff falls outside the
    /// representable calendar.
    pub fn cutoff(&self, clock: &dyn Clock) -> Result<DateTime<Utc>> {
        TimeDelta::try_days(i64::from(self.days))
            .and_then(|age| clock.now().checked_sub_signed(age))
            .map(|cutoff| cutoff.trunc_subsecs(0))
            .ok_or_else(|| MonitorError::Config {
                reason: format!("retention of {} days is out of range", self.days),
            })
    }
}

/// Outcome of a retention run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// Samples strictly before this instant were deleted.
    pub cutoff: DateTime<Utc>,
    /// Number of samples deleted.
    pub deleted: usize,
    /// Whether space was reclaimed afterwards.
    pub compacted: bool,
}

/// Prunes samples older than the policy allows, then optionally compacts.
///
/// # Errors
///
/// Returns any error raised by the store, including
/// [`MonitorError::ReadOnly`] on a read-only store.
pub fn apply_retention(
    store: &dyn SampleStore,
    policy: RetentionPolicy,
    clock: &dyn Clock,
    compact: bool,
) -> Result<PruneReport> {
    let cutoff = policy.cutoff(clock)?;
    let deleted = store.prune(cutoff)?;
    if compact {
        store.compact()?;
    }

    info!(
        days = policy.days,
        cutoff = %format_timestamp(&cutoff),
        deleted,
        compacted = compact,
        "retention applied"
    );
    Ok(PruneReport {
        cutoff,
        deleted,
        compacted: compact,
    })
}
