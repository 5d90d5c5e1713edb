//! Time expressions for query windows.
//!
//! A [`TimeSpec`] is either a relative offset from "now" (`-30m`, `-1h`,
//! `-2d`) or an absolute ISO-8601 timestamp. Relative offsets are resolved
//! against an injected [`Clock`], so resolution is deterministic in tests.
//!
//! `m` always means minutes; there is no month unit.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SubsecRound, TimeDelta, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{MonitorError, Result};

/// Description of the accepted forms, carried by [`MonitorError::InvalidTimeSpec`].
pub const ACCEPTED_FORMS: &str = "a relative offset (-<n>m minutes, -<n>h hours, -<n>d days) \
     or an ISO-8601 timestamp (2025-09-27T15:30:00Z, 2025-09-27T15:30:00, 2025-09-27)";

/// Relative offset: leading `-`, digits, unit.
static RELATIVE_SPEC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-([0-9]+)([hdm])$").unwrap_or_else(|_| unreachable!()));

/// Naive layouts, interpreted as UTC. `%.f` makes the fraction optional.
const NAIVE_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Source of "now" for relative resolution.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Unit of a relative offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetUnit {
    /// `m`
    Minutes,
    /// `h`
    Hours,
    /// `d`
    Days,
}

impl OffsetUnit {
    const fn suffix(self) -> char {
        match self {
            Self::Minutes => 'm',
            Self::Hours => 'h',
            Self::Days => 'd',
        }
    }

    fn delta(self, amount: i64) -> Option<TimeDelta> {
        match self {
            Self::Minutes => TimeDelta::try_minutes(amount),
            Self::Hours => TimeDelta::try_hours(amount),
            Self::Days => TimeDelta::try_days(amount),
        }
    }
}

/// A parsed time expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSpec {
    /// `now - amount * unit`.
    Relative {
        /// Number of units to go back.
        amount: i64,
        /// Unit of the offset.
        unit: OffsetUnit,
    },
    /// A fixed instant.
    Absolute(DateTime<Utc>),
}

impl TimeSpec {
    /// Parses a time expression. Relative offsets take precedence over
    /// absolute timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidTimeSpec`] if the input matches no accepted form
    /// or the offset is too large to represent.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();

        if let Some(caps) = RELATIVE_SPEC.captures(trimmed) {
            let amount: i64 = caps[1].parse().map_err(|_| invalid(input))?;
            let unit = match &caps[2] {
                "h" => OffsetUnit::Hours,
                "d" => OffsetUnit::Days,
                _ => OffsetUnit::Minutes,
            };
            if unit.delta(amount).is_none() {
                return Err(invalid(input));
            }
            return Ok(Self::Relative { amount, unit });
        }

        parse_absolute(trimmed)
            .map(Self::Absolute)
            .ok_or_else(|| invalid(input))
    }

    /// Resolves to a concrete instant, truncated to whole seconds.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidTimeSpec`] if the offset reaches past the
    /// representable calendar.
    pub fn resolve(&self, clock: &dyn Clock) -> Result<DateTime<Utc>> {
        let instant = match *self {
            Self::Absolute(ts) => ts,
            Self::Relative { amount, unit } => unit
                .delta(amount)
                .and_then(|delta| clock.now().checked_sub_signed(delta))
                .ok_or_else(|| invalid(&self.to_string()))?,
        };
        Ok(instant.trunc_subsecs(0))
    }
}

impl FromStr for TimeSpec {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relative { amount, unit } => write!(f, "-{amount}{}", unit.suffix()),
            Self::Absolute(ts) => write!(f, "{}", crate::types::format_timestamp(ts)),
        }
    }
}

/// Parses and resolves a time expression in one step.
///
/// # Errors
///
/// Returns [`MonitorError::InvalidTimeSpec`] with the offending input.
pub fn resolve(input: &str, clock: &dyn Clock) -> Result<DateTime<Utc>> {
    TimeSpec::parse(input)?.resolve(clock)
}

fn parse_absolute(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }

    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, layout) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

fn invalid(input: &str) -> MonitorError {
    MonitorError::InvalidTimeSpec {
        input: input.to_string(),
        expected: ACCEPTED_FORMS,
    }
}
