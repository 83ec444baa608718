//! Temporal types for validity windows and org-local calendars
//!
//! This module provides types for time handling in the ledger:
//! - Validity windows over calendar dates (when a rule applies)
//! - Org timezone conversion (which calendar date an instant falls on)

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use thiserror::Error;

/// Timezone of an organization's business calendar
///
/// Wraps chrono_tz::Tz with custom serialization support. Rule validity
/// is expressed in calendar dates, so resolving which rule applies to a
/// transaction requires converting its UTC instant into the org's local
/// calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrgTimezone(pub Tz);

impl Serialize for OrgTimezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for OrgTimezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Tz::from_str(&s)
            .map(OrgTimezone)
            .map_err(|_| serde::de::Error::custom(format!("Invalid timezone: {}", s)))
    }
}

impl OrgTimezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Converts a UTC datetime to the local timezone
    pub fn to_local(&self, utc: DateTime<Utc>) -> DateTime<Tz> {
        utc.with_timezone(&self.0)
    }

    /// Returns the local calendar date of a UTC instant
    pub fn local_date(&self, utc: DateTime<Utc>) -> NaiveDate {
        self.to_local(utc).date_naive()
    }

    /// Gets the start of day (00:00:00) in this timezone as UTC
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_hms_opt(0, 0, 0)
            .unwrap()
            .and_local_timezone(self.0)
            .earliest()
            .expect("Invalid timezone conversion")
            .with_timezone(&Utc)
    }

    /// Gets the first instant after the given date in this timezone as UTC
    ///
    /// Useful as an exclusive upper bound when filtering instants by a
    /// local date range.
    pub fn start_of_next_day(&self, date: NaiveDate) -> DateTime<Utc> {
        self.start_of_day(date + chrono::Duration::days(1))
    }
}

impl Default for OrgTimezone {
    fn default() -> Self {
        Self(chrono_tz::UTC)
    }
}

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid validity window: from {from} must be before to {to}")]
    InvalidWindow { from: String, to: String },
}

/// A half-open validity window over calendar dates
///
/// The window covers `[from, to)`: a rule valid from Jan 1 to Feb 1
/// applies on Jan 31 but not on Feb 1. An absent `to` means the window
/// never closes. Closing one rule on a date and opening the next on the
/// same date never produces a day on which both apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    /// First date on which the window applies (inclusive)
    pub from: NaiveDate,
    /// First date on which the window no longer applies (exclusive), None means open-ended
    pub to: Option<NaiveDate>,
}

impl ValidityWindow {
    /// Creates a new validity window
    pub fn new(from: NaiveDate, to: Option<NaiveDate>) -> Result<Self, TemporalError> {
        if let Some(to) = to {
            if from >= to {
                return Err(TemporalError::InvalidWindow {
                    from: from.to_string(),
                    to: to.to_string(),
                });
            }
        }
        Ok(Self { from, to })
    }

    /// Creates an open-ended window starting on the given date
    pub fn open_from(from: NaiveDate) -> Self {
        Self { from, to: None }
    }

    /// Creates a bounded window
    pub fn bounded(from: NaiveDate, to: NaiveDate) -> Result<Self, TemporalError> {
        Self::new(from, Some(to))
    }

    /// Returns true if this window contains the given date
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && self.to.map_or(true, |t| date < t)
    }

    /// Returns true if this window overlaps with another
    pub fn overlaps(&self, other: &ValidityWindow) -> bool {
        let self_to = self.to.unwrap_or(NaiveDate::MAX);
        let other_to = other.to.unwrap_or(NaiveDate::MAX);

        self.from < other_to && other.from < self_to
    }

    /// Returns true if this window has no end date
    pub fn is_open_ended(&self) -> bool {
        self.to.is_none()
    }
}
