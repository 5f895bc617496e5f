// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Timestamp and automation-date conversion.
//!
//! Servers stamp values with a [`FileTime`]: 100 ns ticks since
//! 1601-01-01 UTC. Callers receive ticks relative to 1970-01-01 in the same
//! unit, obtained by subtracting [`EPOCH_OFFSET_TICKS`]. Ticks are unsigned,
//! so instants before 1970 saturate to zero.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Ticks between 1601-01-01 and 1970-01-01.
pub const EPOCH_OFFSET_TICKS: u64 = 116_444_736_000_000_000;

/// 100 ns ticks per second.
pub const TICKS_PER_SECOND: u64 = 10_000_000;

const SECONDS_1601_TO_1970: i64 = 11_644_473_600;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

// Largest automation date chrono can represent comfortably (9999-12-31).
const MAX_OLE_DATE: f64 = 2_958_465.999_999;

// =============================================================================
// FileTime
// =============================================================================

/// 100 ns ticks since 1601-01-01 UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileTime(pub u64);

impl FileTime {
    /// Returns the current time.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now()).unwrap_or_default()
    }

    /// Ticks relative to 1970-01-01; zero for earlier instants.
    #[inline]
    pub fn to_unix_ticks(self) -> u64 {
        self.0.saturating_sub(EPOCH_OFFSET_TICKS)
    }

    /// Inverse of [`to_unix_ticks`](Self::to_unix_ticks).
    #[inline]
    pub fn from_unix_ticks(ticks: u64) -> Self {
        Self(ticks.saturating_add(EPOCH_OFFSET_TICKS))
    }

    /// Converts to a UTC instant.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        let secs = (self.0 / TICKS_PER_SECOND) as i64 - SECONDS_1601_TO_1970;
        let nanos = ((self.0 % TICKS_PER_SECOND) * 100) as u32;
        DateTime::from_timestamp(secs, nanos)
    }

    /// Converts from a UTC instant; `None` before 1601.
    pub fn from_datetime(dt: DateTime<Utc>) -> Option<Self> {
        let secs = u64::try_from(dt.timestamp() + SECONDS_1601_TO_1970).ok()?;
        let sub_ticks = u64::from(dt.timestamp_subsec_nanos()) / 100;
        secs.checked_mul(TICKS_PER_SECOND)?
            .checked_add(sub_ticks)
            .map(Self)
    }
}

// =============================================================================
// Automation Date
// =============================================================================

fn ole_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)
}

/// Converts an automation date to a calendar instant at millisecond precision.
///
/// Only non-negative dates are accepted; negative dates use a split
/// day/fraction encoding that values never carry here.
pub fn ole_date_to_datetime(date: f64) -> Option<NaiveDateTime> {
    if !date.is_finite() || !(0.0..=MAX_OLE_DATE).contains(&date) {
        return None;
    }
    let millis = (date * MILLIS_PER_DAY).round() as i64;
    ole_epoch()?.checked_add_signed(TimeDelta::try_milliseconds(millis)?)
}

/// Converts a calendar instant to an automation date.
pub fn datetime_to_ole_date(dt: NaiveDateTime) -> Option<f64> {
    let millis = dt.signed_duration_since(ole_epoch()?).num_milliseconds();
    Some(millis as f64 / MILLIS_PER_DAY)
}

/// Converts an automation date to caller ticks (100 ns since 1970).
pub fn ole_date_to_unix_ticks(date: f64) -> Option<u64> {
    let dt = ole_date_to_datetime(date)?.and_utc();
    FileTime::from_datetime(dt).map(FileTime::to_unix_ticks)
}

/// Converts caller ticks back to an automation date.
pub fn unix_ticks_to_ole_date(ticks: u64) -> Option<f64> {
    let dt = FileTime::from_unix_ticks(ticks).to_datetime()?;
    datetime_to_ole_date(dt.naive_utc())
}
