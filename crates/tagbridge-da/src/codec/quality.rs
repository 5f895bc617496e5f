// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Server-reported value quality.
//!
//! The quality word is passed through untouched; these helpers only
//! classify it. Layout of the low byte:
//!
//! ```text
//!  7 6 | 5 4 3 2 | 1 0
//!  QQ  | substat | limit
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Quality
// =============================================================================

/// Raw 16-bit quality word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quality(pub u16);

impl Quality {
    /// Non-specific good.
    pub const GOOD: Quality = Quality(0xC0);
    /// Good, local override.
    pub const GOOD_LOCAL_OVERRIDE: Quality = Quality(0xD8);
    /// Non-specific uncertain.
    pub const UNCERTAIN: Quality = Quality(0x40);
    /// Uncertain, last usable value.
    pub const UNCERTAIN_LAST_USABLE: Quality = Quality(0x44);
    /// Uncertain, sensor not accurate.
    pub const UNCERTAIN_SENSOR_CAL: Quality = Quality(0x50);
    /// Uncertain, engineering units exceeded.
    pub const UNCERTAIN_EGU_EXCEEDED: Quality = Quality(0x54);
    /// Uncertain, sub-normal.
    pub const UNCERTAIN_SUB_NORMAL: Quality = Quality(0x58);
    /// Non-specific bad.
    pub const BAD: Quality = Quality(0x00);
    /// Bad, configuration error.
    pub const BAD_CONFIG_ERROR: Quality = Quality(0x04);
    /// Bad, not connected.
    pub const BAD_NOT_CONNECTED: Quality = Quality(0x08);
    /// Bad, device failure.
    pub const BAD_DEVICE_FAILURE: Quality = Quality(0x0C);
    /// Bad, sensor failure.
    pub const BAD_SENSOR_FAILURE: Quality = Quality(0x10);
    /// Bad, last known value.
    pub const BAD_LAST_KNOWN: Quality = Quality(0x14);
    /// Bad, communication failure.
    pub const BAD_COMM_FAILURE: Quality = Quality(0x18);
    /// Bad, out of service.
    pub const BAD_OUT_OF_SERVICE: Quality = Quality(0x1C);

    const STATUS_MASK: u16 = 0xC0;
    const SUBSTATUS_MASK: u16 = 0x3C;
    const LIMIT_MASK: u16 = 0x03;

    /// Returns the major status.
    pub fn status(&self) -> QualityStatus {
        match self.0 & Self::STATUS_MASK {
            0xC0 => QualityStatus::Good,
            0x40 => QualityStatus::Uncertain,
            0x00 => QualityStatus::Bad,
            _ => QualityStatus::Reserved,
        }
    }

    /// Returns the sub-status bits (shifted down).
    #[inline]
    pub fn substatus(&self) -> u8 {
        ((self.0 & Self::SUBSTATUS_MASK) >> 2) as u8
    }

    /// Returns the limit bits.
    pub fn limit(&self) -> LimitStatus {
        match self.0 & Self::LIMIT_MASK {
            0 => LimitStatus::NotLimited,
            1 => LimitStatus::Low,
            2 => LimitStatus::High,
            _ => LimitStatus::Constant,
        }
    }

    /// Returns `true` for good quality.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status() == QualityStatus::Good
    }

    /// Returns `true` for uncertain quality.
    #[inline]
    pub fn is_uncertain(&self) -> bool {
        self.status() == QualityStatus::Uncertain
    }

    /// Returns `true` for bad quality.
    #[inline]
    pub fn is_bad(&self) -> bool {
        self.status() == QualityStatus::Bad
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::GOOD
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.status(), self.0)
    }
}

// =============================================================================
// QualityStatus / LimitStatus
// =============================================================================

/// Major quality status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityStatus {
    /// Value is usable.
    Good,
    /// Value may be usable.
    Uncertain,
    /// Value should not be used.
    Bad,
    /// Reserved bit pattern.
    Reserved,
}

impl fmt::Display for QualityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Good => write!(f, "good"),
            Self::Uncertain => write!(f, "uncertain"),
            Self::Bad => write!(f, "bad"),
            Self::Reserved => write!(f, "reserved"),
        }
    }
}

/// Limit bits of a quality word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitStatus {
    /// Value is free to move.
    NotLimited,
    /// Value is pegged at a low limit.
    Low,
    /// Value is pegged at a high limit.
    High,
    /// Value cannot move.
    Constant,
}
