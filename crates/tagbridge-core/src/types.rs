// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Shared identifier and result-code types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, OperationError};

// =============================================================================
// TagId
// =============================================================================

/// External numeric tag identifier, as declared by `Id` in the device document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(pub i32);

impl TagId {
    /// Returns the raw id.
    #[inline]
    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for TagId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl FromStr for TagId {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i32>().map(TagId).map_err(|_| {
            BridgeError::Operation(OperationError::InvalidTagId { raw: s.to_string() })
        })
    }
}

// =============================================================================
// ResultCode
// =============================================================================

/// Result codes returned by the command gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum ResultCode {
    /// Command completed.
    Ok = 0,
    /// Command completed for a subset of its entries.
    PartialOk = -1,
    /// Command failed.
    Error = -2,
    /// Command string not recognized.
    UnknownCommand = -3,
    /// Session is down and could not be recovered.
    Disconnected = -4,
}

impl ResultCode {
    /// Returns the numeric code.
    #[inline]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Creates a result code from its numeric value.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            -1 => Some(Self::PartialOk),
            -2 => Some(Self::Error),
            -3 => Some(Self::UnknownCommand),
            -4 => Some(Self::Disconnected),
            _ => None,
        }
    }

    /// Returns `true` for `Ok`.
    #[inline]
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Returns the code name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::PartialOk => "PARTIAL_OK",
            Self::Error => "ERROR",
            Self::UnknownCommand => "UNKNOWN_COMMAND",
            Self::Disconnected => "DISCONNECTED",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.as_str(), self.as_i32())
    }
}

impl From<ResultCode> for i32 {
    fn from(code: ResultCode) -> Self {
        code.as_i32()
    }
}

// =============================================================================
// Tests
// =============================================================================
