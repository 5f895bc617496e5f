// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Abstraction over the underlying automation-client library.
//!
//! The library owns the protocol itself: session negotiation, group and item
//! creation, synchronous reads and writes, and asynchronous change delivery.
//! [`DaTransport`] is the narrow surface the session manager needs from it,
//! so the manager can be driven by a real client or by a test double.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tagbridge_core::BridgeResult;

use crate::codec::{FileTime, NativeValue, Quality, VarType};

// =============================================================================
// Handles
// =============================================================================

/// Server-assigned group handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupHandle(pub u32);

impl fmt::Display for GroupHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group-{}", self.0)
    }
}

/// Protocol handle of a created item.
///
/// Handle numbers may be reused by the library across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemHandle(pub u32);

impl fmt::Display for ItemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

// =============================================================================
// ServerState
// =============================================================================

/// Server health as reported by a status poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    /// Running normally.
    Running,
    /// Vendor-specific fatal error.
    Failed,
    /// Running but without configuration.
    NoConfig,
    /// Temporarily paused.
    Suspended,
    /// Test mode.
    Test,
    /// Lost contact with its devices.
    CommFault,
}

impl ServerState {
    /// Maps the raw server state code (1-based).
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Running),
            2 => Some(Self::Failed),
            3 => Some(Self::NoConfig),
            4 => Some(Self::Suspended),
            5 => Some(Self::Test),
            6 => Some(Self::CommFault),
            _ => None,
        }
    }

    /// Returns `true` for [`ServerState::Running`].
    #[inline]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns `true` for states that abort a connect.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Failed | Self::CommFault)
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "RUNNING"),
            Self::Failed => write!(f, "FAILED"),
            Self::NoConfig => write!(f, "NOCONFIG"),
            Self::Suspended => write!(f, "SUSPENDED"),
            Self::Test => write!(f, "TEST"),
            Self::CommFault => write!(f, "COMM_FAULT"),
        }
    }
}

// =============================================================================
// DataSource
// =============================================================================

/// Where a synchronous read is satisfied from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// The server's last cached value.
    #[default]
    Cache,
    /// A fresh poll of the device.
    Device,
}

impl FromStr for DataSource {
    type Err = std::convert::Infallible;

    /// `"device"` (any case) selects a device read; anything else reads the cache.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("device") {
            Ok(Self::Device)
        } else {
            Ok(Self::Cache)
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Device => write!(f, "device"),
        }
    }
}

// =============================================================================
// Provisioning Types
// =============================================================================

/// Parameters for creating a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRequest {
    /// Group name.
    pub name: String,
    /// Create the group active.
    pub active: bool,
    /// Requested update rate in milliseconds.
    pub update_rate_ms: u32,
    /// Percent deadband.
    pub deadband: f32,
}

/// A created group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupInfo {
    /// Server handle.
    pub handle: GroupHandle,
    /// Update rate the server actually applied.
    pub revised_update_rate_ms: u32,
}

/// A created item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemInfo {
    /// Server handle.
    pub handle: ItemHandle,
    /// Canonical wire type of the item.
    pub data_type: VarType,
}

/// Outcome of creating one item; `Err` carries the server's error code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemResult {
    /// Item name as requested.
    pub name: String,
    /// Created item or server error code.
    pub outcome: Result<ItemInfo, i32>,
}

// =============================================================================
// Values
// =============================================================================

/// Item state returned by a synchronous read.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemState {
    /// Native value.
    pub value: NativeValue,
    /// Quality word.
    pub quality: Quality,
    /// Server timestamp.
    pub timestamp: FileTime,
    /// Per-item error code; negative means failure.
    pub error: i32,
}

impl ItemState {
    /// Creates a good-quality state with no error.
    pub fn good(value: NativeValue, timestamp: FileTime) -> Self {
        Self {
            value,
            quality: Quality::GOOD,
            timestamp,
            error: 0,
        }
    }
}

/// One changed item within a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEntry {
    /// Item handle.
    pub handle: ItemHandle,
    /// Native value.
    pub value: NativeValue,
    /// Quality word.
    pub quality: Quality,
    /// Per-item error code; negative means failure.
    pub error: i32,
    /// Server timestamp.
    pub timestamp: FileTime,
}

/// A batch of changes delivered by one notification.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChangeBatch {
    /// Group the notification came from, if the library reports it.
    pub group: Option<GroupHandle>,
    /// Entries in delivery order.
    pub entries: Vec<ChangeEntry>,
}

impl ChangeBatch {
    /// Creates a batch from entries.
    pub fn new(entries: Vec<ChangeEntry>) -> Self {
        Self {
            group: None,
            entries,
        }
    }

    /// Returns the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the batch has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// NotificationSink
// =============================================================================

/// Receiver of asynchronous change notifications.
///
/// Called on the library's own notification context, which is not an async
/// task and may run concurrently with synchronous operations.
pub trait NotificationSink: Send + Sync {
    /// Handles one batch.
    fn on_data_change(&self, batch: &ChangeBatch);
}

// =============================================================================
// DaTransport Trait
// =============================================================================

/// Operations the session manager needs from the automation-client library.
///
/// Transport-level failures (RPC errors, broken sessions) are reported as
/// [`tagbridge_core::TransientError`]; server refusals as the matching
/// session or operation error.
#[async_trait]
pub trait DaTransport: Send + Sync + 'static {
    /// Resolves `host` and creates a session with `server` on it.
    async fn open_session(&self, host: &str, server: &str) -> BridgeResult<()>;

    /// Polls server health.
    async fn server_status(&self) -> BridgeResult<ServerState>;

    /// Creates a group.
    async fn add_group(&self, request: &GroupRequest) -> BridgeResult<GroupInfo>;

    /// Creates items in a group. Results are returned in request order.
    async fn add_items(
        &self,
        group: GroupHandle,
        names: &[String],
    ) -> BridgeResult<Vec<ItemResult>>;

    /// Reads one item synchronously.
    async fn read_item(&self, item: ItemHandle, source: DataSource) -> BridgeResult<ItemState>;

    /// Writes one item synchronously.
    ///
    /// Returns the server's per-item result code; negative means the server
    /// refused the value.
    async fn write_item(&self, item: ItemHandle, value: NativeValue) -> BridgeResult<i32>;

    /// Starts asynchronous change delivery for a group.
    async fn enable_async(
        &self,
        group: GroupHandle,
        sink: Arc<dyn NotificationSink>,
    ) -> BridgeResult<()>;

    /// Stops asynchronous change delivery for a group.
    async fn disable_async(&self, group: GroupHandle) -> BridgeResult<()>;

    /// Tears down the session and every group in it.
    async fn shutdown(&self) -> BridgeResult<()>;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_state() {
        assert_eq!(ServerState::from_code(1), Some(ServerState::Running));
        assert_eq!(ServerState::from_code(6), Some(ServerState::CommFault));
        assert_eq!(ServerState::from_code(0), None);

        assert!(ServerState::Running.is_running());
        assert!(ServerState::Failed.is_fatal());
        assert!(ServerState::CommFault.is_fatal());
        assert!(!ServerState::Suspended.is_fatal());
        assert!(!ServerState::Suspended.is_running());
        assert_eq!(ServerState::CommFault.to_string(), "COMM_FAULT");
    }

    #[test]
    fn test_data_source_parse() {
        assert_eq!("device".parse::<DataSource>().unwrap(), DataSource::Device);
        assert_eq!("DEVICE".parse::<DataSource>().unwrap(), DataSource::Device);
        assert_eq!("cache".parse::<DataSource>().unwrap(), DataSource::Cache);
        assert_eq!("".parse::<DataSource>().unwrap(), DataSource::Cache);
        assert_eq!(DataSource::default(), DataSource::Cache);
    }

    #[test]
    fn test_change_batch() {
        let batch = ChangeBatch::default();
        assert!(batch.is_empty());

        let batch = ChangeBatch::new(vec![ChangeEntry {
            handle: ItemHandle(1),
            value: NativeValue::I4(1),
            quality: Quality::GOOD,
            error: 0,
            timestamp: FileTime::default(),
        }]);
        assert_eq!(batch.len(), 1);
        assert_eq!(ItemHandle(1).to_string(), "item-1");
    }
}
