// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Transport
//!
//! An in-memory [`DaTransport`] for exercising the session manager without
//! an automation server.
//!
//! ## Features
//!
//! - Scripted server states for health polls
//! - Failure injection for session open, reads and writes
//! - Per-item data types, values and error codes
//! - Call counters and recorded group requests
//! - Pushing change batches through registered sinks
//!
//! Item handles restart at 1 after every [`shutdown`](DaTransport::shutdown),
//! the way real servers recycle them across sessions.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tagbridge_core::{BridgeError, BridgeResult, SessionError};

use crate::codec::{FileTime, NativeValue, Quality, VarType, EPOCH_OFFSET_TICKS, TICKS_PER_SECOND};
use crate::transport::{
    ChangeBatch, ChangeEntry, DaTransport, DataSource, GroupHandle, GroupInfo, GroupRequest,
    ItemHandle, ItemInfo, ItemResult, ItemState, NotificationSink, ServerState,
};

/// Error code returned for item names the mock does not know.
pub const E_UNKNOWN_ITEM_ID: i32 = 0xC004_0007_u32 as i32;

/// Error code returned when writes are rejected.
pub const E_BAD_RIGHTS: i32 = 0xC004_0006_u32 as i32;

// 2024-01-01T00:00:00Z
const DEFAULT_TIMESTAMP: FileTime = FileTime(EPOCH_OFFSET_TICKS + 1_704_067_200 * TICKS_PER_SECOND);

// =============================================================================
// Mock State
// =============================================================================

#[derive(Debug, Clone)]
struct MockItem {
    data_type: VarType,
    value: NativeValue,
    quality: Quality,
    error: i32,
}

struct MockState {
    statuses: VecDeque<ServerState>,
    default_status: ServerState,
    items: HashMap<String, MockItem>,
    handles: HashMap<ItemHandle, String>,
    next_item: u32,
    next_group: u32,
    group_requests: Vec<GroupRequest>,
    sinks: HashMap<GroupHandle, Arc<dyn NotificationSink>>,
    write_history: Vec<(ItemHandle, NativeValue)>,
    read_sources: Vec<DataSource>,
    timestamp: FileTime,
    session: Option<(String, String)>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            statuses: VecDeque::new(),
            default_status: ServerState::Running,
            items: HashMap::new(),
            handles: HashMap::new(),
            next_item: 1,
            next_group: 1,
            group_requests: Vec::new(),
            sinks: HashMap::new(),
            write_history: Vec::new(),
            read_sources: Vec::new(),
            timestamp: DEFAULT_TIMESTAMP,
            session: None,
        }
    }
}

// =============================================================================
// MockTransport
// =============================================================================

/// A configurable in-memory transport.
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,

    fail_open: AtomicBool,
    fail_status: AtomicBool,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    reject_writes: AtomicBool,

    open_count: AtomicU64,
    status_count: AtomicU64,
    read_count: AtomicU64,
    write_count: AtomicU64,
    shutdown_count: AtomicU64,
}

impl MockTransport {
    /// Creates a mock whose server always reports `Running`.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Setup
    // =========================================================================

    /// Adds an item whose wire type follows its value.
    pub fn with_item(self, name: impl Into<String>, value: NativeValue) -> Self {
        let data_type = value.var_type();
        self.with_typed_item(name, data_type, value)
    }

    /// Adds an item with an explicit wire type.
    pub fn with_typed_item(
        self,
        name: impl Into<String>,
        data_type: VarType,
        value: NativeValue,
    ) -> Self {
        self.state.lock().items.insert(
            name.into(),
            MockItem {
                data_type,
                value,
                quality: Quality::GOOD,
                error: 0,
            },
        );
        self
    }

    /// Sets the state reported once the script is exhausted.
    pub fn with_default_status(self, status: ServerState) -> Self {
        self.set_default_status(status);
        self
    }

    /// Sets the state reported once the script is exhausted.
    pub fn set_default_status(&self, status: ServerState) {
        self.state.lock().default_status = status;
    }

    /// Queues states returned by the next health polls, in order.
    pub fn script_status(&self, states: impl IntoIterator<Item = ServerState>) {
        self.state.lock().statuses.extend(states);
    }

    /// Replaces an item's value.
    pub fn set_value(&self, name: &str, value: NativeValue) {
        if let Some(item) = self.state.lock().items.get_mut(name) {
            item.value = value;
        }
    }

    /// Sets the quality and per-item error reported for an item.
    pub fn set_item_status(&self, name: &str, quality: Quality, error: i32) {
        if let Some(item) = self.state.lock().items.get_mut(name) {
            item.quality = quality;
            item.error = error;
        }
    }

    /// Sets the timestamp stamped on reads.
    pub fn set_timestamp(&self, timestamp: FileTime) {
        self.state.lock().timestamp = timestamp;
    }

    /// Makes session open fail.
    pub fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Makes health polls fail at transport level.
    pub fn fail_status(&self, fail: bool) {
        self.fail_status.store(fail, Ordering::SeqCst);
    }

    /// Makes reads fail at transport level.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes writes fail at transport level.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes the server refuse written values.
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Returns the number of session opens.
    pub fn open_count(&self) -> u64 {
        self.open_count.load(Ordering::SeqCst)
    }

    /// Returns the number of health polls.
    pub fn status_count(&self) -> u64 {
        self.status_count.load(Ordering::SeqCst)
    }

    /// Returns the number of item reads.
    pub fn read_count(&self) -> u64 {
        self.read_count.load(Ordering::SeqCst)
    }

    /// Returns the number of item writes.
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::SeqCst)
    }

    /// Returns the number of shutdowns.
    pub fn shutdown_count(&self) -> u64 {
        self.shutdown_count.load(Ordering::SeqCst)
    }

    /// Returns every group request received, in order.
    pub fn group_requests(&self) -> Vec<GroupRequest> {
        self.state.lock().group_requests.clone()
    }

    /// Returns every accepted write, in order.
    pub fn write_history(&self) -> Vec<(ItemHandle, NativeValue)> {
        self.state.lock().write_history.clone()
    }

    /// Returns the data source of every read, in order.
    pub fn read_sources(&self) -> Vec<DataSource> {
        self.state.lock().read_sources.clone()
    }

    /// Returns the current handle of a created item.
    pub fn handle_of(&self, name: &str) -> Option<ItemHandle> {
        let state = self.state.lock();
        state
            .handles
            .iter()
            .find(|(_, item)| item.as_str() == name)
            .map(|(handle, _)| *handle)
    }

    /// Returns the current value of an item.
    pub fn value_of(&self, name: &str) -> Option<NativeValue> {
        self.state
            .lock()
            .items
            .get(name)
            .map(|item| item.value.clone())
    }

    /// Returns groups with asynchronous delivery enabled.
    pub fn active_groups(&self) -> Vec<GroupHandle> {
        let mut groups: Vec<GroupHandle> = self.state.lock().sinks.keys().copied().collect();
        groups.sort();
        groups
    }

    /// Returns the host and server of the open session.
    pub fn session(&self) -> Option<(String, String)> {
        self.state.lock().session.clone()
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Builds a change entry for a created item.
    pub fn change(&self, name: &str, value: NativeValue) -> Option<ChangeEntry> {
        let handle = self.handle_of(name)?;
        let timestamp = self.state.lock().timestamp;
        Some(ChangeEntry {
            handle,
            value,
            quality: Quality::GOOD,
            error: 0,
            timestamp,
        })
    }

    /// Delivers a batch to the sink registered for `group`.
    ///
    /// Returns `false` if delivery is not enabled for the group.
    pub fn push_batch(&self, group: GroupHandle, mut batch: ChangeBatch) -> bool {
        let sink = self.state.lock().sinks.get(&group).cloned();
        match sink {
            Some(sink) => {
                batch.group = Some(group);
                sink.on_data_change(&batch);
                true
            }
            None => false,
        }
    }

    /// Delivers `entries` to every enabled group's sink. Returns the number of sinks notified.
    pub fn notify(&self, entries: Vec<ChangeEntry>) -> usize {
        let sinks: Vec<(GroupHandle, Arc<dyn NotificationSink>)> = self
            .state
            .lock()
            .sinks
            .iter()
            .map(|(group, sink)| (*group, sink.clone()))
            .collect();

        for (group, sink) in &sinks {
            let batch = ChangeBatch {
                group: Some(*group),
                entries: entries.clone(),
            };
            sink.on_data_change(&batch);
        }
        sinks.len()
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("open_count", &self.open_count())
            .field("status_count", &self.status_count())
            .field("read_count", &self.read_count())
            .field("write_count", &self.write_count())
            .finish()
    }
}

#[async_trait]
impl DaTransport for MockTransport {
    async fn open_session(&self, host: &str, server: &str) -> BridgeResult<()> {
        self.open_count.fetch_add(1, Ordering::SeqCst);

        if self.fail_open.load(Ordering::SeqCst) {
            return Err(SessionError::server_unavailable(host, server, "Mock open failure").into());
        }

        self.state.lock().session = Some((host.to_string(), server.to_string()));
        Ok(())
    }

    async fn server_status(&self) -> BridgeResult<ServerState> {
        self.status_count.fetch_add(1, Ordering::SeqCst);

        if self.fail_status.load(Ordering::SeqCst) {
            return Err(BridgeError::communication("server_status", "Mock status failure"));
        }

        let mut state = self.state.lock();
        if state.session.is_none() {
            return Err(BridgeError::communication("server_status", "No open session"));
        }
        let status = state.statuses.pop_front().unwrap_or(state.default_status);
        Ok(status)
    }

    async fn add_group(&self, request: &GroupRequest) -> BridgeResult<GroupInfo> {
        let mut state = self.state.lock();
        if state.session.is_none() {
            return Err(BridgeError::communication("add_group", "No open session"));
        }
        state.group_requests.push(request.clone());

        let handle = GroupHandle(state.next_group);
        state.next_group += 1;
        Ok(GroupInfo {
            handle,
            revised_update_rate_ms: request.update_rate_ms,
        })
    }

    async fn add_items(
        &self,
        _group: GroupHandle,
        names: &[String],
    ) -> BridgeResult<Vec<ItemResult>> {
        let mut state = self.state.lock();
        let mut results = Vec::with_capacity(names.len());

        for name in names {
            let outcome = match state.items.get(name).map(|item| item.data_type) {
                Some(data_type) => {
                    let handle = ItemHandle(state.next_item);
                    state.next_item += 1;
                    state.handles.insert(handle, name.clone());
                    Ok(ItemInfo { handle, data_type })
                }
                None => Err(E_UNKNOWN_ITEM_ID),
            };
            results.push(ItemResult {
                name: name.clone(),
                outcome,
            });
        }
        Ok(results)
    }

    async fn read_item(&self, item: ItemHandle, source: DataSource) -> BridgeResult<ItemState> {
        self.read_count.fetch_add(1, Ordering::SeqCst);

        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BridgeError::communication("read", "Mock read failure"));
        }

        let mut state = self.state.lock();
        state.read_sources.push(source);
        let timestamp = state.timestamp;
        let item = state
            .handles
            .get(&item)
            .and_then(|name| state.items.get(name))
            .cloned()
            .ok_or_else(|| BridgeError::communication("read", format!("Unknown {item}")))?;

        Ok(ItemState {
            value: item.value,
            quality: item.quality,
            timestamp,
            error: item.error,
        })
    }

    async fn write_item(&self, item: ItemHandle, value: NativeValue) -> BridgeResult<i32> {
        self.write_count.fetch_add(1, Ordering::SeqCst);

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BridgeError::communication("write", "Mock write failure"));
        }
        if self.reject_writes.load(Ordering::SeqCst) {
            return Ok(E_BAD_RIGHTS);
        }

        let mut state = self.state.lock();
        let name = state
            .handles
            .get(&item)
            .cloned()
            .ok_or_else(|| BridgeError::communication("write", format!("Unknown {item}")))?;
        if let Some(stored) = state.items.get_mut(&name) {
            stored.value = value.clone();
        }
        state.write_history.push((item, value));
        Ok(0)
    }

    async fn enable_async(
        &self,
        group: GroupHandle,
        sink: Arc<dyn NotificationSink>,
    ) -> BridgeResult<()> {
        self.state.lock().sinks.insert(group, sink);
        Ok(())
    }

    async fn disable_async(&self, group: GroupHandle) -> BridgeResult<()> {
        self.state.lock().sinks.remove(&group);
        Ok(())
    }

    async fn shutdown(&self) -> BridgeResult<()> {
        self.shutdown_count.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock();
        state.sinks.clear();
        state.handles.clear();
        state.next_item = 1;
        state.next_group = 1;
        state.session = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_status() {
        let mock = MockTransport::new().with_default_status(ServerState::Suspended);
        mock.open_session("localhost", "Sim").await.unwrap();
        mock.script_status([ServerState::Running]);

        assert_eq!(mock.server_status().await.unwrap(), ServerState::Running);
        assert_eq!(mock.server_status().await.unwrap(), ServerState::Suspended);
        assert_eq!(mock.status_count(), 2);
    }

    #[tokio::test]
    async fn test_handles_recycled_after_shutdown() {
        let mock = MockTransport::new().with_item("A", NativeValue::I4(1));
        mock.open_session("localhost", "Sim").await.unwrap();
        let names = vec!["A".to_string(), "missing".to_string()];

        let results = mock.add_items(GroupHandle(1), &names).await.unwrap();
        assert_eq!(results[0].outcome.unwrap().handle, ItemHandle(1));
        assert_eq!(results[1].outcome, Err(E_UNKNOWN_ITEM_ID));

        mock.shutdown().await.unwrap();
        assert!(mock.handle_of("A").is_none());

        mock.open_session("localhost", "Sim").await.unwrap();
        let results = mock.add_items(GroupHandle(1), &names[..1]).await.unwrap();
        assert_eq!(results[0].outcome.unwrap().handle, ItemHandle(1));
    }

    #[tokio::test]
    async fn test_write_updates_value() {
        let mock = MockTransport::new().with_item("A", NativeValue::I4(1));
        mock.open_session("localhost", "Sim").await.unwrap();
        mock.add_items(GroupHandle(1), &["A".to_string()]).await.unwrap();
        let handle = mock.handle_of("A").unwrap();

        assert_eq!(mock.write_item(handle, NativeValue::I4(9)).await.unwrap(), 0);
        assert_eq!(mock.value_of("A"), Some(NativeValue::I4(9)));

        mock.reject_writes(true);
        assert_eq!(mock.write_item(handle, NativeValue::I4(3)).await.unwrap(), E_BAD_RIGHTS);
        assert_eq!(mock.value_of("A"), Some(NativeValue::I4(9)));
        assert_eq!(mock.write_count(), 2);
    }
}
