// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session lifecycle and health supervision.
//!
//! [`ConnectionManager`] owns one session to one automation server. It
//! provisions groups and items from a [`DeviceConfig`], keeps the
//! [`TagRegistry`] in step with the live session, and re-establishes the
//! session when health checks find it down.
//!
//! # State Machine
//!
//! ```text
//!            connect                 provisioned
//!  Stopped ──────────▶ Connecting ───────────────▶ Connected
//!                        │   ▲                       │
//!                 failed │   │ reconnect             │ unhealthy poll
//!                        ▼   │                       ▼
//!                      Disconnected ◀────────────────┘
//!
//!  close: any state ──▶ Stopped
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tagbridge_config::{DeviceConfig, GroupConfig};
use tagbridge_core::retry::duration_millis;
use tagbridge_core::{
    BridgeError, BridgeResult, FixedDelay, OperationError, RetryPolicy, SessionError, TagId,
    TransientError,
};

use crate::codec::{decode, TagValue};
use crate::dispatcher::{ChangeHandler, SubscriptionDispatcher};
use crate::registry::{ItemEntry, TagRegistry};
use crate::transport::{
    DaTransport, DataSource, GroupHandle, GroupRequest, NotificationSink, ServerState,
};

/// Upper bound of the percent deadband.
pub const MAX_DEADBAND: f32 = 100.0;

// =============================================================================
// ConnectionState
// =============================================================================

/// Lifecycle state of a [`ConnectionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Not started, or closed.
    #[default]
    Stopped,
    /// A connect or reconnect is in progress.
    Connecting,
    /// Session established and provisioned.
    Connected,
    /// Session lost or never established; recoverable.
    Disconnected,
}

impl ConnectionState {
    /// Returns `true` for [`ConnectionState::Stopped`].
    #[inline]
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns `true` for [`ConnectionState::Connecting`].
    #[inline]
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting)
    }

    /// Returns `true` for [`ConnectionState::Connected`].
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` for [`ConnectionState::Disconnected`].
    #[inline]
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

// =============================================================================
// ManagerOptions
// =============================================================================

/// Timing of connection supervision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerOptions {
    /// Wait after opening the session before the first health poll.
    #[serde(with = "duration_millis")]
    pub settle_delay: Duration,

    /// Wait before every health poll of the recovery loop.
    #[serde(with = "duration_millis")]
    pub retry_delay: Duration,

    /// Wait applied when a check or reconnect finds a connect in progress.
    #[serde(with = "duration_millis")]
    pub connecting_wait: Duration,

    /// Health polls made after a reconnect before giving up.
    pub health_attempts: u32,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(1),
            retry_delay: Duration::from_secs(1),
            connecting_wait: Duration::from_secs(1),
            health_attempts: 5,
        }
    }
}

impl ManagerOptions {
    /// Options without any waits. Intended for tests.
    pub fn immediate() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            retry_delay: Duration::ZERO,
            connecting_wait: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Sets the number of health polls after a reconnect.
    pub fn with_health_attempts(mut self, attempts: u32) -> Self {
        self.health_attempts = attempts.max(1);
        self
    }

    /// Sets the recovery loop delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

// =============================================================================
// ProvisionedGroup
// =============================================================================

/// A group created on the server by the last connect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvisionedGroup {
    /// Group name.
    pub name: String,
    /// Server handle.
    pub handle: GroupHandle,
    /// Update rate sent to the server.
    pub requested_rate_ms: u32,
    /// Update rate the server applied.
    pub revised_rate_ms: u32,
    /// Deadband sent to the server.
    pub deadband: f32,
    /// Whether change delivery is wanted for this group.
    pub subscribe: bool,
    /// Items created.
    pub tag_count: usize,
    /// Items the server refused.
    pub failed_items: usize,
}

type StateChangeCallback = Arc<dyn Fn(ConnectionState, ConnectionState) + Send + Sync>;

// =============================================================================
// ConnectionManager
// =============================================================================

/// Owns the session with one automation server.
///
/// All operations take `&self`; share the manager behind an [`Arc`].
/// `connect`, `reconnect` and `close` are serialized by a manager-scoped
/// lock. Reads and writes never take that lock, they fail fast with a
/// transient error whenever the state is not `Connected`.
pub struct ConnectionManager<T: DaTransport> {
    transport: Arc<T>,
    options: ManagerOptions,

    state: Mutex<ConnectionState>,
    config: RwLock<Option<DeviceConfig>>,
    groups: RwLock<Vec<ProvisionedGroup>>,
    subscribed: RwLock<Vec<GroupHandle>>,
    delivery_enabled: AtomicBool,

    registry: Arc<TagRegistry>,
    dispatcher: Arc<SubscriptionDispatcher>,

    reconnect_lock: tokio::sync::Mutex<()>,
    on_state_change: RwLock<Option<StateChangeCallback>>,
    stats: ConnectionStats,
}

impl<T: DaTransport> ConnectionManager<T> {
    /// Creates a stopped manager.
    pub fn new(transport: Arc<T>, options: ManagerOptions) -> Self {
        let registry = Arc::new(TagRegistry::new());
        let dispatcher = Arc::new(SubscriptionDispatcher::new(registry.clone()));
        Self {
            transport,
            options,
            state: Mutex::new(ConnectionState::Stopped),
            config: RwLock::new(None),
            groups: RwLock::new(Vec::new()),
            subscribed: RwLock::new(Vec::new()),
            delivery_enabled: AtomicBool::new(false),
            registry,
            dispatcher,
            reconnect_lock: tokio::sync::Mutex::new(()),
            on_state_change: RwLock::new(None),
            stats: ConnectionStats::new(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the current state.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Returns the supervision options.
    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    /// Returns the applied device configuration.
    pub fn config(&self) -> Option<DeviceConfig> {
        self.config.read().clone()
    }

    /// Returns the groups created by the last successful provisioning.
    pub fn groups(&self) -> Vec<ProvisionedGroup> {
        self.groups.read().clone()
    }

    /// Returns the tag registry.
    pub fn registry(&self) -> &Arc<TagRegistry> {
        &self.registry
    }

    /// Returns the change dispatcher.
    pub fn dispatcher(&self) -> &Arc<SubscriptionDispatcher> {
        &self.dispatcher
    }

    /// Returns the transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Returns connection counters.
    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Returns `true` once delivery has been requested and not withdrawn.
    pub fn is_delivery_enabled(&self) -> bool {
        self.delivery_enabled.load(Ordering::SeqCst)
    }

    /// Installs a callback invoked as `(old, new)` on every state change.
    pub fn set_state_change_callback<F>(&self, callback: F)
    where
        F: Fn(ConnectionState, ConnectionState) + Send + Sync + 'static,
    {
        *self.on_state_change.write() = Some(Arc::new(callback));
    }

    /// Installs the caller's change handler.
    pub fn set_handler(&self, handler: Arc<dyn ChangeHandler>) {
        self.dispatcher.set_handler(handler);
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Establishes the session and provisions every configured group.
    ///
    /// The configuration is kept for later reconnects even when this fails.
    /// On failure the state is `Disconnected`.
    pub async fn connect(&self, config: DeviceConfig) -> BridgeResult<()> {
        let _guard = self.reconnect_lock.lock().await;

        *self.config.write() = Some(config.clone());
        if !self.state().is_stopped() || !self.groups.read().is_empty() {
            self.teardown().await;
        }
        self.establish(&config).await
    }

    /// Tears down and re-establishes the session.
    ///
    /// A no-op when stopped or connected. When a connect is in progress this
    /// waits briefly and returns without starting another one.
    pub async fn reconnect(&self) -> BridgeResult<()> {
        match self.state() {
            ConnectionState::Stopped | ConnectionState::Connected => return Ok(()),
            ConnectionState::Connecting => {
                self.wait_for_connecting().await;
                return Ok(());
            }
            ConnectionState::Disconnected => {}
        }

        let _guard = self.reconnect_lock.lock().await;

        // Someone else may have finished while we waited for the lock.
        if !self.state().is_disconnected() {
            return Ok(());
        }

        let config = self
            .config
            .read()
            .clone()
            .ok_or(SessionError::NotConfigured)?;

        self.stats.reconnects.fetch_add(1, Ordering::Relaxed);
        tracing::info!(server = %config.server, "Reconnecting");

        self.set_state(ConnectionState::Connecting);
        self.teardown().await;
        self.establish(&config).await?;

        if self.is_delivery_enabled() {
            self.enable_delivery().await;
        }
        Ok(())
    }

    /// Verifies server health, recovering the session if `retry` is set.
    ///
    /// Returns `true` when the session is usable afterwards.
    pub async fn check_status(&self, retry: bool) -> bool {
        match self.state() {
            ConnectionState::Stopped => false,
            ConnectionState::Connecting => {
                self.wait_for_connecting().await;
                matches!(
                    self.state(),
                    ConnectionState::Connected | ConnectionState::Connecting
                )
            }
            ConnectionState::Disconnected => retry && self.recover().await,
            ConnectionState::Connected => match self.poll_status().await {
                Ok(status) if status.is_running() => true,
                outcome => {
                    match outcome {
                        Ok(status) => tracing::warn!(state = %status, "Server not running"),
                        Err(e) => e.log("health poll"),
                    }
                    self.transition(ConnectionState::Connected, ConnectionState::Disconnected);
                    retry && self.recover().await
                }
            },
        }
    }

    /// Unsubscribes, tears down the session and stops the manager.
    ///
    /// The change handler is released. Safe to call repeatedly.
    pub async fn close(&self) -> BridgeResult<()> {
        let _guard = self.reconnect_lock.lock().await;

        if self.state().is_stopped() && self.groups.read().is_empty() {
            self.dispatcher.clear_handler();
            return Ok(());
        }

        self.delivery_enabled.store(false, Ordering::SeqCst);
        self.teardown().await;
        self.dispatcher.clear_handler();
        self.set_state(ConnectionState::Stopped);

        tracing::info!("Connection closed");
        Ok(())
    }

    // =========================================================================
    // Data Access
    // =========================================================================

    /// Reads one tag synchronously.
    ///
    /// Server-reported failures come back as a value with `ok == false`,
    /// not as an error.
    pub async fn read(&self, id: TagId, source: DataSource) -> BridgeResult<TagValue> {
        self.ensure_connected()?;
        let entry = self.lookup(id)?;

        self.stats.reads.fetch_add(1, Ordering::Relaxed);
        let state = match self.transport.read_item(entry.handle, source).await {
            Ok(state) => state,
            Err(e) => {
                self.stats.read_failures.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };

        if state.error < 0 {
            tracing::debug!(tag_id = %id, code = state.error, "Server reported read failure");
        }
        Ok(TagValue::from_server(
            &state.value,
            state.quality,
            state.error,
            state.timestamp,
        ))
    }

    /// Writes one tag synchronously.
    ///
    /// `bytes` is decoded into the item's wire type before anything is sent.
    pub async fn write(&self, id: TagId, bytes: &[u8]) -> BridgeResult<()> {
        self.ensure_connected()?;
        let entry = self.lookup(id)?;
        let value = decode(bytes, entry.data_type)?;

        self.stats.writes.fetch_add(1, Ordering::Relaxed);
        let code = match self.transport.write_item(entry.handle, value).await {
            Ok(code) => code,
            Err(e) => {
                self.stats.write_failures.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };

        if code < 0 {
            self.stats.write_failures.fetch_add(1, Ordering::Relaxed);
            return Err(OperationError::WriteRejected {
                tag_id: id,
                message: format!("server error 0x{:08X}", code as u32),
            }
            .into());
        }
        Ok(())
    }

    // =========================================================================
    // Subscription
    // =========================================================================

    /// Enables change delivery for every subscribe-marked group.
    ///
    /// When not connected the request is remembered and applied by the next
    /// reconnect. Returns the number of groups now delivering.
    pub async fn subscribe(&self) -> BridgeResult<usize> {
        if self.state().is_stopped() {
            return Err(OperationError::Stopped.into());
        }
        self.delivery_enabled.store(true, Ordering::SeqCst);

        if !self.state().is_connected() {
            return Ok(0);
        }
        Ok(self.enable_delivery().await)
    }

    /// Disables change delivery.
    pub async fn unsubscribe(&self) -> BridgeResult<()> {
        self.delivery_enabled.store(false, Ordering::SeqCst);
        self.disable_delivery().await;
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn set_state(&self, new: ConnectionState) {
        let old = std::mem::replace(&mut *self.state.lock(), new);
        self.notify_state_change(old, new);
    }

    fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        {
            let mut state = self.state.lock();
            if *state != from {
                return false;
            }
            *state = to;
        }
        self.notify_state_change(from, to);
        true
    }

    fn notify_state_change(&self, old: ConnectionState, new: ConnectionState) {
        if old == new {
            return;
        }
        tracing::trace!(from = %old, to = %new, "Connection state changed");

        let callback = self.on_state_change.read().clone();
        if let Some(callback) = callback {
            callback(old, new);
        }
    }

    async fn wait_for_connecting(&self) {
        if !self.options.connecting_wait.is_zero() {
            tokio::time::sleep(self.options.connecting_wait).await;
        }
    }

    fn ensure_connected(&self) -> BridgeResult<()> {
        match self.state() {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Stopped => Err(OperationError::Stopped.into()),
            other => Err(BridgeError::disconnected(other.to_string())),
        }
    }

    fn lookup(&self, id: TagId) -> BridgeResult<ItemEntry> {
        self.registry
            .lookup_handle(id)
            .ok_or_else(|| BridgeError::tag_not_found(id))
    }

    async fn poll_status(&self) -> BridgeResult<ServerState> {
        self.stats.health_polls.fetch_add(1, Ordering::Relaxed);
        let status = self.transport.server_status().await?;
        tracing::trace!(state = %status, "Health poll");
        Ok(status)
    }

    /// Reconnects, then polls until the server runs or attempts run out.
    ///
    /// A successful reconnect leaves the state `Connected` before the first
    /// poll. Reads and writes issued during the polling window go through
    /// while health is still unconfirmed; if the polls run out the state
    /// drops back to `Disconnected`.
    async fn recover(&self) -> bool {
        if let Err(e) = self.reconnect().await {
            e.log("reconnect");
            return false;
        }
        if self.state().is_stopped() {
            return false;
        }

        let policy = FixedDelay::new(self.options.health_attempts, self.options.retry_delay)
            .delay_first(true);

        let outcome = policy
            .execute(|| async move {
                let status = self.poll_status().await?;
                if status.is_running() {
                    Ok(())
                } else {
                    Err(BridgeError::from(TransientError::ServerNotRunning {
                        state: status.to_string(),
                    }))
                }
            })
            .await;

        match outcome {
            Ok(()) => {
                if self.state().is_disconnected() {
                    self.set_state(ConnectionState::Connected);
                }
                self.state().is_connected()
            }
            Err(e) => {
                tracing::warn!(
                    attempts = self.options.health_attempts,
                    error = %e,
                    "Server did not recover"
                );
                self.transition(ConnectionState::Connected, ConnectionState::Disconnected);
                false
            }
        }
    }

    async fn establish(&self, config: &DeviceConfig) -> BridgeResult<()> {
        self.set_state(ConnectionState::Connecting);

        match self.provision(config).await {
            Ok(()) => {
                self.stats.connects.fetch_add(1, Ordering::Relaxed);
                self.set_state(ConnectionState::Connected);
                tracing::info!(
                    host = %config.host,
                    server = %config.server,
                    tags = self.registry.len(),
                    "Connected"
                );
                Ok(())
            }
            Err(e) => {
                self.stats.connect_failures.fetch_add(1, Ordering::Relaxed);
                self.set_state(ConnectionState::Disconnected);
                tracing::error!(
                    host = %config.host,
                    server = %config.server,
                    error = %e,
                    "Connect failed"
                );
                Err(e)
            }
        }
    }

    async fn provision(&self, config: &DeviceConfig) -> BridgeResult<()> {
        self.transport
            .open_session(&config.host, &config.server)
            .await
            .map_err(|e| as_open_error(config, e))?;

        if !self.options.settle_delay.is_zero() {
            tokio::time::sleep(self.options.settle_delay).await;
        }

        let status = self
            .poll_status()
            .await
            .map_err(|e| as_health_error(config, e))?;
        if status.is_fatal() {
            return Err(SessionError::ServerUnhealthy {
                server: config.server.clone(),
                state: status.to_string(),
            }
            .into());
        }

        for group in &config.groups {
            self.provision_group(group).await?;
        }
        Ok(())
    }

    async fn provision_group(&self, group: &GroupConfig) -> BridgeResult<()> {
        let request = group_request(group);

        let info = self
            .transport
            .add_group(&request)
            .await
            .map_err(|e| as_group_error(&group.name, e))?;

        let names = group.tag_names();
        let results = self
            .transport
            .add_items(info.handle, &names)
            .await
            .map_err(|e| as_group_error(&group.name, e))?;

        if results.len() != group.tags.len() {
            tracing::warn!(
                group = %group.name,
                requested = group.tags.len(),
                returned = results.len(),
                "Item result count mismatch"
            );
        }

        let mut created = 0usize;
        let mut failed = 0usize;
        for (tag, result) in group.tags.iter().zip(results) {
            match result.outcome {
                Ok(item) => {
                    self.registry
                        .register(tag.id, ItemEntry::new(item.handle, item.data_type, &tag.name));
                    created += 1;
                }
                Err(code) => {
                    failed += 1;
                    tracing::warn!(
                        group = %group.name,
                        tag_id = %tag.id,
                        name = %tag.name,
                        code = format_args!("0x{:08X}", code as u32),
                        "Item creation failed"
                    );
                }
            }
        }

        if failed > 0 {
            tracing::warn!(group = %group.name, created, failed, "Group partially provisioned");
        } else {
            tracing::debug!(
                group = %group.name,
                handle = %info.handle,
                created,
                rate_ms = info.revised_update_rate_ms,
                "Group provisioned"
            );
        }

        if group.subscribe {
            self.subscribed.write().push(info.handle);
        }
        self.groups.write().push(ProvisionedGroup {
            name: group.name.clone(),
            handle: info.handle,
            requested_rate_ms: request.update_rate_ms,
            revised_rate_ms: info.revised_update_rate_ms,
            deadband: request.deadband,
            subscribe: group.subscribe,
            tag_count: created,
            failed_items: failed,
        });
        Ok(())
    }

    async fn enable_delivery(&self) -> usize {
        let groups = self.subscribed.read().clone();
        let sink: Arc<dyn NotificationSink> = self.dispatcher.clone();

        let mut enabled = 0;
        for group in groups {
            match self.transport.enable_async(group, sink.clone()).await {
                Ok(()) => enabled += 1,
                Err(e) => tracing::warn!(group = %group, error = %e, "Failed to enable delivery"),
            }
        }
        tracing::info!(groups = enabled, "Subscribed");
        enabled
    }

    async fn disable_delivery(&self) {
        let groups = self.subscribed.read().clone();
        for group in groups {
            if let Err(e) = self.transport.disable_async(group).await {
                tracing::debug!(group = %group, error = %e, "Failed to disable delivery");
            }
        }
    }

    /// Drops the session and everything derived from it. The stored
    /// configuration and the delivery flag survive.
    async fn teardown(&self) {
        self.disable_delivery().await;
        if let Err(e) = self.transport.shutdown().await {
            tracing::debug!(error = %e, "Transport shutdown failed");
        }
        self.registry.clear();
        self.subscribed.write().clear();
        self.groups.write().clear();
    }
}

impl<T: DaTransport> fmt::Debug for ConnectionManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("tags", &self.registry.len())
            .field("groups", &self.groups.read().len())
            .field("delivery_enabled", &self.is_delivery_enabled())
            .finish()
    }
}

/// Builds the server request for `group`: minimum update rate applied,
/// deadband clamped to `[0, MAX_DEADBAND]`.
pub fn group_request(group: &GroupConfig) -> GroupRequest {
    GroupRequest {
        name: group.name.clone(),
        active: true,
        update_rate_ms: group.effective_update_rate(),
        deadband: clamp_deadband(group.deadband, &group.name),
    }
}

fn clamp_deadband(deadband: f32, group: &str) -> f32 {
    if deadband.is_nan() {
        tracing::warn!(group = %group, "Deadband is NaN, using 0");
        return 0.0;
    }
    let clamped = deadband.clamp(0.0, MAX_DEADBAND);
    if clamped != deadband {
        tracing::warn!(group = %group, deadband, clamped, "Deadband out of range");
    }
    clamped
}

/// Connect failures surface as session errors, never as transient ones.
fn as_open_error(config: &DeviceConfig, error: BridgeError) -> BridgeError {
    match error {
        BridgeError::Session(_) => error,
        other => SessionError::server_unavailable(&config.host, &config.server, other.to_string())
            .into(),
    }
}

fn as_health_error(config: &DeviceConfig, error: BridgeError) -> BridgeError {
    match error {
        BridgeError::Session(_) => error,
        other => SessionError::HealthCheckFailed {
            server: config.server.clone(),
            message: other.to_string(),
        }
        .into(),
    }
}

fn as_group_error(group: &str, error: BridgeError) -> BridgeError {
    match error {
        BridgeError::Session(_) => error,
        other => SessionError::group_creation(group, other.to_string()).into(),
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Counters for connection activity.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    connects: AtomicU64,
    connect_failures: AtomicU64,
    reconnects: AtomicU64,
    health_polls: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    read_failures: AtomicU64,
    write_failures: AtomicU64,
}

/// Point-in-time copy of [`ConnectionStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConnectionSnapshot {
    /// Successful connects, reconnects included.
    pub connects: u64,
    /// Failed connects.
    pub connect_failures: u64,
    /// Reconnects started.
    pub reconnects: u64,
    /// Health polls sent.
    pub health_polls: u64,
    /// Reads sent.
    pub reads: u64,
    /// Writes sent.
    pub writes: u64,
    /// Reads failed at transport level.
    pub read_failures: u64,
    /// Writes failed or refused.
    pub write_failures: u64,
}

impl ConnectionStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns health polls sent.
    pub fn health_polls(&self) -> u64 {
        self.health_polls.load(Ordering::Relaxed)
    }

    /// Returns reconnects started.
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Copies all counters.
    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            connects: self.connects.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            health_polls: self.health_polls.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }

    /// Resets all counters.
    pub fn reset(&self) {
        self.connects.store(0, Ordering::Relaxed);
        self.connect_failures.store(0, Ordering::Relaxed);
        self.reconnects.store(0, Ordering::Relaxed);
        self.health_polls.store(0, Ordering::Relaxed);
        self.reads.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
        self.read_failures.store(0, Ordering::Relaxed);
        self.write_failures.store(0, Ordering::Relaxed);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{NativeValue, Quality};
    use crate::dispatcher::{ChannelHandler, TagChange};
    use crate::mock::MockTransport;

    fn device() -> DeviceConfig {
        DeviceConfig::new("Sim.Server").with_group(
            GroupConfig::new("fast")
                .update_rate(50)
                .subscribe(true)
                .tag(1, "Int4")
                .tag(2, "Real8")
                .tag(3, "Missing"),
        )
    }

    fn mock() -> Arc<MockTransport> {
        Arc::new(
            MockTransport::new()
                .with_item("Int4", NativeValue::I4(42))
                .with_item("Real8", NativeValue::R8(2.5)),
        )
    }

    async fn connected() -> (Arc<MockTransport>, ConnectionManager<MockTransport>) {
        let transport = mock();
        let manager = ConnectionManager::new(transport.clone(), ManagerOptions::immediate());
        manager.connect(device()).await.unwrap();
        (transport, manager)
    }

    #[tokio::test]
    async fn test_connect_provisions_partially() {
        let (transport, manager) = connected().await;

        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(manager.registry().len(), 2);
        assert!(manager.registry().lookup_handle(TagId(3)).is_none());

        let groups = manager.groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].requested_rate_ms, 100);
        assert_eq!(groups[0].tag_count, 2);
        assert_eq!(groups[0].failed_items, 1);
        assert_eq!(transport.group_requests()[0].update_rate_ms, 100);
        assert_eq!(
            transport.session(),
            Some(("localhost".to_string(), "Sim.Server".to_string()))
        );
    }

    #[tokio::test]
    async fn test_connect_failure_leaves_disconnected() {
        let transport = mock();
        transport.fail_open(true);
        let manager = ConnectionManager::new(transport.clone(), ManagerOptions::immediate());

        let err = manager.connect(device()).await.unwrap_err();
        assert!(matches!(err, BridgeError::Session(_)));
        assert!(err.is_retryable());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.config().is_some());
        assert_eq!(manager.stats().snapshot().connect_failures, 1);
    }

    #[tokio::test]
    async fn test_failed_first_health_poll_is_session_error() {
        let transport = mock();
        transport.fail_status(true);
        let manager = ConnectionManager::new(transport.clone(), ManagerOptions::immediate());

        let err = manager.connect(device()).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Session(SessionError::HealthCheckFailed { .. })
        ));
        assert!(err.is_retryable());
        assert_eq!(err.result_code(), tagbridge_core::ResultCode::Error);
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        transport.fail_status(false);
        assert!(manager.check_status(true).await);
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_open_failure_is_session_error() {
        let config = device();
        let err = as_open_error(&config, BridgeError::communication("open", "RPC unavailable"));
        assert!(matches!(
            err,
            BridgeError::Session(SessionError::ServerUnavailable { .. })
        ));
        assert_eq!(err.result_code(), tagbridge_core::ResultCode::Error);

        let session: BridgeError = SessionError::server_unavailable("h", "s", "denied").into();
        assert!(matches!(
            as_open_error(&config, session),
            BridgeError::Session(SessionError::ServerUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_rejects_fatal_server() {
        let transport = mock();
        transport.script_status([ServerState::CommFault]);
        let manager = ConnectionManager::new(transport.clone(), ManagerOptions::immediate());

        let err = manager.connect(device()).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Session(SessionError::ServerUnhealthy { .. })
        ));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.registry().is_empty());
    }

    #[tokio::test]
    async fn test_deadband_clamped() {
        let transport = mock();
        let manager = ConnectionManager::new(transport.clone(), ManagerOptions::immediate());
        let config = DeviceConfig::new("Sim")
            .with_group(GroupConfig::new("a").deadband(250.0).tag(1, "Int4"))
            .with_group(GroupConfig::new("b").deadband(f32::NAN).tag(2, "Real8"));

        manager.connect(config).await.unwrap();

        let requests = transport.group_requests();
        assert_eq!(requests[0].deadband, 100.0);
        assert_eq!(requests[1].deadband, 0.0);
        assert_eq!(requests[0].update_rate_ms, 1000);
    }

    #[tokio::test]
    async fn test_read_and_write() {
        let (transport, manager) = connected().await;

        let value = manager.read(TagId(1), DataSource::Cache).await.unwrap();
        assert!(value.ok);
        assert_eq!(value.bytes, 42i32.to_ne_bytes().to_vec());
        assert_eq!(value.quality, Quality::GOOD);

        transport.set_value("Int4", NativeValue::I4(-3));
        let value = manager.read(TagId(1), DataSource::Cache).await.unwrap();
        assert_eq!(value.bytes, (-3i32).to_ne_bytes().to_vec());

        manager.write(TagId(2), &7.5f64.to_ne_bytes()).await.unwrap();
        assert_eq!(transport.value_of("Real8"), Some(NativeValue::R8(7.5)));

        let value = manager.read(TagId(2), DataSource::Device).await.unwrap();
        assert_eq!(value.bytes, 7.5f64.to_ne_bytes().to_vec());
        assert_eq!(
            transport.read_sources(),
            vec![DataSource::Cache, DataSource::Cache, DataSource::Device]
        );
    }

    #[tokio::test]
    async fn test_read_server_error_is_value() {
        let (transport, manager) = connected().await;
        transport.set_item_status("Int4", Quality::BAD_COMM_FAILURE, -1);

        let value = manager.read(TagId(1), DataSource::Cache).await.unwrap();
        assert!(!value.ok);
        assert!(value.bytes.is_empty());
        assert_eq!(value.quality, Quality::BAD_COMM_FAILURE);
    }

    #[tokio::test]
    async fn test_read_while_disconnected_makes_no_call() {
        let transport = mock();
        transport.fail_open(true);
        let manager = ConnectionManager::new(transport.clone(), ManagerOptions::immediate());
        let _ = manager.connect(device()).await;

        let err = manager.read(TagId(1), DataSource::Cache).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(transport.read_count(), 0);
    }

    #[tokio::test]
    async fn test_read_write_when_stopped() {
        let manager = ConnectionManager::new(mock(), ManagerOptions::immediate());
        let err = manager.read(TagId(1), DataSource::Cache).await.unwrap_err();
        assert!(matches!(err, BridgeError::Operation(OperationError::Stopped)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_unknown_tag() {
        let (_transport, manager) = connected().await;
        let err = manager.read(TagId(99), DataSource::Cache).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Operation(OperationError::TagNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_short_write_never_reaches_server() {
        let (transport, manager) = connected().await;

        let err = manager.write(TagId(1), &[1, 2]).await.unwrap_err();
        assert!(matches!(err, BridgeError::Codec(_)));
        assert_eq!(transport.write_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_write() {
        let (transport, manager) = connected().await;
        transport.reject_writes(true);

        let err = manager.write(TagId(1), &5i32.to_ne_bytes()).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Operation(OperationError::WriteRejected { .. })
        ));
        assert_eq!(manager.stats().snapshot().write_failures, 1);
    }

    #[tokio::test]
    async fn test_check_status_healthy() {
        let (transport, manager) = connected().await;
        let before = transport.status_count();

        assert!(manager.check_status(true).await);
        assert_eq!(transport.status_count(), before + 1);
        assert_eq!(manager.stats().reconnects(), 0);
    }

    #[tokio::test]
    async fn test_check_status_without_retry_marks_disconnected() {
        let (transport, manager) = connected().await;
        transport.script_status([ServerState::Suspended]);

        assert!(!manager.check_status(false).await);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.stats().reconnects(), 0);
    }

    #[tokio::test]
    async fn test_check_status_recovers_on_third_poll() {
        let (transport, manager) = connected().await;
        let before = transport.status_count();

        // check poll, connect poll, then recovery polls 1 and 2 fail, 3 runs.
        transport.script_status([
            ServerState::Suspended,
            ServerState::Suspended,
            ServerState::Suspended,
            ServerState::Suspended,
            ServerState::Running,
        ]);

        assert!(manager.check_status(true).await);
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(transport.status_count(), before + 5);
        assert_eq!(manager.stats().reconnects(), 1);
        assert_eq!(manager.registry().len(), 2);
    }

    #[tokio::test]
    async fn test_check_status_gives_up_after_budget() {
        let (transport, manager) = connected().await;
        let before = transport.status_count();
        transport.set_default_status(ServerState::Suspended);

        assert!(!manager.check_status(true).await);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        // check poll + connect poll + 5 recovery polls
        assert_eq!(transport.status_count(), before + 7);
    }

    #[tokio::test]
    async fn test_reconnect_marks_connected_before_health_confirmed() {
        let (transport, manager) = connected().await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        manager.set_state_change_callback(move |old, new| sink.lock().push((old, new)));
        transport.set_default_status(ServerState::Suspended);

        assert!(!manager.check_status(true).await);
        assert_eq!(
            *seen.lock(),
            vec![
                (ConnectionState::Connected, ConnectionState::Disconnected),
                (ConnectionState::Disconnected, ConnectionState::Connecting),
                (ConnectionState::Connecting, ConnectionState::Connected),
                (ConnectionState::Connected, ConnectionState::Disconnected),
            ]
        );
    }

    #[tokio::test]
    async fn test_check_status_stopped_and_no_retry() {
        let manager = ConnectionManager::new(mock(), ManagerOptions::immediate());
        assert!(!manager.check_status(true).await);

        let transport = mock();
        transport.fail_open(true);
        let manager = ConnectionManager::new(transport.clone(), ManagerOptions::immediate());
        let _ = manager.connect(device()).await;
        assert!(!manager.check_status(false).await);
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test]
    async fn test_recovery_from_failed_connect() {
        let transport = mock();
        transport.fail_open(true);
        let manager = ConnectionManager::new(transport.clone(), ManagerOptions::immediate());
        assert!(manager.connect(device()).await.is_err());

        transport.fail_open(false);
        assert!(manager.check_status(true).await);
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(manager.registry().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_reconnect_stays_disconnected() {
        let (transport, manager) = connected().await;
        transport.script_status([ServerState::Suspended]);
        transport.fail_open(true);

        assert!(!manager.check_status(true).await);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_waits_between_polls() {
        let transport = mock();
        let options = ManagerOptions::immediate()
            .with_retry_delay(Duration::from_secs(1))
            .with_health_attempts(5);
        let manager = ConnectionManager::new(transport.clone(), options);
        manager.connect(device()).await.unwrap();
        transport.set_default_status(ServerState::Suspended);

        let start = tokio::time::Instant::now();
        assert!(!manager.check_status(true).await);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_reconnect_noop_when_connected_or_stopped() {
        let (transport, manager) = connected().await;
        manager.reconnect().await.unwrap();
        assert_eq!(transport.open_count(), 1);

        let stopped = ConnectionManager::new(mock(), ManagerOptions::immediate());
        stopped.reconnect().await.unwrap();
        assert_eq!(stopped.state(), ConnectionState::Stopped);
    }

    #[tokio::test]
    async fn test_subscription_survives_reconnect() {
        let (transport, manager) = connected().await;
        let (handler, mut rx) = ChannelHandler::with_channel();
        manager.set_handler(Arc::new(handler));

        assert_eq!(manager.subscribe().await.unwrap(), 1);
        assert_eq!(transport.active_groups().len(), 1);

        transport.script_status([ServerState::Suspended]);
        assert!(manager.check_status(true).await);
        assert_eq!(transport.active_groups().len(), 1);

        let entry = transport.change("Int4", NativeValue::I4(7)).unwrap();
        assert_eq!(transport.notify(vec![entry]), 1);

        let change: TagChange = rx.try_recv().unwrap();
        assert_eq!(change.id, TagId(1));
        assert_eq!(change.value.bytes, 7i32.to_ne_bytes().to_vec());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let (transport, manager) = connected().await;
        manager.subscribe().await.unwrap();
        manager.unsubscribe().await.unwrap();

        assert!(transport.active_groups().is_empty());
        assert!(!manager.is_delivery_enabled());
    }

    #[tokio::test]
    async fn test_close() {
        let (transport, manager) = connected().await;
        let (handler, _rx) = ChannelHandler::with_channel();
        manager.set_handler(Arc::new(handler));
        manager.subscribe().await.unwrap();

        manager.close().await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Stopped);
        assert!(manager.registry().is_empty());
        assert!(!manager.dispatcher().has_handler());
        assert!(transport.active_groups().is_empty());
        assert_eq!(transport.shutdown_count(), 1);

        manager.close().await.unwrap();
        assert_eq!(transport.shutdown_count(), 1);
        assert!(!manager.check_status(true).await);
    }

    #[tokio::test]
    async fn test_state_change_callback() {
        let transport = mock();
        let manager = ConnectionManager::new(transport, ManagerOptions::immediate());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        manager.set_state_change_callback(move |old, new| sink.lock().push((old, new)));

        manager.connect(device()).await.unwrap();
        manager.close().await.unwrap();

        assert!(seen.lock()[0].1.is_connecting());
        assert_eq!(
            *seen.lock(),
            vec![
                (ConnectionState::Stopped, ConnectionState::Connecting),
                (ConnectionState::Connecting, ConnectionState::Connected),
                (ConnectionState::Connected, ConnectionState::Stopped),
            ]
        );
    }

    #[test]
    fn test_options_serde() {
        let options: ManagerOptions =
            serde_json::from_str(r#"{"retry_delay": 250, "health_attempts": 3}"#).unwrap();
        assert_eq!(options.retry_delay, Duration::from_millis(250));
        assert_eq!(options.settle_delay, Duration::from_secs(1));
        assert_eq!(options.health_attempts, 3);
        assert_eq!(ManagerOptions::immediate().health_attempts, 5);
    }

    #[test]
    fn test_clamp_deadband() {
        assert_eq!(clamp_deadband(-5.0, "g"), 0.0);
        assert_eq!(clamp_deadband(50.0, "g"), 50.0);
    }
}
