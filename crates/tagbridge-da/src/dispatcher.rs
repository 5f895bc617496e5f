// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Delivery of asynchronous change notifications to the caller.
//!
//! Each [`ChangeBatch`] from the library is translated entry by entry:
//! the item handle is resolved to a tag id through the shared
//! [`TagRegistry`], the value is encoded, and the registered
//! [`ChangeHandler`] is invoked once per resolved entry, in batch order.
//! Entries whose handle is not registered are skipped.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tagbridge_core::TagId;
use tokio::sync::mpsc;

use crate::codec::TagValue;
use crate::registry::TagRegistry;
use crate::transport::{ChangeBatch, NotificationSink};

// =============================================================================
// TagChange / ChangeHandler
// =============================================================================

/// One resolved change handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagChange {
    /// Caller-side tag id.
    pub id: TagId,
    /// Encoded value, timestamp, status and quality.
    pub value: TagValue,
}

/// Caller callback for value changes.
///
/// Runs on the library's notification context; implementations must not
/// block for long.
pub trait ChangeHandler: Send + Sync {
    /// Called once per changed tag.
    fn on_change(&self, change: TagChange);
}

impl<F> ChangeHandler for F
where
    F: Fn(TagChange) + Send + Sync,
{
    fn on_change(&self, change: TagChange) {
        self(change)
    }
}

/// Forwards changes into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    sender: mpsc::UnboundedSender<TagChange>,
}

impl ChannelHandler {
    /// Creates a handler around an existing sender.
    pub fn new(sender: mpsc::UnboundedSender<TagChange>) -> Self {
        Self { sender }
    }

    /// Creates a handler and its receiving end.
    pub fn with_channel() -> (Self, mpsc::UnboundedReceiver<TagChange>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl ChangeHandler for ChannelHandler {
    fn on_change(&self, change: TagChange) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.sender.send(change);
    }
}

// =============================================================================
// SubscriptionDispatcher
// =============================================================================

/// Translates library notifications into caller changes.
pub struct SubscriptionDispatcher {
    registry: Arc<TagRegistry>,
    handler: RwLock<Option<Arc<dyn ChangeHandler>>>,
    stats: DispatchStats,
}

impl SubscriptionDispatcher {
    /// Creates a dispatcher resolving handles through `registry`.
    pub fn new(registry: Arc<TagRegistry>) -> Self {
        Self {
            registry,
            handler: RwLock::new(None),
            stats: DispatchStats::new(),
        }
    }

    /// Installs the caller callback, replacing any previous one.
    pub fn set_handler(&self, handler: Arc<dyn ChangeHandler>) {
        *self.handler.write() = Some(handler);
    }

    /// Removes the caller callback.
    pub fn clear_handler(&self) {
        *self.handler.write() = None;
    }

    /// Returns `true` if a callback is installed.
    pub fn has_handler(&self) -> bool {
        self.handler.read().is_some()
    }

    /// Returns dispatch counters.
    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Delivers one batch.
    ///
    /// Without an installed callback the batch is counted and dropped.
    pub fn dispatch(&self, batch: &ChangeBatch) {
        self.stats.batches.fetch_add(1, Ordering::Relaxed);

        // Clone out so the callback never runs under our lock.
        let handler = self.handler.read().clone();
        let Some(handler) = handler else {
            tracing::trace!(entries = batch.len(), "No change handler installed, batch dropped");
            return;
        };

        for entry in &batch.entries {
            let Some(id) = self.registry.lookup_id(entry.handle) else {
                self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(handle = %entry.handle, "Change for unregistered item skipped");
                continue;
            };

            let value =
                TagValue::from_server(&entry.value, entry.quality, entry.error, entry.timestamp);
            if entry.error < 0 {
                self.stats.server_errors.fetch_add(1, Ordering::Relaxed);
            } else if !value.ok {
                self.stats.encode_failures.fetch_add(1, Ordering::Relaxed);
            }

            handler.on_change(TagChange { id, value });
            self.stats.delivered.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl NotificationSink for SubscriptionDispatcher {
    fn on_data_change(&self, batch: &ChangeBatch) {
        self.dispatch(batch);
    }
}

impl fmt::Debug for SubscriptionDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionDispatcher")
            .field("registered", &self.registry.len())
            .field("has_handler", &self.has_handler())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Counters for change delivery.
#[derive(Debug, Default)]
pub struct DispatchStats {
    batches: AtomicU64,
    delivered: AtomicU64,
    skipped: AtomicU64,
    server_errors: AtomicU64,
    encode_failures: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DispatchSnapshot {
    /// Batches received.
    pub batches: u64,
    /// Changes handed to the callback.
    pub delivered: u64,
    /// Entries dropped for unregistered handles.
    pub skipped: u64,
    /// Delivered changes carrying a server error.
    pub server_errors: u64,
    /// Delivered changes whose value could not be encoded.
    pub encode_failures: u64,
}

impl DispatchStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns changes handed to the callback.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Returns entries dropped for unregistered handles.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Copies all counters.
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            batches: self.batches.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            server_errors: self.server_errors.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
        }
    }

    /// Resets all counters.
    pub fn reset(&self) {
        self.batches.store(0, Ordering::Relaxed);
        self.delivered.store(0, Ordering::Relaxed);
        self.skipped.store(0, Ordering::Relaxed);
        self.server_errors.store(0, Ordering::Relaxed);
        self.encode_failures.store(0, Ordering::Relaxed);
    }
}
