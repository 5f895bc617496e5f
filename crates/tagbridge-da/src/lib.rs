// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Tag session manager for tag-based automation servers.
//!
//! This crate keeps one session with a remote automation server and turns
//! its items into caller-facing tags identified by integer ids.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────────┐
//!   read/write ──▶│    ConnectionManager     │──▶ DaTransport (library)
//!                 │  state, provisioning,    │        │
//!                 │  health supervision      │        │ notifications
//!                 └────────────┬─────────────┘        ▼
//!                              │            ┌────────────────────────┐
//!                              ▼            │ SubscriptionDispatcher │──▶ ChangeHandler
//!                     ┌─────────────────┐   └───────────┬────────────┘
//!                     │   TagRegistry   │◀──────────────┘
//!                     │  id ⇄ handle    │   handle → id
//!                     └─────────────────┘
//!
//!   codec: NativeValue ⇄ bytes, FileTime → ticks since 1970
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tagbridge_da::{ConnectionManager, DataSource, ManagerOptions};
//!
//! let manager = ConnectionManager::new(Arc::new(transport), ManagerOptions::default());
//! manager.connect(tagbridge_config::load_config("device.json")?).await?;
//!
//! let value = manager.read(1.into(), DataSource::Cache).await?;
//! println!("{} bytes at {}", value.len(), value.timestamp);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod codec;
pub mod connection;
pub mod dispatcher;
pub mod registry;
pub mod transport;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export commonly used types
pub use codec::{
    decode, encode, DecimalValue, EncodedValue, FileTime, NativeValue, Quality, QualityStatus,
    TagValue, VarType,
};
pub use connection::{
    group_request, ConnectionManager, ConnectionSnapshot, ConnectionState, ConnectionStats,
    ManagerOptions, ProvisionedGroup, MAX_DEADBAND,
};
pub use dispatcher::{
    ChangeHandler, ChannelHandler, DispatchSnapshot, DispatchStats, SubscriptionDispatcher,
    TagChange,
};
pub use registry::{ItemEntry, TagRegistry};
pub use transport::{
    ChangeBatch, ChangeEntry, DaTransport, DataSource, GroupHandle, GroupInfo, GroupRequest,
    ItemHandle, ItemInfo, ItemResult, ItemState, NotificationSink, ServerState,
};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockTransport;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
