// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # tagbridge-core
//!
//! Shared building blocks for the tagbridge workspace.
//!
//! - [`error`]: the bridge error taxonomy and how each kind maps to a
//!   gateway [`ResultCode`]
//! - [`types`]: [`TagId`] and [`ResultCode`]
//! - [`retry`]: bounded retry policies used by health supervision

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod retry;
pub mod types;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{
    BridgeError, BridgeResult, CodecError, ErrorCode, ErrorSeverity, OperationError,
    SessionError, TransientError,
};
pub use retry::{FixedDelay, NoRetry, RetryDecision, RetryPolicy};
pub use types::{ResultCode, TagId};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
