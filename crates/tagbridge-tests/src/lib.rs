// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # tagbridge Integration Tests
//!
//! Shared fixtures and harnesses for the integration suites.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p tagbridge-tests
//!
//! cargo test -p tagbridge-tests --test integration_codec
//! cargo test -p tagbridge-tests --test integration_config
//! cargo test -p tagbridge-tests --test integration_connection
//! cargo test -p tagbridge-tests --test integration_gateway
//! ```
//!
//! ## Test Categories
//!
//! ### Codec (`integration_codec.rs`)
//! - Encode/decode across every supported wire type
//! - Decimal tolerance, timestamp conversion
//!
//! ### Config (`integration_config.rs`)
//! - On-disk documents, defaults and clamping, rejection cases
//!
//! ### Connection (`integration_connection.rs`)
//! - Provisioning, health supervision, recovery, subscription delivery
//!
//! ### Gateway (`integration_gateway.rs`)
//! - Command table end to end against the mock transport
//!
//! ## Using the Harness
//!
//! ```rust,ignore
//! use tagbridge_tests::common::harness::GatewayHarness;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let mut harness = GatewayHarness::new();
//!     assert_eq!(harness.init().await, ResultCode::Ok);
//!     let (code, slots) = harness.read(&["1"]).await;
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
}
