// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # tagbridge-config
//!
//! Device document handling for tagbridge.
//!
//! A device document names one automation server and the groups of tags to
//! provision on it:
//!
//! ```json
//! {
//!   "Host": "localhost",
//!   "Server": "Matrikon.OPC.Simulation.1",
//!   "Groups": [
//!     {
//!       "Group": "fast",
//!       "UpdateRate": 500,
//!       "DeadZone": 0.0,
//!       "IsSubscribe": true,
//!       "Variables": [ { "Id": 1, "Name": "Random.Int4" } ]
//!     }
//!   ]
//! }
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use tagbridge_config::load_config;
//!
//! let config = load_config("device.json").unwrap();
//! println!("Server: {}", config.server);
//! println!("Tags: {}", config.tag_count());
//! ```
//!
//! ## Defaults
//!
//! - `Host`: `"localhost"` when absent, null or empty
//! - `UpdateRate`: 1000 ms when absent; values below 100 ms are raised to 100
//! - `DeadZone`: 0.0
//! - `IsSubscribe`: false

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod loader;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str, ConfigLoader};
pub use schema::{
    DeviceConfig, GroupConfig, TagConfig, DEFAULT_DEADBAND, DEFAULT_HOST,
    DEFAULT_UPDATE_RATE_MS, MIN_UPDATE_RATE_MS,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name() {
        assert_eq!(NAME, "tagbridge-config");
    }
}
