// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # tagbridge-bin
//!
//! Command-line tools for tagbridge device documents.
//!
//! ## Usage
//!
//! ```bash
//! # Check a device document
//! tagbridge -c device.json validate
//!
//! # Print the tag table and the group requests a connect would send
//! tagbridge -c device.json inspect --format json
//!
//! # Show version
//! tagbridge version
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
