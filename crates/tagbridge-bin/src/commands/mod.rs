// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.

mod inspect;
mod validate;
mod version;

pub use inspect::{inspect, plan, GroupPlan};
pub use validate::{check, validate, ValidationReport};
pub use version::version;

use crate::cli::{Cli, Commands};
use crate::error::BinResult;

/// Executes the appropriate command based on CLI arguments.
pub fn execute(cli: &Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Validate(args) => validate::validate(cli, args),
        Commands::Inspect(args) => inspect::inspect(cli, args),
        Commands::Version => version::version(cli),
    }
}
