// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

/// Prints version information for every component.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("tagbridge - tag session tooling for automation servers");
    println!();
    println!("Version Information:");
    println!("  tagbridge-bin:    {}", env!("CARGO_PKG_VERSION"));
    println!("  tagbridge-core:   {}", tagbridge_core::VERSION);
    println!("  tagbridge-config: {}", tagbridge_config::VERSION);
    println!("  tagbridge-da:     {}", tagbridge_da::VERSION);
    println!();
    println!("Build Information:");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
