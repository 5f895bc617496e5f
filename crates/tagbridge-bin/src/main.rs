// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! tagbridge - device document tooling.

use tagbridge_bin::{commands, error, init_logging, Cli};

fn main() {
    let cli = Cli::parse_args();
    init_logging(cli.effective_log_level(), cli.log_format);

    if let Err(e) = commands::execute(&cli) {
        error::report_error_and_exit(e);
    }
}
