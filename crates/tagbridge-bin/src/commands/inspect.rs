// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `inspect` command.

use serde::Serialize;
use tagbridge_config::{ConfigLoader, DeviceConfig, TagConfig};
use tagbridge_da::{group_request, GroupRequest};

use crate::cli::{Cli, InspectArgs, OutputFormat};
use crate::error::{BinError, BinResult};

/// What a connect would provision for one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupPlan {
    /// Request sent to the server.
    pub request: GroupRequest,
    /// Whether delivery is enabled for the group on Subscribe.
    pub subscribe: bool,
    /// Tags added to the group.
    pub tags: Vec<TagConfig>,
}

/// Builds the provisioning plan, optionally limited to one group.
pub fn plan(config: &DeviceConfig, only: Option<&str>) -> Vec<GroupPlan> {
    config
        .groups
        .iter()
        .filter(|g| only.map_or(true, |name| g.name == name))
        .map(|g| GroupPlan {
            request: group_request(g),
            subscribe: g.subscribe,
            tags: g.tags.clone(),
        })
        .collect()
}

/// Executes the `inspect` command.
pub fn inspect(cli: &Cli, args: InspectArgs) -> BinResult<()> {
    let config = ConfigLoader::new().load(&cli.config)?;
    let groups = plan(&config, args.group.as_deref());

    if let Some(name) = &args.group {
        if groups.is_empty() {
            return Err(BinError::config(format!("No group named '{name}'")));
        }
    }

    match args.format {
        OutputFormat::Text => {
            println!("{} on {}", config.server, config.host);
            for group in &groups {
                let request = &group.request;
                println!();
                println!(
                    "[{}] rate={}ms deadband={}%{}",
                    request.name,
                    request.update_rate_ms,
                    request.deadband,
                    if group.subscribe { " subscribe" } else { "" }
                );
                for tag in &group.tags {
                    println!("  {:>6}  {}", tag.id, tag.name);
                }
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "host": config.host,
                "server": config.server,
                "groups": groups,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
