// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use serde::Serialize;
use tagbridge_config::{ConfigLoader, DeviceConfig, MIN_UPDATE_RATE_MS};
use tagbridge_da::MAX_DEADBAND;

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Outcome of checking a loaded document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Number of groups.
    pub groups: usize,
    /// Number of tags across all groups.
    pub tags: usize,
    /// Number of groups marked for subscription.
    pub subscribed_groups: usize,
    /// Findings that do not stop a connect.
    pub warnings: Vec<String>,
}

/// Collects warnings for a document that already passed schema validation.
pub fn check(config: &DeviceConfig) -> ValidationReport {
    let mut warnings = Vec::new();

    if config.groups.is_empty() {
        warnings.push("No groups configured".to_string());
    }

    for group in &config.groups {
        if group.tags.is_empty() {
            warnings.push(format!("Group '{}' has no variables", group.name));
        }
        if group.update_rate_ms < MIN_UPDATE_RATE_MS {
            warnings.push(format!(
                "Group '{}' update rate {} ms is raised to {} ms",
                group.name, group.update_rate_ms, MIN_UPDATE_RATE_MS
            ));
        }
        if group.deadband.is_nan() || !(0.0..=MAX_DEADBAND).contains(&group.deadband) {
            warnings.push(format!(
                "Group '{}' deadband {} is outside 0..={}",
                group.name, group.deadband, MAX_DEADBAND
            ));
        }
    }

    ValidationReport {
        groups: config.groups.len(),
        tags: config.tag_count(),
        subscribed_groups: config.subscribed_groups().count(),
        warnings,
    }
}

/// Executes the `validate` command.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;

    let config = ConfigLoader::new()
        .with_env_overrides(!args.no_env)
        .load(config_path)
        .map_err(|e| BinError::from(e).with_context("Device document validation failed"))?;

    let report = check(&config);
    tracing::debug!(warnings = report.warnings.len(), "Document checked");

    match args.format {
        OutputFormat::Text => {
            println!("✓ Device document is valid: {}", config_path.display());
            println!();
            println!("Summary:");
            println!("  Host:      {}", config.host);
            println!("  Server:    {}", config.server);
            println!("  Groups:    {} ({} subscribed)", report.groups, report.subscribed_groups);
            println!("  Tags:      {}", report.tags);

            if !report.warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &report.warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Normalized document:");
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "host": config.host,
                "server": config.server,
                "report": report,
                "config": if args.show_config { Some(&config) } else { None },
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    if args.strict && !report.warnings.is_empty() {
        return Err(BinError::config(format!(
            "Strict mode: {} warning(s) found",
            report.warnings.len()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tagbridge_config::GroupConfig;

    fn cli_for(path: &std::path::Path) -> Cli {
        use clap::Parser;
        Cli::parse_from(["tagbridge", "-c", path.to_str().unwrap(), "validate"])
    }

    #[test]
    fn test_check_clean_document() {
        let config = DeviceConfig::new("Sim.Server")
            .with_group(GroupConfig::new("fast").subscribe(true).tag(1, "A"));

        let report = check(&config);
        assert!(report.warnings.is_empty());
        assert_eq!(report.tags, 1);
        assert_eq!(report.subscribed_groups, 1);
    }

    #[test]
    fn test_check_warnings() {
        let config = DeviceConfig::new("Sim.Server")
            .with_group(GroupConfig::new("empty"))
            .with_group(
                GroupConfig::new("odd")
                    .update_rate(20)
                    .deadband(150.0)
                    .tag(1, "A"),
            );

        let report = check(&config);
        assert_eq!(report.warnings.len(), 3);
        assert!(report.warnings[1].contains("raised to 100"));
        assert!(report.warnings[2].contains("deadband"));
    }

    #[test]
    fn test_validate_strict() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"Server": "Sim", "Groups": []}"#).unwrap();

        let cli = cli_for(file.path());
        let args = ValidateArgs {
            no_env: true,
            ..Default::default()
        };
        assert!(validate(&cli, args.clone()).is_ok());

        let strict = ValidateArgs { strict: true, ..args };
        assert!(validate(&cli, strict).is_err());
    }

    #[test]
    fn test_validate_missing_file() {
        let cli = cli_for(std::path::Path::new("/nonexistent/device.json"));
        let err = validate(
            &cli,
            ValidateArgs {
                no_env: true,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }
}
