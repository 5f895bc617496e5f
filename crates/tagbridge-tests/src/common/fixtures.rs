// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Device documents and mock transports that agree with each other: every
//! item named in [`DocumentFixtures::plant`] exists in
//! [`TransportFixtures::plant`].

use std::io::Write;

use tagbridge_config::{ConfigLoader, DeviceConfig};
use tagbridge_da::{MockTransport, NativeValue};
use tempfile::NamedTempFile;

// =============================================================================
// Document Fixtures
// =============================================================================

/// Fixture providing device documents as JSON text.
pub struct DocumentFixtures;

impl DocumentFixtures {
    /// Two groups: `fast` (subscribed, 500 ms) and `slow` (defaults).
    pub fn plant() -> &'static str {
        r#"{
            "Host": "plc-host",
            "Server": "Sim.Server.1",
            "Groups": [
                {
                    "Group": "fast",
                    "UpdateRate": 500,
                    "DeadZone": 0.5,
                    "IsSubscribe": true,
                    "Variables": [
                        { "Id": 1, "Name": "Line.Speed" },
                        { "Id": 2, "Name": "Line.Temperature" },
                        { "Id": 3, "Name": "Line.Running" }
                    ]
                },
                {
                    "Group": "slow",
                    "Variables": [
                        { "Id": 10, "Name": "Batch.Name" },
                        { "Id": 11, "Name": "Batch.Count" }
                    ]
                }
            ]
        }"#
    }

    /// One group holding `Line.Speed` as tag 1, with an optional rate.
    pub fn single_group(update_rate: Option<i64>) -> String {
        let rate = update_rate
            .map(|r| format!(r#""UpdateRate": {r},"#))
            .unwrap_or_default();
        format!(
            r#"{{
                "Server": "Sim.Server.1",
                "Groups": [
                    {{
                        "Group": "only",
                        {rate}
                        "Variables": [ {{ "Id": 1, "Name": "Line.Speed" }} ]
                    }}
                ]
            }}"#
        )
    }

    /// A document naming an item the server does not know.
    pub fn with_unknown_item() -> &'static str {
        r#"{
            "Server": "Sim.Server.1",
            "Groups": [
                {
                    "Group": "mixed",
                    "Variables": [
                        { "Id": 1, "Name": "Line.Speed" },
                        { "Id": 99, "Name": "No.Such.Item" }
                    ]
                }
            ]
        }"#
    }
}

/// Writes `content` to a temporary file.
pub fn write_document(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write document");
    file
}

/// Parses `content` without environment overrides.
pub fn parse_document(content: &str) -> DeviceConfig {
    ConfigLoader::new()
        .with_env_overrides(false)
        .load_from_str(content)
        .expect("Fixture document must be valid")
}

// =============================================================================
// Transport Fixtures
// =============================================================================

/// Fixture providing prepared mock transports.
pub struct TransportFixtures;

impl TransportFixtures {
    /// Speed as I4 42.
    pub const SPEED: i32 = 42;
    /// Temperature as R8 21.5.
    pub const TEMPERATURE: f64 = 21.5;

    /// A server holding every item of [`DocumentFixtures::plant`].
    pub fn plant() -> MockTransport {
        MockTransport::new()
            .with_item("Line.Speed", NativeValue::I4(Self::SPEED))
            .with_item("Line.Temperature", NativeValue::R8(Self::TEMPERATURE))
            .with_item("Line.Running", NativeValue::Bool(true))
            .with_item("Batch.Name", NativeValue::BStr("B-17".to_string()))
            .with_item("Batch.Count", NativeValue::UI2(7))
    }
}
