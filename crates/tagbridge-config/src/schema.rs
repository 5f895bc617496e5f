// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Device document schema.
//!
//! The on-disk document uses the automation server's field names
//! (`Host`, `Server`, `Groups`, `Group`, `UpdateRate`, `DeadZone`,
//! `IsSubscribe`, `Variables`, `Id`, `Name`). It is deserialized into the
//! raw form below, where every optional field may be absent or `null`, and
//! then normalized into [`DeviceConfig`] with defaults and clamping applied.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tagbridge_core::TagId;

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Defaults
// =============================================================================

/// Host used when the document leaves `Host` empty.
pub const DEFAULT_HOST: &str = "localhost";

/// Update rate used when a group omits `UpdateRate`.
pub const DEFAULT_UPDATE_RATE_MS: u32 = 1000;

/// Lowest update rate accepted; smaller values are raised to this.
pub const MIN_UPDATE_RATE_MS: u32 = 100;

/// Deadband used when a group omits `DeadZone`.
pub const DEFAULT_DEADBAND: f32 = 0.0;

// =============================================================================
// DeviceConfig
// =============================================================================

/// Normalized device document: one server and its groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceConfig {
    /// Host running the automation server.
    pub host: String,

    /// Server program id.
    pub server: String,

    /// Groups in declaration order.
    pub groups: Vec<GroupConfig>,
}

impl DeviceConfig {
    /// Creates a configuration for `server` on the default host.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            server: server.into(),
            groups: Vec::new(),
        }
    }

    /// Sets the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Appends a group.
    pub fn with_group(mut self, group: GroupConfig) -> Self {
        self.groups.push(group);
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.trim().is_empty() {
            return Err(ConfigError::validation("Server", "cannot be empty"));
        }

        // Tag ids key the registry, so they must be unique across groups.
        let mut seen: HashMap<TagId, &str> = HashMap::new();
        for (index, group) in self.groups.iter().enumerate() {
            group.validate(index)?;
            for tag in &group.tags {
                if let Some(first_group) = seen.insert(tag.id, group.name.as_str()) {
                    return Err(ConfigError::DuplicateTagId {
                        tag_id: tag.id,
                        first_group: first_group.to_string(),
                        group: group.name.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Returns the total number of tags.
    pub fn tag_count(&self) -> usize {
        self.groups.iter().map(|g| g.tags.len()).sum()
    }

    /// Returns the groups marked for subscription.
    pub fn subscribed_groups(&self) -> impl Iterator<Item = &GroupConfig> {
        self.groups.iter().filter(|g| g.subscribe)
    }

    /// Finds a tag and its group by id.
    pub fn find_tag(&self, id: TagId) -> Option<(&GroupConfig, &TagConfig)> {
        self.groups
            .iter()
            .find_map(|g| g.tags.iter().find(|t| t.id == id).map(|t| (g, t)))
    }
}

// =============================================================================
// GroupConfig
// =============================================================================

/// A server-side group of tags sharing an update rate and deadband.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupConfig {
    /// Group name.
    pub name: String,

    /// Requested update rate in milliseconds.
    pub update_rate_ms: u32,

    /// Percent deadband.
    pub deadband: f32,

    /// Enable asynchronous change delivery for this group.
    pub subscribe: bool,

    /// Tags in declaration order.
    pub tags: Vec<TagConfig>,
}

impl GroupConfig {
    /// Creates a group with default rate and deadband.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            update_rate_ms: DEFAULT_UPDATE_RATE_MS,
            deadband: DEFAULT_DEADBAND,
            subscribe: false,
            tags: Vec::new(),
        }
    }

    /// Sets the update rate (not clamped; see [`effective_update_rate`](Self::effective_update_rate)).
    pub fn update_rate(mut self, ms: u32) -> Self {
        self.update_rate_ms = ms;
        self
    }

    /// Sets the deadband.
    pub fn deadband(mut self, deadband: f32) -> Self {
        self.deadband = deadband;
        self
    }

    /// Marks the group for subscription.
    pub fn subscribe(mut self, enabled: bool) -> Self {
        self.subscribe = enabled;
        self
    }

    /// Appends a tag.
    pub fn tag(mut self, id: i32, name: impl Into<String>) -> Self {
        self.tags.push(TagConfig::new(id, name));
        self
    }

    /// Update rate with the minimum applied.
    #[inline]
    pub fn effective_update_rate(&self) -> u32 {
        self.update_rate_ms.max(MIN_UPDATE_RATE_MS)
    }

    /// Returns the tag names in declaration order.
    pub fn tag_names(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.name.clone()).collect()
    }

    fn validate(&self, index: usize) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::validation(
                format!("Groups[{index}].Group"),
                "cannot be empty",
            ));
        }
        for (tag_index, tag) in self.tags.iter().enumerate() {
            if tag.name.trim().is_empty() {
                return Err(ConfigError::validation(
                    format!("Groups[{index}].Variables[{tag_index}].Name"),
                    "cannot be empty",
                ));
            }
        }
        Ok(())
    }
}

// =============================================================================
// TagConfig
// =============================================================================

/// A tag declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagConfig {
    /// External numeric id used by callers.
    pub id: TagId,

    /// Item name on the server.
    pub name: String,
}

impl TagConfig {
    /// Creates a tag declaration.
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id: TagId(id),
            name: name.into(),
        }
    }
}

// =============================================================================
// Raw Document
// =============================================================================

/// Document as written on disk, before defaults are applied.
#[derive(Debug, Deserialize)]
pub(crate) struct RawDocument {
    #[serde(rename = "Host", default)]
    host: Option<String>,

    #[serde(rename = "Server", default)]
    server: Option<String>,

    #[serde(rename = "Groups", default)]
    groups: Option<Vec<RawGroup>>,
}

#[derive(Debug, Deserialize)]
struct RawGroup {
    #[serde(rename = "Group", default)]
    name: Option<String>,

    #[serde(rename = "UpdateRate", default)]
    update_rate: Option<u32>,

    #[serde(rename = "DeadZone", default)]
    dead_zone: Option<f32>,

    #[serde(rename = "IsSubscribe", default)]
    is_subscribe: Option<bool>,

    #[serde(rename = "Variables", default)]
    variables: Option<Vec<RawVariable>>,
}

#[derive(Debug, Deserialize)]
struct RawVariable {
    #[serde(rename = "Id")]
    id: i32,

    #[serde(rename = "Name", default)]
    name: Option<String>,
}

impl RawDocument {
    /// Applies defaults and clamping.
    pub(crate) fn normalize(self) -> ConfigResult<DeviceConfig> {
        let host = self
            .host
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let server = self.server.ok_or_else(|| ConfigError::missing_field("Server"))?;
        let raw_groups = self.groups.ok_or_else(|| ConfigError::missing_field("Groups"))?;

        let mut groups = Vec::with_capacity(raw_groups.len());
        for (index, raw) in raw_groups.into_iter().enumerate() {
            groups.push(raw.normalize(index)?);
        }

        Ok(DeviceConfig {
            host,
            server,
            groups,
        })
    }
}

impl RawGroup {
    fn normalize(self, index: usize) -> ConfigResult<GroupConfig> {
        let name = self
            .name
            .ok_or_else(|| ConfigError::missing_field(format!("Groups[{index}].Group")))?;
        let variables = self
            .variables
            .ok_or_else(|| ConfigError::missing_field(format!("Groups[{index}].Variables")))?;

        let mut tags = Vec::with_capacity(variables.len());
        for (tag_index, variable) in variables.into_iter().enumerate() {
            let tag_name = variable.name.ok_or_else(|| {
                ConfigError::missing_field(format!("Groups[{index}].Variables[{tag_index}].Name"))
            })?;
            tags.push(TagConfig {
                id: TagId(variable.id),
                name: tag_name,
            });
        }

        let update_rate_ms = self
            .update_rate
            .unwrap_or(DEFAULT_UPDATE_RATE_MS)
            .max(MIN_UPDATE_RATE_MS);

        Ok(GroupConfig {
            name,
            update_rate_ms,
            deadband: self.dead_zone.unwrap_or(DEFAULT_DEADBAND),
            subscribe: self.is_subscribe.unwrap_or(false),
            tags,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> ConfigResult<DeviceConfig> {
        let doc: RawDocument = serde_json::from_str(json).unwrap();
        doc.normalize()
    }

    #[test]
    fn test_defaults_applied() {
        let config = raw(
            r#"{"Server": "Matrikon.OPC.Simulation.1",
                "Groups": [{"Group": "g1", "Variables": [{"Id": 1, "Name": "Random.Int4"}]}]}"#,
        )
        .unwrap();

        assert_eq!(config.host, "localhost");
        let group = &config.groups[0];
        assert_eq!(group.update_rate_ms, 1000);
        assert_eq!(group.deadband, 0.0);
        assert!(!group.subscribe);
        assert_eq!(group.tags[0], TagConfig::new(1, "Random.Int4"));
    }

    #[test]
    fn test_nulls_treated_as_absent() {
        let config = raw(
            r#"{"Host": null, "Server": "S",
                "Groups": [{"Group": "g", "UpdateRate": null, "DeadZone": null,
                            "IsSubscribe": null, "Variables": []}]}"#,
        )
        .unwrap();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.groups[0].update_rate_ms, 1000);
        assert!(!config.groups[0].subscribe);
    }

    #[test]
    fn test_update_rate_clamped() {
        let config = raw(
            r#"{"Server": "S", "Groups": [{"Group": "g", "UpdateRate": 50, "Variables": []}]}"#,
        )
        .unwrap();
        assert_eq!(config.groups[0].update_rate_ms, 100);
    }

    #[test]
    fn test_missing_server() {
        let err = raw(r#"{"Groups": []}"#).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { ref field } if field == "Server"));
    }

    #[test]
    fn test_missing_variable_name() {
        let err = raw(
            r#"{"Server": "S", "Groups": [{"Group": "g", "Variables": [{"Id": 3}]}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Variables[0].Name"));
    }

    #[test]
    fn test_validate_rejects_empty_names() {
        let config = DeviceConfig::new("S").with_group(GroupConfig::new("").tag(1, "a"));
        assert!(config.validate().is_err());

        let config = DeviceConfig::new("S").with_group(GroupConfig::new("g").tag(1, " "));
        assert!(config.validate().is_err());

        let config = DeviceConfig::new("").with_group(GroupConfig::new("g").tag(1, "a"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let config = DeviceConfig::new("S")
            .with_group(GroupConfig::new("fast").tag(1, "a"))
            .with_group(GroupConfig::new("slow").tag(1, "b"));

        match config.validate().unwrap_err() {
            ConfigError::DuplicateTagId {
                tag_id,
                first_group,
                group,
            } => {
                assert_eq!(tag_id, TagId(1));
                assert_eq!(first_group, "fast");
                assert_eq!(group, "slow");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_builders_and_queries() {
        let config = DeviceConfig::new("S")
            .with_host("plc-host")
            .with_group(
                GroupConfig::new("a")
                    .update_rate(20)
                    .subscribe(true)
                    .tag(1, "x"),
            )
            .with_group(GroupConfig::new("b").tag(2, "y").tag(3, "z"));

        assert!(config.validate().is_ok());
        assert_eq!(config.tag_count(), 3);
        assert_eq!(config.subscribed_groups().count(), 1);
        assert_eq!(config.groups[0].effective_update_rate(), 100);
        assert_eq!(config.groups[1].tag_names(), vec!["y", "z"]);

        let (group, tag) = config.find_tag(TagId(3)).unwrap();
        assert_eq!(group.name, "b");
        assert_eq!(tag.name, "z");
        assert!(config.find_tag(TagId(9)).is_none());
    }
}
