// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Device document loading.
//!
//! # Loading Pipeline
//!
//! 1. Read the file (or take the string as given)
//! 2. Parse JSON into the raw document form
//! 3. Apply defaults and clamp update rates
//! 4. Apply environment variable overrides
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! TAGBRIDGE_HOST=plc-host-02
//! TAGBRIDGE_SERVER=Kepware.KEPServerEX.V6
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{DeviceConfig, RawDocument};

/// Path reported for documents loaded from strings.
const INLINE_SOURCE: &str = "<inline>";

// =============================================================================
// ConfigLoader
// =============================================================================

/// Loader for device documents.
///
/// # Examples
///
/// ```
/// use tagbridge_config::loader::ConfigLoader;
///
/// let loader = ConfigLoader::new().with_env_overrides(false);
/// let config = loader
///     .load_from_str(r#"{"Server": "Demo.Server.1", "Groups": []}"#)
///     .unwrap();
/// assert_eq!(config.host, "localhost");
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Environment variable prefix.
    env_prefix: String,

    /// Whether to apply environment variable overrides.
    env_overrides: bool,
}

impl ConfigLoader {
    /// Creates a loader with default settings.
    pub fn new() -> Self {
        Self {
            env_prefix: "TAGBRIDGE".to_string(),
            env_overrides: true,
        }
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment variable overrides.
    pub fn with_env_overrides(mut self, enabled: bool) -> Self {
        self.env_overrides = enabled;
        self
    }

    /// Loads a device document from a file.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<DeviceConfig> {
        let path = path.as_ref();
        info!("Loading device document from: {}", path.display());

        let content = self.read_file(path)?;
        let config = self.process(&content, path)?;

        info!(
            server = %config.server,
            host = %config.host,
            "Device document loaded"
        );
        debug!(
            "Loaded {} groups with {} total tags",
            config.groups.len(),
            config.tag_count()
        );

        Ok(config)
    }

    /// Loads a device document from a string.
    pub fn load_from_str(&self, content: &str) -> ConfigResult<DeviceConfig> {
        self.process(content, Path::new(INLINE_SOURCE))
    }

    fn read_file(&self, path: &Path) -> ConfigResult<String> {
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
    }

    fn process(&self, content: &str, source: &Path) -> ConfigResult<DeviceConfig> {
        let raw: RawDocument = serde_json::from_str(content).map_err(|e| {
            ConfigError::parse_at_line(PathBuf::from(source), e.to_string(), e.line())
        })?;

        let mut config = raw.normalize()?;

        if self.env_overrides {
            self.apply_env_overrides(&mut config)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&self, config: &mut DeviceConfig) -> ConfigResult<()> {
        if let Some(host) = self.env_var("HOST")? {
            debug!(host = %host, "Host overridden from environment");
            config.host = host;
        }
        if let Some(server) = self.env_var("SERVER")? {
            debug!(server = %server, "Server overridden from environment");
            config.server = server;
        }
        Ok(())
    }

    fn env_var(&self, suffix: &str) -> ConfigResult<Option<String>> {
        let name = format!("{}_{}", self.env_prefix, suffix);
        match env::var(&name) {
            Ok(value) if value.trim().is_empty() => {
                Err(ConfigError::invalid_env_var(name, "cannot be empty"))
            }
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(env::VarError::NotUnicode(_)) => {
                Err(ConfigError::invalid_env_var(name, "not valid unicode"))
            }
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads a device document from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<DeviceConfig> {
    ConfigLoader::new().load(path)
}

/// Loads a device document from a string with default settings.
pub fn load_config_str(content: &str) -> ConfigResult<DeviceConfig> {
    ConfigLoader::new().load_from_str(content)
}

// =============================================================================
// Tests
// =============================================================================
