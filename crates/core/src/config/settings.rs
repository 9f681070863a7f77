// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TOML configuration shared by the daemon and the CLI
//!
//! Every field has a default, so an empty file (or no file at all) is a
//! valid configuration.

use crate::event::{Topic, UnknownTopic};
use crate::events::FilterPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming a config file when `--config` is not given
pub const CONFIG_ENV: &str = "CHATTY_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("policy: {0}")]
    UnknownTopic(#[from] UnknownTopic),
    #[error("reconnect: {0}")]
    Reconnect(String),
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChattyConfig {
    pub bus: BusConfig,
    pub policy: PolicyConfig,
    pub reconnect: ReconnectConfig,
    pub server: ServerConfig,
    pub log: LogConfig,
}

/// Event bus sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Events buffered per subscriber before it is evicted
    pub subscriber_buffer: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 1024,
        }
    }
}

/// Per-topic filtering policy, keyed by topic wire name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub exclude_self: BTreeMap<String, bool>,
}

impl PolicyConfig {
    /// Resolve topic names; unlisted topics keep self-exclusion on
    pub fn filter_policy(&self) -> Result<FilterPolicy, ConfigError> {
        let mut policy = FilterPolicy::default();
        for (name, enabled) in &self.exclude_self {
            let topic: Topic = name.parse()?;
            policy.set_exclude_self(topic, *enabled);
        }
        Ok(policy)
    }
}

/// Client reconnection backoff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    #[serde(with = "humantime_serde")]
    pub initial: Duration,
    #[serde(with = "humantime_serde")]
    pub max: Duration,
    pub multiplier: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(250),
            max: Duration::from_secs(10),
            multiplier: 2,
        }
    }
}

/// Daemon paths and limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Unix socket path; defaults to `<state_dir>/chatty.sock`
    pub socket_path: Option<PathBuf>,
    /// State directory; defaults to the platform state dir
    pub state_dir: Option<PathBuf>,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            state_dir: None,
            request_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ChattyConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from `explicit`, else `$CHATTY_CONFIG`, else defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::from_file(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.policy.filter_policy()?;
        if self.reconnect.initial.is_zero() {
            return Err(ConfigError::Reconnect("initial delay must be positive".into()));
        }
        if self.reconnect.max < self.reconnect.initial {
            return Err(ConfigError::Reconnect(
                "max delay must not be below initial delay".into(),
            ));
        }
        if self.reconnect.multiplier == 0 {
            return Err(ConfigError::Reconnect("multiplier must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
