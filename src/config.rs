//! Engine Configuration
//!
//! Settings shared by every run an engine starts. Loaded from a YAML file,
//! from `FLOWRUNNER_*` environment variables, or left at defaults.
//!
//! # Example YAML Format
//!
//! ```yaml
//! http_timeout_secs: 30
//! smtp:
//!   host: smtp.example.com
//!   port: 587
//! branching: tagged
//! honor_retries: true
//! honor_run_timeout: true
//! ```

use std::env;
use std::fs;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How the engine treats outgoing edges of `if` nodes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BranchingMode {
    /// Edges tagged `true`/`false` are followed only when they match the
    /// condition result; untagged edges are always followed.
    #[default]
    Tagged,
    /// Every outgoing edge is followed regardless of the condition.
    Unconditional,
}

/// SMTP defaults used when an email node leaves them unset.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SmtpDefaults {
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
}

impl SmtpDefaults {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SmtpDefaults {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            timeout_secs: 30,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Timeout applied to every outbound HTTP request
    pub http_timeout_secs: u64,

    pub smtp: SmtpDefaults,

    pub branching: BranchingMode,

    /// Apply the workflow's retry count and delay to failing steps
    pub honor_retries: bool,

    /// Apply the workflow's max timeout to the whole traversal
    pub honor_run_timeout: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: 30,
            smtp: SmtpDefaults::default(),
            branching: BranchingMode::default(),
            honor_retries: true,
            honor_run_timeout: true,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a YAML file. Missing keys take defaults.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        info!("Loading engine config from: {}", path);

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        // An empty file deserializes to unit, not a mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Defaults overlaid with `FLOWRUNNER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides(|key| env::var(key).ok())
    }

    /// Applies overrides from a variable lookup.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("FLOWRUNNER_HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = parse_value("FLOWRUNNER_HTTP_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = lookup("FLOWRUNNER_SMTP_HOST") {
            if !value.trim().is_empty() {
                self.smtp.host = value.trim().to_string();
            }
        }
        if let Some(value) = lookup("FLOWRUNNER_SMTP_PORT") {
            self.smtp.port = parse_value("FLOWRUNNER_SMTP_PORT", &value)?;
        }

        debug!("Effective engine config: {:?}", self);
        Ok(self)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
