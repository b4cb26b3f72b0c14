//! Configuration for the agent loop and its source connections
//!
//! Configuration is a TOML file with one `[agent]` section and one
//! `[sources.<name>]` section per remote source. Source names become the
//! namespace prefix in qualified function names, so they are restricted to
//! characters that cannot collide with the `<source>.<operation>` split.

use crate::registry::SourceBinding;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchTowerConfig {
    #[serde(default)]
    pub agent: AgentSection,
    /// Sources keyed by registry name, in name order.
    #[serde(default)]
    pub sources: BTreeMap<String, SourceSection>,
}

/// `[agent]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSection {
    /// Iteration budget for one analysis run.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_max_iterations() -> u32 {
    10
}

/// One `[sources.<name>]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceSection {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    /// Opaque credential blob forwarded verbatim on `initialize`.
    #[serde(default)]
    pub credentials: HashMap<String, String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid source name: {0}")]
    InvalidSourceName(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Default for WatchTowerConfig {
    fn default() -> Self {
        Self {
            agent: AgentSection::default(),
            sources: BTreeMap::new(),
        }
    }
}

impl WatchTowerConfig {
    /// Load and validate a configuration file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: WatchTowerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::InvalidConfig(
                "agent.max_iterations must be at least 1".to_string(),
            ));
        }

        for (name, source) in &self.sources {
            validate_source_name(name)?;
            if source.port == 0 {
                return Err(ConfigError::InvalidConfig(format!(
                    "sources.{name}.port must be non-zero"
                )));
            }
        }

        Ok(())
    }

    /// Connection bindings in source-name order.
    pub fn bindings(&self) -> Vec<SourceBinding> {
        self.sources
            .iter()
            .map(|(name, source)| SourceBinding {
                name: name.clone(),
                host: source.host.clone(),
                port: source.port,
                credentials: source.credentials.clone(),
            })
            .collect()
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[agent]
max_iterations = 10

[sources.aws]
host = "127.0.0.1"
port = 7101
credentials = { region = "us-east-1" }

[sources.gcp]
host = "127.0.0.1"
port = 7102
credentials = { project = "demo-project" }
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Source names become namespace prefixes, so a dot would make qualified
/// names ambiguous.
fn validate_source_name(name: &str) -> Result<(), ConfigError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if name.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidSourceName(format!(
            "Source name '{name}' must match pattern [a-zA-Z0-9_-]+"
        )));
    }

    Ok(())
}
