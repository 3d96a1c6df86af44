//! User configuration loaded from TOML.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Device used when neither an argument nor `BLU_DEVICE` names one.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_device: String,
    /// Short names mapped to device ids or addresses.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

impl Config {
    /// Expand `name` through [`Config::aliases`], or return it unchanged.
    pub fn resolve_alias<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map_or(name, String::as_str)
    }
}

/// Discovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Deadline for one discovery run, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Write the discovery cache after `blu devices`.
    #[serde(default = "default_true")]
    pub write_cache: bool,
}

impl DiscoveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            write_cache: true,
        }
    }
}

fn default_timeout_secs() -> u64 {
    4
}

fn default_true() -> bool {
    true
}
