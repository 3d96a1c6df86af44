//! Configuration and persisted state for blucli.
//!
//! - [`Config`]: user settings (default device, aliases, discovery timeout)
//!   from `config.toml`, or from the `config.json` older releases wrote.
//! - [`DiscoveryCache`]: the last discovery result, stored as JSON so later
//!   invocations can resolve devices without touching the network.
//! - [`setup`]: platform paths and config loading.

pub mod cache;
pub mod config;
pub mod error;
pub mod setup;

pub use cache::{match_by_name, normalize_name, DiscoveryCache};
pub use config::{Config, DiscoveryConfig};
pub use error::ConfigError;
