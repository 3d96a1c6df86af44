//! Config loading and platform paths.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::Config;
use crate::error::ConfigError;

const APP_DIR: &str = "blu";
const CONFIG_FILE: &str = "config.toml";
const LEGACY_CONFIG_FILE: &str = "config.json";

/// Load configuration from `path`, or from the per-user config directory.
///
/// A missing file is not an error; defaults are used instead.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => load_toml(path),
        None => load_from_dir(&config_dir()?),
    }
}

/// `config.toml` in `dir`, else a legacy `config.json` written by older
/// releases, else defaults.
fn load_from_dir(dir: &Path) -> Result<Config, ConfigError> {
    let toml_path = dir.join(CONFIG_FILE);
    if toml_path.exists() {
        return load_toml(&toml_path);
    }

    let json_path = dir.join(LEGACY_CONFIG_FILE);
    if json_path.exists() {
        let config: Config = serde_json::from_str(&read(&json_path)?)?;
        info!(path = %json_path.display(), "loaded legacy JSON config");
        return Ok(config);
    }

    debug!(dir = %dir.display(), "no config file found, using defaults");
    Ok(Config::default())
}

fn load_toml(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file found, using defaults");
        return Ok(Config::default());
    }

    let config: Config = toml::from_str(&read(path)?)?;
    info!(path = %path.display(), "loaded config");
    Ok(config)
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Per-user configuration directory, e.g. `~/.config/blu`.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .ok_or(ConfigError::NoDirectory("config"))
}

/// Per-user cache directory, e.g. `~/.cache/blu`.
pub fn cache_dir() -> Result<PathBuf, ConfigError> {
    dirs::cache_dir()
        .map(|dir| dir.join(APP_DIR))
        .ok_or(ConfigError::NoDirectory("cache"))
}

/// Location of the discovery cache.
pub fn cache_path() -> Result<PathBuf, ConfigError> {
    Ok(cache_dir()?.join("discovery.json"))
}
