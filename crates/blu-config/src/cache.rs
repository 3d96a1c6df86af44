//! The persisted result of the last discovery run.

use std::path::Path;

use blu_types::{join_host_port, Device};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Devices seen by the last discovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryCache {
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub devices: Vec<Device>,
}

impl DiscoveryCache {
    /// Build a cache, dropping records without a host or port and filling in
    /// missing ids.
    pub fn new(updated_at: DateTime<Utc>, devices: impl IntoIterator<Item = Device>) -> Self {
        let devices = devices
            .into_iter()
            .filter(Device::is_addressable)
            .map(|mut device| {
                if device.id.is_empty() {
                    device.id = join_host_port(&device.host, device.port);
                }
                device
            })
            .collect();
        Self {
            updated_at,
            devices,
        }
    }

    /// Build a cache from a fresh discovery result. Devices that came back
    /// without a name keep the one `previous` knew for the same id.
    pub fn refreshed(
        updated_at: DateTime<Utc>,
        devices: Vec<Device>,
        previous: &DiscoveryCache,
    ) -> Self {
        let devices = devices.into_iter().map(|mut device| {
            if device.name.is_empty() {
                if let Some(known) = previous.lookup(&device.id) {
                    device.name.clone_from(&known.name);
                }
            }
            device
        });
        Self::new(updated_at, devices)
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Read a cache written by [`DiscoveryCache::save`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cache: Self = serde_json::from_str(&content)?;
        debug!(path = %path.display(), devices = cache.devices.len(), "loaded discovery cache");
        Ok(cache)
    }

    /// Like [`DiscoveryCache::load`], but a missing or unreadable file yields
    /// an empty cache.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            debug!(path = %path.display(), error = %e, "no usable discovery cache");
            Self::default()
        })
    }

    /// Write the cache as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut data = serde_json::to_string_pretty(self)?;
        data.push('\n');
        std::fs::write(path, data).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), devices = self.devices.len(), "saved discovery cache");
        Ok(())
    }

    /// Find a device by id or by `host:port`.
    pub fn lookup(&self, id_or_host_port: &str) -> Option<&Device> {
        self.devices.iter().find(|device| {
            device.id == id_or_host_port
                || join_host_port(&device.host, device.port) == id_or_host_port
        })
    }

    /// Cached devices whose name matches `query`; see [`match_by_name`].
    pub fn find_by_name(&self, query: &str) -> Vec<&Device> {
        match_by_name(query, &self.devices)
    }
}

/// Devices whose name matches `query`.
///
/// Exact matches after [`normalize_name`] win; only when there are none are
/// substring matches (in either direction) returned. Unnamed devices never
/// match.
pub fn match_by_name<'a>(
    query: &str,
    devices: impl IntoIterator<Item = &'a Device>,
) -> Vec<&'a Device> {
    let query = normalize_name(query);
    if query.is_empty() {
        return Vec::new();
    }

    let mut exact = Vec::new();
    let mut fuzzy = Vec::new();
    for device in devices {
        let name = normalize_name(&device.name);
        if name.is_empty() {
            continue;
        }
        if name == query {
            exact.push(device);
        } else if name.contains(&query) || query.contains(&name) {
            fuzzy.push(device);
        }
    }

    if exact.is_empty() {
        fuzzy
    } else {
        exact
    }
}

/// Lowercase `name` and keep only letters and digits.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}
