//! Runs both mechanisms and merges their results.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use blu_types::Device;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::DiscoveryError;
use crate::lsdp::LsdpDiscoverer;
use crate::mdns::MdnsDiscoverer;
use crate::{sorted_devices, Discoverer};

/// Concurrent mDNS + LSDP discovery.
pub struct Discovery {
    mdns: Arc<dyn Discoverer>,
    lsdp: Arc<dyn Discoverer>,
}

impl Discovery {
    /// Discovery using the real network mechanisms.
    pub fn new() -> Self {
        Self::with_discoverers(Arc::new(MdnsDiscoverer::new()), Arc::new(LsdpDiscoverer::new()))
    }

    /// Discovery using the given mechanisms.
    pub fn with_discoverers(mdns: Arc<dyn Discoverer>, lsdp: Arc<dyn Discoverer>) -> Self {
        Self { mdns, lsdp }
    }

    /// Discover players, giving both mechanisms `timeout` to report.
    pub async fn discover(&self, timeout: Duration) -> Result<Vec<Device>, DiscoveryError> {
        let cancel = CancellationToken::new();
        let deadline = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                cancel.cancel();
            })
        };

        let result = self.discover_with_cancel(cancel.clone()).await;
        deadline.abort();
        cancel.cancel();
        result
    }

    /// Discover players until `cancel` fires.
    ///
    /// Fails only when both mechanisms fail; a single failure is logged and
    /// the other mechanism's devices are returned.
    pub async fn discover_with_cancel(
        &self,
        cancel: CancellationToken,
    ) -> Result<Vec<Device>, DiscoveryError> {
        let mdns_task = spawn_discoverer(Arc::clone(&self.mdns), cancel.clone());
        let lsdp_task = spawn_discoverer(Arc::clone(&self.lsdp), cancel);

        let (mdns, lsdp) = tokio::join!(join(mdns_task), join(lsdp_task));

        let (mdns, lsdp) = match (mdns, lsdp) {
            (Err(mdns), Err(lsdp)) => {
                return Err(DiscoveryError::AllFailed {
                    mdns: Box::new(mdns),
                    lsdp: Box::new(lsdp),
                });
            }
            (mdns, lsdp) => (
                ignore_failure(self.mdns.name(), mdns),
                ignore_failure(self.lsdp.name(), lsdp),
            ),
        };

        let devices = merge_devices(mdns, lsdp);
        info!(count = devices.len(), "discovery finished");
        Ok(devices)
    }
}

impl Default for Discovery {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_discoverer(
    discoverer: Arc<dyn Discoverer>,
    cancel: CancellationToken,
) -> JoinHandle<Result<Vec<Device>, DiscoveryError>> {
    tokio::spawn(async move { discoverer.discover(cancel).await })
}

async fn join(
    handle: JoinHandle<Result<Vec<Device>, DiscoveryError>>,
) -> Result<Vec<Device>, DiscoveryError> {
    handle
        .await
        .unwrap_or_else(|e| Err(DiscoveryError::Task(e.to_string())))
}

fn ignore_failure(
    mechanism: &'static str,
    result: Result<Vec<Device>, DiscoveryError>,
) -> Vec<Device> {
    match result {
        Ok(devices) => {
            debug!(mechanism, count = devices.len(), "mechanism finished");
            devices
        }
        Err(error) => {
            debug!(mechanism, %error, "mechanism failed, using the other one");
            Vec::new()
        }
    }
}

/// Merge mDNS and LSDP results into one list sorted by id.
///
/// mDNS records seed the result. An LSDP record with a known id only fills
/// an empty `version`, `device_type` or `name` and adds its source token; unknown
/// ids are inserted as-is.
pub fn merge_devices(mdns: Vec<Device>, lsdp: Vec<Device>) -> Vec<Device> {
    let mut seen: HashMap<String, Device> = HashMap::with_capacity(mdns.len() + lsdp.len());
    for device in mdns {
        seen.insert(device.id.clone(), device);
    }

    for device in lsdp {
        match seen.get_mut(&device.id) {
            Some(existing) => {
                if existing.version.is_empty() {
                    existing.version = device.version;
                }
                if existing.device_type.is_empty() {
                    existing.device_type = device.device_type;
                }
                if existing.name.is_empty() {
                    existing.name = device.name;
                }
                existing.add_source(&device.source);
            }
            None => {
                seen.insert(device.id.clone(), device);
            }
        }
    }

    sorted_devices(seen)
}
