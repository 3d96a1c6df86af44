//! Multicast DNS browsing for the player service types.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};

use async_trait::async_trait;
use blu_types::{Device, DeviceClass, SOURCE_MDNS};
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::DiscoveryError;
use crate::{sorted_devices, Discoverer};

/// Capacity of the channel the per-type browse tasks feed.
const ENTRY_CHANNEL_CAPACITY: usize = 64;

/// A resolved advertisement, reduced to what discovery needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    /// Device-type tag of the browsed service (e.g. `musc`).
    pub service: String,
    /// Instance label, e.g. `Living Room` from `Living Room._musc._tcp.local.`.
    pub instance: String,
    pub addresses: Vec<IpAddr>,
    pub port: u16,
    /// Raw TXT strings, `key=value` or bare `key`.
    pub txt: Vec<String>,
}

impl ResolvedEntry {
    fn from_service_info(class: DeviceClass, info: &ServiceInfo) -> Self {
        let mut addresses: Vec<IpAddr> = info.get_addresses().iter().copied().collect();
        addresses.sort();

        let txt = info
            .get_properties()
            .iter()
            .map(|property| match property.val() {
                Some(_) => format!("{}={}", property.key(), property.val_str()),
                None => property.key().to_string(),
            })
            .collect();

        let instance = info
            .get_fullname()
            .strip_suffix(info.get_type())
            .unwrap_or_default()
            .trim_end_matches('.')
            .to_string();

        Self {
            service: class.tag().to_string(),
            instance,
            addresses,
            port: info.get_port(),
            txt,
        }
    }
}

/// Browses `_musc`, `_musp`, `_musz` and `_mush` over mDNS.
#[derive(Debug, Clone)]
pub struct MdnsDiscoverer {
    classes: Vec<DeviceClass>,
}

impl MdnsDiscoverer {
    pub fn new() -> Self {
        Self {
            classes: DeviceClass::ALL.to_vec(),
        }
    }
}

impl Default for MdnsDiscoverer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Discoverer for MdnsDiscoverer {
    fn name(&self) -> &'static str {
        SOURCE_MDNS
    }

    async fn discover(&self, cancel: CancellationToken) -> Result<Vec<Device>, DiscoveryError> {
        let daemon = ServiceDaemon::new().map_err(|e| DiscoveryError::MdnsInit(e.to_string()))?;

        let (tx, mut rx) = mpsc::channel::<ResolvedEntry>(ENTRY_CHANNEL_CAPACITY);
        let mut errors = Vec::new();
        let mut browsing = Vec::new();

        for &class in &self.classes {
            let service_type = class.service_type();
            let receiver = match daemon.browse(&service_type) {
                Ok(receiver) => receiver,
                Err(e) => {
                    warn!(service_type, error = %e, "mDNS browse failed");
                    errors.push(DiscoveryError::Browse {
                        service_type,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            debug!(service_type, "browsing");

            let tx = tx.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    let event = tokio::select! {
                        () = cancel.cancelled() => break,
                        event = receiver.recv_async() => match event {
                            Ok(event) => event,
                            Err(_) => break,
                        },
                    };
                    let ServiceEvent::ServiceResolved(info) = event else {
                        continue;
                    };
                    trace!(service = info.get_fullname(), "service resolved");
                    let entry = ResolvedEntry::from_service_info(class, &info);
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        sent = tx.send(entry) => if sent.is_err() { break },
                    }
                }
            });
            browsing.push(service_type);
        }
        drop(tx);

        let mut collector = Collector::default();
        while let Some(entry) = rx.recv().await {
            collector.insert(&entry);
        }

        for service_type in &browsing {
            if let Err(e) = daemon.stop_browse(service_type) {
                trace!(service_type, error = %e, "stop_browse failed");
            }
        }
        if let Err(e) = daemon.shutdown() {
            debug!(error = %e, "mDNS daemon shutdown failed");
        }

        outcome(collector.finish(), errors)
    }
}

/// Browse errors only matter when nothing was found.
fn outcome(
    devices: Vec<Device>,
    errors: Vec<DiscoveryError>,
) -> Result<Vec<Device>, DiscoveryError> {
    if devices.is_empty() {
        if let Some(error) = DiscoveryError::join(errors) {
            return Err(error);
        }
    } else if !errors.is_empty() {
        debug!(failed = errors.len(), "ignoring browse errors, devices were found");
    }
    Ok(devices)
}

/// Dedups resolved entries by id.
///
/// The first entry for an id wins; a later duplicate may only backfill an
/// empty version or name.
#[derive(Debug, Default)]
pub struct Collector {
    seen: HashMap<String, Device>,
}

impl Collector {
    pub fn insert(&mut self, entry: &ResolvedEntry) {
        let Some(device) = device_from_entry(entry) else {
            trace!(service = %entry.service, "skipping entry without IPv4 address or port");
            return;
        };
        match self.seen.get_mut(&device.id) {
            Some(existing) => {
                if existing.version.is_empty() && !device.version.is_empty() {
                    existing.version = device.version;
                }
                if existing.name.is_empty() && !device.name.is_empty() {
                    existing.name = device.name;
                }
            }
            None => {
                self.seen.insert(device.id.clone(), device);
            }
        }
    }

    /// Devices sorted by id.
    pub fn finish(self) -> Vec<Device> {
        sorted_devices(self.seen)
    }
}

/// Build a device from an advertisement, or `None` when it has no port or
/// no IPv4 address.
pub fn device_from_entry(entry: &ResolvedEntry) -> Option<Device> {
    if entry.port == 0 {
        return None;
    }
    let host = pick_ipv4(&entry.addresses)?;

    let mut device = Device::new(host.to_string(), entry.port);
    device.device_type.clone_from(&entry.service);
    let mut txt = parse_txt(entry.txt.iter().map(String::as_str));
    device.version = txt.remove("version").unwrap_or_default();
    device.name = if entry.instance.is_empty() {
        txt.remove("name").unwrap_or_default()
    } else {
        entry.instance.clone()
    };
    device.source = SOURCE_MDNS.to_string();
    Some(device)
}

/// First IPv4 address in the list; IPv6 entries are skipped.
pub fn pick_ipv4(addresses: &[IpAddr]) -> Option<Ipv4Addr> {
    addresses.iter().find_map(|address| match address {
        IpAddr::V4(v4) => Some(*v4),
        IpAddr::V6(v6) => v6.to_ipv4_mapped(),
    })
}

/// Parse TXT strings as trimmed `key=value` pairs.
///
/// Entries without `=` or with an empty key are dropped; a later duplicate
/// key replaces an earlier one.
pub fn parse_txt<'a>(records: impl IntoIterator<Item = &'a str>) -> HashMap<String, String> {
    records
        .into_iter()
        .map(str::trim)
        .filter_map(|record| record.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
