//! Player discovery for blucli.
//!
//! Two independent mechanisms run concurrently and their results are merged
//! into one device list keyed by `host:port`:
//!
//! - [`MdnsDiscoverer`] browses the four player service types over
//!   multicast DNS.
//! - [`LsdpDiscoverer`] speaks the vendor LSDP broadcast protocol on UDP
//!   port [`lsdp::LSDP_PORT`].
//!
//! [`Discovery`] owns one of each behind the [`Discoverer`] trait so tests
//! can substitute fakes through [`Discovery::with_discoverers`].
//!
//! ```no_run
//! use std::time::Duration;
//! use blu_discovery::Discovery;
//!
//! # async fn run() -> Result<(), blu_discovery::DiscoveryError> {
//! let devices = Discovery::new().discover(Duration::from_secs(5)).await?;
//! for device in devices {
//!     println!("{} ({})", device.id, device.source);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use blu_types::Device;
use tokio_util::sync::CancellationToken;

pub mod coordinator;
pub mod error;
pub mod lsdp;
pub mod mdns;
pub mod mock;

pub use coordinator::{merge_devices, Discovery};
pub use error::DiscoveryError;
pub use lsdp::LsdpDiscoverer;
pub use mdns::MdnsDiscoverer;

/// One discovery mechanism.
///
/// Implementations run until `cancel` fires (or they have nothing left to
/// wait for) and return every device seen, deduplicated by id and sorted.
#[async_trait]
pub trait Discoverer: Send + Sync + 'static {
    /// Short mechanism name used in logs.
    fn name(&self) -> &'static str;

    /// Collect devices until cancelled.
    async fn discover(&self, cancel: CancellationToken) -> Result<Vec<Device>, DiscoveryError>;
}

/// Drain a map of devices into a list sorted by id.
pub(crate) fn sorted_devices(devices: HashMap<String, Device>) -> Vec<Device> {
    let mut out: Vec<Device> = devices.into_values().collect();
    out.sort_by(|a, b| a.id.cmp(&b.id));
    out
}
