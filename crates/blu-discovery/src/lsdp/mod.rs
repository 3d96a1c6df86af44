//! LSDP: the vendor's UDP broadcast discovery protocol.
//!
//! A query for every device class is broadcast on a fixed schedule while
//! the same socket listens for announce packets from players.

use std::collections::HashMap;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use blu_types::{class_to_type, is_player_class, Device, DEFAULT_PLAYER_PORT, SOURCE_LSDP};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::DiscoveryError;
use crate::{sorted_devices, Discoverer};

pub mod broadcast;
pub mod packet;

pub use packet::{encode_announce, parse_packet, Announce, Record, QUERY_ALL};

/// UDP port used for both queries and announces.
pub const LSDP_PORT: u16 = 11430;

/// Read timeout of the receive loop; bounds cancellation latency.
pub const READ_TIMEOUT: Duration = Duration::from_millis(150);

const RECV_BUFFER_SIZE: usize = 2048;

/// Discovers players by LSDP broadcast.
#[derive(Debug, Clone)]
pub struct LsdpDiscoverer {
    port: u16,
}

impl LsdpDiscoverer {
    pub fn new() -> Self {
        Self { port: LSDP_PORT }
    }

    /// Use a different UDP port. Only meant for tests; real players only
    /// answer on [`LSDP_PORT`].
    pub fn with_port(port: u16) -> Self {
        Self { port }
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Default for LsdpDiscoverer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Discoverer for LsdpDiscoverer {
    fn name(&self) -> &'static str {
        SOURCE_LSDP
    }

    async fn discover(&self, cancel: CancellationToken) -> Result<Vec<Device>, DiscoveryError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, self.port))
            .await
            .map_err(|source| DiscoveryError::Bind {
                port: self.port,
                source,
            })?;
        if let Err(e) = socket.set_broadcast(true) {
            warn!(error = %e, "enabling SO_BROADCAST failed");
        }
        let socket = Arc::new(socket);

        let targets = broadcast::broadcast_addresses();
        debug!(port = self.port, ?targets, "LSDP listening");

        let sender_cancel = cancel.child_token();
        let sender = tokio::spawn(broadcast::send_queries(
            Arc::clone(&socket),
            targets,
            self.port,
            sender_cancel.clone(),
        ));

        let devices = receive_announces(&*socket, &cancel).await;

        sender_cancel.cancel();
        if let Err(e) = sender.await {
            debug!(error = %e, "LSDP sender task failed");
        }
        Ok(devices)
    }
}

/// Where announce datagrams are read from.
#[async_trait]
pub(crate) trait DatagramSource: Send + Sync {
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

#[async_trait]
impl DatagramSource for UdpSocket {
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await
    }
}

/// Collect devices from announce packets until cancelled or a read fails.
/// Read timeouts only re-check cancellation.
async fn receive_announces<S>(socket: &S, cancel: &CancellationToken) -> Vec<Device>
where
    S: DatagramSource + ?Sized,
{
    let mut seen: HashMap<String, Device> = HashMap::new();
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    loop {
        let received = tokio::select! {
            () = cancel.cancelled() => break,
            received = tokio::time::timeout(READ_TIMEOUT, socket.recv_from(&mut buf)) => received,
        };

        let (len, from) = match received {
            Err(_elapsed) => continue,
            Ok(Err(e)) => {
                debug!(error = %e, "LSDP read failed, stopping listener");
                break;
            }
            Ok(Ok(received)) => received,
        };

        let Some(announces) = parse_packet(&buf[..len]) else {
            trace!(%from, len, "ignoring non-LSDP packet");
            continue;
        };
        for announce in &announces {
            for device in devices_from_announce(announce) {
                if !seen.contains_key(&device.id) {
                    debug!(id = %device.id, kind = %device.device_type, "LSDP announce");
                    seen.insert(device.id.clone(), device);
                }
            }
        }
    }

    sorted_devices(seen)
}

/// Devices advertised by one announce, one per player-class record.
pub fn devices_from_announce(announce: &Announce) -> Vec<Device> {
    let host = announce.address.to_string();
    announce
        .records
        .iter()
        .filter(|record| is_player_class(record.class))
        .map(|record| {
            let port = record
                .txt
                .get("port")
                .and_then(|port| parse_port(port))
                .unwrap_or(DEFAULT_PLAYER_PORT);
            let mut device = Device::new(host.clone(), port);
            device.device_type = class_to_type(record.class).to_string();
            device.version = record.txt.get("version").cloned().unwrap_or_default();
            device.name = record.txt.get("name").cloned().unwrap_or_default();
            device.source = SOURCE_LSDP.to_string();
            device
        })
        .collect()
}

/// Parse a decimal port in `1..=65535`.
pub fn parse_port(input: &str) -> Option<u16> {
    match input.trim().parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(port) => Some(port),
    }
}
