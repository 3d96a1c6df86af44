//! Scheduled query broadcasts.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use network_interface::{Addr, NetworkInterface, NetworkInterfaceConfig};
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::packet::QUERY_ALL;

/// Offsets from start at which a query is sent, mirroring the vendor
/// controller's startup probing.
pub const QUERY_SCHEDULE: [Duration; 7] = [
    Duration::from_secs(0),
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(3),
    Duration::from_secs(5),
    Duration::from_secs(7),
    Duration::from_secs(10),
];

/// Upper bound (exclusive) of the random delay added to each send.
pub const MAX_JITTER: Duration = Duration::from_millis(250);

/// Small wall-clock-derived jitter below [`MAX_JITTER`].
pub fn jitter() -> Duration {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.subsec_nanos());
    let max = u32::try_from(MAX_JITTER.as_nanos()).unwrap_or(u32::MAX);
    Duration::from_nanos(u64::from(nanos % max))
}

/// Broadcast address of the subnet `ip` lives in.
pub fn subnet_broadcast(ip: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) | !u32::from(netmask))
}

/// Broadcast addresses of every local IPv4 interface, or the limited
/// broadcast address if none can be derived.
pub fn broadcast_addresses() -> Vec<Ipv4Addr> {
    let interfaces = NetworkInterface::show().unwrap_or_else(|e| {
        debug!(error = %e, "listing network interfaces failed");
        Vec::new()
    });

    let mut out = Vec::new();
    for interface in interfaces {
        for addr in interface.addr {
            let Addr::V4(v4) = addr else {
                continue;
            };
            let Some(netmask) = v4.netmask else {
                continue;
            };
            let broadcast = subnet_broadcast(v4.ip, netmask);
            if !out.contains(&broadcast) {
                out.push(broadcast);
            }
        }
    }

    if out.is_empty() {
        out.push(Ipv4Addr::BROADCAST);
    }
    out
}

/// Send the query to every target on [`QUERY_SCHEDULE`] until cancelled.
pub(crate) async fn send_queries(
    socket: Arc<UdpSocket>,
    targets: Vec<Ipv4Addr>,
    port: u16,
    cancel: CancellationToken,
) {
    let start = Instant::now();
    for offset in QUERY_SCHEDULE {
        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep_until(start + offset + jitter()) => {}
        }

        for target in &targets {
            let dest = SocketAddrV4::new(*target, port);
            match socket.send_to(&QUERY_ALL, dest).await {
                Ok(_) => trace!(%dest, "LSDP query sent"),
                Err(e) => trace!(%dest, error = %e, "LSDP query send failed"),
            }
        }
    }
    debug!("LSDP query schedule complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_is_bounded() {
        for _ in 0..100 {
            assert!(jitter() < MAX_JITTER);
        }
    }

    #[test]
    fn schedule_is_monotonic() {
        assert!(QUERY_SCHEDULE.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(QUERY_SCHEDULE[6], Duration::from_secs(10));
    }

    #[test]
    fn subnet_broadcast_math() {
        assert_eq!(
            subnet_broadcast(Ipv4Addr::new(192, 168, 1, 23), Ipv4Addr::new(255, 255, 255, 0)),
            Ipv4Addr::new(192, 168, 1, 255)
        );
        assert_eq!(
            subnet_broadcast(Ipv4Addr::new(10, 20, 30, 40), Ipv4Addr::new(255, 255, 0, 0)),
            Ipv4Addr::new(10, 20, 255, 255)
        );
        assert_eq!(
            subnet_broadcast(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::UNSPECIFIED),
            Ipv4Addr::BROADCAST
        );
    }

    #[test]
    fn broadcast_addresses_never_empty() {
        assert!(!broadcast_addresses().is_empty());
    }
}
