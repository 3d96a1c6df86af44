//! Discovered device records.

use serde::{Deserialize, Serialize};

use crate::address::{join_host_port, split_host_port, ParseDeviceError};
use crate::DEFAULT_PLAYER_PORT;

/// Source token for records found via multicast DNS.
pub const SOURCE_MDNS: &str = "mdns";

/// Source token for records found via LSDP broadcast.
pub const SOURCE_LSDP: &str = "lsdp";

/// A player found on the local network.
///
/// `id` is always `host:port`; two records with the same `id` describe the
/// same physical player no matter which mechanism produced them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub host: String,
    pub port: u16,
    /// Short class tag (`musc`, `musp`, `musz`, `mush`), empty if unknown.
    #[serde(rename = "type", default)]
    pub device_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Human-readable player name, empty if none was advertised.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Producing mechanism(s), `+`-joined (e.g. `mdns+lsdp`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
}

impl Device {
    /// Create a record for `host:port` with the id filled in.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            id: join_host_port(&host, port),
            host,
            port,
            ..Self::default()
        }
    }

    /// Parse a user-supplied device argument.
    ///
    /// Accepts `host`, `host:port`, `[v6]:port` and `http(s)://host[:port]/...`.
    /// The port defaults to [`DEFAULT_PLAYER_PORT`].
    pub fn parse(input: &str) -> Result<Self, ParseDeviceError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseDeviceError::Empty);
        }

        let authority = match input
            .strip_prefix("http://")
            .or_else(|| input.strip_prefix("https://"))
        {
            Some(rest) => rest.split(['/', '?', '#']).next().unwrap_or_default(),
            None => input,
        };

        let (host, port) = match split_host_port(authority) {
            Some((host, port)) => (host, parse_port_arg(port)?),
            None => (authority, DEFAULT_PLAYER_PORT),
        };

        let host = host.trim_matches(['[', ']']);
        if host.is_empty() {
            return Err(ParseDeviceError::MissingHost);
        }
        Ok(Self::new(host, port))
    }

    /// Whether the record carries enough to be contacted.
    pub fn is_addressable(&self) -> bool {
        !self.host.is_empty() && self.port != 0
    }

    /// Iterate the individual source tokens.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.source.split('+').filter(|token| !token.is_empty())
    }

    /// Whether `token` is already one of the record's sources.
    pub fn has_source(&self, token: &str) -> bool {
        self.sources().any(|existing| existing == token)
    }

    /// Add every token of `source` that is not already present.
    pub fn add_source(&mut self, source: &str) {
        for token in source.split('+').filter(|token| !token.is_empty()) {
            if self.has_source(token) {
                continue;
            }
            if !self.source.is_empty() {
                self.source.push('+');
            }
            self.source.push_str(token);
        }
    }

    /// Base URL of the player's HTTP API.
    pub fn base_url(&self) -> String {
        let host = if self.host.is_empty() {
            "127.0.0.1"
        } else {
            &self.host
        };
        let port = if self.port == 0 {
            DEFAULT_PLAYER_PORT
        } else {
            self.port
        };
        format!("http://{}/", join_host_port(host, port))
    }
}

fn parse_port_arg(port: &str) -> Result<u16, ParseDeviceError> {
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(ParseDeviceError::InvalidPort(port.to_string())),
        Ok(port) => Ok(port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_builds_id() {
        let device = Device::new("192.168.1.10", 11000);
        assert_eq!(device.id, "192.168.1.10:11000");
        assert!(device.is_addressable());
    }

    #[test]
    fn empty_host_or_zero_port_is_not_addressable() {
        assert!(!Device::new("", 11000).is_addressable());
        assert!(!Device::new("10.0.0.1", 0).is_addressable());
    }

    #[test]
    fn add_source_never_duplicates() {
        let mut device = Device::new("10.0.0.1", 11000);
        device.add_source(SOURCE_MDNS);
        device.add_source(SOURCE_LSDP);
        device.add_source(SOURCE_MDNS);
        device.add_source("lsdp+mdns");
        assert_eq!(device.source, "mdns+lsdp");
        assert!(device.has_source("lsdp"));
        assert!(!device.has_source("md"));
    }

    #[test]
    fn json_shape_omits_empty_optionals() {
        let mut device = Device::new("10.0.0.1", 11000);
        device.device_type = "musc".to_string();
        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(json["id"], "10.0.0.1:11000");
        assert_eq!(json["type"], "musc");
        assert_eq!(json["port"], 11000);
        assert!(json.get("version").is_none());
        assert!(json.get("source").is_none());

        device.version = "4.2.1".to_string();
        device.source = "mdns".to_string();
        let decoded: Device =
            serde_json::from_str(&serde_json::to_string(&device).unwrap()).unwrap();
        assert_eq!(decoded, device);
    }

    #[test]
    fn parse_plain_host_defaults_port() {
        let device = Device::parse("192.168.1.20").unwrap();
        assert_eq!(device.host, "192.168.1.20");
        assert_eq!(device.port, 11000);
        assert_eq!(device.id, "192.168.1.20:11000");
    }

    #[test]
    fn parse_host_port_and_url() {
        let device = Device::parse(" 10.0.0.5:11001 ").unwrap();
        assert_eq!(device.port, 11001);

        let device = Device::parse("http://10.0.0.6:11002/Status?x=1").unwrap();
        assert_eq!(device.host, "10.0.0.6");
        assert_eq!(device.port, 11002);

        let device = Device::parse("https://player.local/").unwrap();
        assert_eq!(device.host, "player.local");
        assert_eq!(device.port, 11000);
    }

    #[test]
    fn parse_ipv6_brackets() {
        let device = Device::parse("[fe80::1]:11000").unwrap();
        assert_eq!(device.host, "fe80::1");
        assert_eq!(device.id, "[fe80::1]:11000");
    }

    #[test]
    fn parse_errors() {
        assert_eq!(Device::parse("  "), Err(ParseDeviceError::Empty));
        assert_eq!(Device::parse(":11000"), Err(ParseDeviceError::MissingHost));
        assert!(matches!(
            Device::parse("host:abc"),
            Err(ParseDeviceError::InvalidPort(_))
        ));
        assert!(matches!(
            Device::parse("host:70000"),
            Err(ParseDeviceError::InvalidPort(_))
        ));
    }

    #[test]
    fn base_url_defaults() {
        assert_eq!(
            Device::new("10.0.0.1", 11000).base_url(),
            "http://10.0.0.1:11000/"
        );
        assert_eq!(Device::default().base_url(), "http://127.0.0.1:11000/");
    }
}
