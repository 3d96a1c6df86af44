//! `host:port` helpers.

use thiserror::Error;

/// Why a device argument could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseDeviceError {
    #[error("empty device")]
    Empty,

    #[error("missing host")]
    MissingHost,

    #[error("invalid port: {0}")]
    InvalidPort(String),
}

/// Join a host and port, bracketing IPv6 literals.
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Split `host:port` or `[host]:port`.
///
/// Returns `None` when there is no port separator or the host is an
/// unbracketed IPv6 literal.
pub fn split_host_port(input: &str) -> Option<(&str, &str)> {
    if let Some(rest) = input.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        return Some((host, after.strip_prefix(':')?));
    }
    let (host, port) = input.rsplit_once(':')?;
    if host.contains(':') {
        return None;
    }
    Some((host, port))
}
