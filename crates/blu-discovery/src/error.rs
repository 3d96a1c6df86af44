//! Discovery subsystem errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("mDNS daemon failed to start: {0}")]
    MdnsInit(String),

    #[error("mDNS browse for {service_type} failed: {reason}")]
    Browse {
        service_type: String,
        reason: String,
    },

    #[error("LSDP bind on UDP port {port} failed: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", join_messages(.0))]
    Multiple(Vec<DiscoveryError>),

    #[error("all discovery mechanisms failed: mdns: {mdns}; lsdp: {lsdp}")]
    AllFailed {
        mdns: Box<DiscoveryError>,
        lsdp: Box<DiscoveryError>,
    },

    #[error("discovery task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DiscoveryError {
    /// Collapse accumulated errors: `None` when empty, the error itself when
    /// there is exactly one.
    pub fn join(mut errors: Vec<DiscoveryError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(DiscoveryError::Multiple(errors)),
        }
    }
}

fn join_messages(errors: &[DiscoveryError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
