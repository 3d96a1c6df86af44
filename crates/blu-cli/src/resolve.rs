//! Turn a user-supplied device argument into one player.

use std::net::IpAddr;
use std::time::Duration;

use blu_config::{match_by_name, Config, DiscoveryCache};
use blu_discovery::{Discovery, DiscoveryError};
use blu_types::{join_host_port, Device};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("ambiguous device name {query:?}; matches: {candidates}")]
    Ambiguous { query: String, candidates: String },

    #[error("unable to resolve {0:?} (pass a device or set BLU_DEVICE)")]
    Unresolvable(String),

    #[error("no device selected")]
    NoneSelected,

    #[error("no devices discovered (run `blu devices` or pass a device)")]
    NoneDiscovered,

    #[error("multiple devices discovered ({0}); pick one")]
    Multiple(usize),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// Everything resolution may consult.
pub struct Resolver<'a> {
    pub config: &'a Config,
    pub cache: &'a DiscoveryCache,
    pub discovery: &'a Discovery,
    /// Whether the network may be searched when nothing local matches.
    pub allow_discover: bool,
    pub timeout: Duration,
}

impl Resolver<'_> {
    /// Resolve `arg` (already merged with `BLU_DEVICE`), falling back to the
    /// configured default device.
    ///
    /// Order: alias expansion, cache lookup by id or `host:port`, name
    /// matching against the cache and then the network, and finally parsing
    /// the argument as an address. With nothing to resolve a single cached
    /// device is used, else exactly one discovered device.
    pub async fn resolve(&self, arg: Option<&str>) -> Result<Device, ResolveError> {
        let raw = arg
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .or_else(|| Some(self.config.default_device.trim()).filter(|raw| !raw.is_empty()));

        match raw {
            Some(raw) => self.resolve_named(raw).await,
            None => self.resolve_implicit().await,
        }
    }

    async fn resolve_named(&self, raw: &str) -> Result<Device, ResolveError> {
        let raw = self.config.resolve_alias(raw);

        if let Some(cached) = self.cache.lookup(raw) {
            debug!(id = %cached.id, "resolved from cache");
            return Ok(cached.clone());
        }

        if likely_name_arg(raw) {
            if let Some(device) = unique_match(raw, self.cache.find_by_name(raw))? {
                debug!(id = %device.id, "resolved cached name");
                return Ok(device);
            }

            if self.allow_discover {
                let devices = self.discovery.discover(self.timeout).await?;
                if let Some(device) = unique_match(raw, match_by_name(raw, &devices))? {
                    debug!(id = %device.id, "resolved discovered name");
                    return Ok(device);
                }
            }
        }

        Device::parse(raw).map_err(|e| {
            debug!(input = raw, error = %e, "not a device address");
            ResolveError::Unresolvable(raw.to_string())
        })
    }

    async fn resolve_implicit(&self) -> Result<Device, ResolveError> {
        if let [only] = self.cache.devices.as_slice() {
            return Ok(only.clone());
        }
        if !self.allow_discover {
            return Err(ResolveError::NoneSelected);
        }

        let mut devices = self.discovery.discover(self.timeout).await?;
        match devices.len() {
            0 => Err(ResolveError::NoneDiscovered),
            1 => Ok(devices.remove(0)),
            n => Err(ResolveError::Multiple(n)),
        }
    }
}

/// `Some` for exactly one match, an error for several, `None` for none.
fn unique_match(query: &str, matches: Vec<&Device>) -> Result<Option<Device>, ResolveError> {
    match matches.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some((*only).clone())),
        many => Err(ResolveError::Ambiguous {
            query: query.to_string(),
            candidates: format_candidates(many),
        }),
    }
}

fn format_candidates(devices: &[&Device]) -> String {
    devices
        .iter()
        .map(|device| {
            let name = device.name.trim();
            let label = if name.is_empty() { &device.id } else { name };
            format!("{label} ({})", join_host_port(&device.host, device.port))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whether `input` reads as a player name rather than an address.
///
/// URLs and anything with `:` or `/` are addresses. Whitespace means a name.
/// Otherwise dotted strings and IP literals are addresses.
pub fn likely_name_arg(input: &str) -> bool {
    let input = input.trim();
    if input.is_empty() || input.starts_with("http://") || input.starts_with("https://") {
        return false;
    }
    if input.contains([':', '/']) {
        return false;
    }
    if input.contains([' ', '\t']) {
        return true;
    }
    if input.contains('.') {
        return false;
    }
    input.trim_matches(['[', ']']).parse::<IpAddr>().is_err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use blu_discovery::mock::StaticDiscoverer;

    fn named(host: &str, name: &str) -> Device {
        let mut device = Device::new(host, 11000);
        device.name = name.to_string();
        device
    }

    fn cache(devices: Vec<Device>) -> DiscoveryCache {
        DiscoveryCache::new(chrono::Utc::now(), devices)
    }

    fn discovery(devices: Vec<Device>) -> (Discovery, Arc<std::sync::atomic::AtomicUsize>) {
        let mdns = StaticDiscoverer::devices("mdns", devices);
        let calls = mdns.calls();
        let discovery = Discovery::with_discoverers(
            Arc::new(mdns),
            Arc::new(StaticDiscoverer::devices("lsdp", Vec::new())),
        );
        (discovery, calls)
    }

    fn resolver<'a>(
        config: &'a Config,
        cache: &'a DiscoveryCache,
        discovery: &'a Discovery,
        allow_discover: bool,
    ) -> Resolver<'a> {
        Resolver {
            config,
            cache,
            discovery,
            allow_discover,
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn name_heuristic() {
        assert!(likely_name_arg("kitchen"));
        assert!(likely_name_arg("Living Room"));
        assert!(likely_name_arg("Living Room 2.0"));
        assert!(!likely_name_arg("192.168.1.5"));
        assert!(!likely_name_arg("player.local"));
        assert!(!likely_name_arg("10.0.0.1:11000"));
        assert!(!likely_name_arg("http://kitchen"));
        assert!(!likely_name_arg("host/path"));
        assert!(!likely_name_arg("::1"));
        assert!(!likely_name_arg(""));
    }

    #[tokio::test]
    async fn alias_then_cache_lookup() {
        let mut config = Config::default();
        config
            .aliases
            .insert("den".to_string(), "10.0.0.7:11000".to_string());
        let cache = cache(vec![named("10.0.0.7", "Den Speaker")]);
        let (discovery, calls) = discovery(Vec::new());

        let device = resolver(&config, &cache, &discovery, true)
            .resolve(Some("den"))
            .await
            .unwrap();
        assert_eq!(device.name, "Den Speaker");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn default_device_used_without_argument() {
        let config = Config {
            default_device: "10.0.0.9".to_string(),
            ..Config::default()
        };
        let cache = DiscoveryCache::default();
        let (discovery, _) = discovery(Vec::new());

        let device = resolver(&config, &cache, &discovery, false)
            .resolve(Some("  "))
            .await
            .unwrap();
        assert_eq!(device.id, "10.0.0.9:11000");
    }

    #[tokio::test]
    async fn cached_name_and_ambiguity() {
        let config = Config::default();
        let cache = cache(vec![
            named("10.0.0.1", "Kitchen"),
            named("10.0.0.2", "Kitchen Upstairs"),
        ]);
        let (discovery, calls) = discovery(Vec::new());
        let resolver = resolver(&config, &cache, &discovery, true);

        let device = resolver.resolve(Some("kitchen")).await.unwrap();
        assert_eq!(device.host, "10.0.0.1");

        let err = resolver.resolve(Some("kitch")).await.unwrap_err();
        assert!(matches!(err, ResolveError::Ambiguous { .. }));
        let message = err.to_string();
        assert!(message.contains("Kitchen (10.0.0.1:11000)"), "{message}");
        assert!(message.contains("Kitchen Upstairs (10.0.0.2:11000)"), "{message}");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_name_falls_back_to_discovery() {
        let config = Config::default();
        let cache = DiscoveryCache::default();
        let (discovery, calls) = discovery(vec![
            named("10.0.0.3", "Office"),
            named("10.0.0.4", "Garage"),
        ]);

        let device = resolver(&config, &cache, &discovery, true)
            .resolve(Some("office"))
            .await
            .unwrap();
        assert_eq!(device.host, "10.0.0.3");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_name_without_discovery_is_parsed_as_host() {
        let config = Config::default();
        let cache = DiscoveryCache::default();
        let (discovery, calls) = discovery(Vec::new());

        let device = resolver(&config, &cache, &discovery, false)
            .resolve(Some("bluesound"))
            .await
            .unwrap();
        assert_eq!(device.id, "bluesound:11000");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn address_arguments_parse() {
        let config = Config::default();
        let cache = DiscoveryCache::default();
        let (discovery, _) = discovery(Vec::new());
        let resolver = resolver(&config, &cache, &discovery, true);

        let device = resolver
            .resolve(Some("http://192.168.1.8:11001/Status"))
            .await
            .unwrap();
        assert_eq!(device.id, "192.168.1.8:11001");

        let err = resolver.resolve(Some("192.168.1.8:0")).await.unwrap_err();
        assert!(matches!(err, ResolveError::Unresolvable(_)));
    }

    #[tokio::test]
    async fn implicit_uses_single_cached_device() {
        let config = Config::default();
        let cache = cache(vec![named("10.0.0.5", "")]);
        let (discovery, calls) = discovery(Vec::new());

        let device = resolver(&config, &cache, &discovery, true)
            .resolve(None)
            .await
            .unwrap();
        assert_eq!(device.id, "10.0.0.5:11000");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn implicit_discovery_requires_exactly_one() {
        let config = Config::default();
        let cache = DiscoveryCache::default();

        let (none, _) = discovery(Vec::new());
        let err = resolver(&config, &cache, &none, true)
            .resolve(None)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NoneDiscovered));

        let (one, _) = discovery(vec![named("10.0.0.6", "")]);
        let device = resolver(&config, &cache, &one, true)
            .resolve(None)
            .await
            .unwrap();
        assert_eq!(device.id, "10.0.0.6:11000");

        let (two, _) = discovery(vec![named("10.0.0.6", ""), named("10.0.0.7", "")]);
        let err = resolver(&config, &cache, &two, true)
            .resolve(None)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Multiple(2)));

        let err = resolver(&config, &cache, &two, false)
            .resolve(None)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NoneSelected));
    }
}
