//! Fake discoverers for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use blu_types::Device;
use tokio_util::sync::CancellationToken;

use crate::error::DiscoveryError;
use crate::Discoverer;

/// A discoverer that returns canned devices or a canned failure.
///
/// By default it answers immediately. [`StaticDiscoverer::until_cancelled`]
/// makes it hold its answer until the token fires, like the real mechanisms
/// do, and [`StaticDiscoverer::delayed`] adds a fixed delay.
pub struct StaticDiscoverer {
    name: &'static str,
    outcome: Result<Vec<Device>, String>,
    delay: Option<Duration>,
    wait_for_cancel: bool,
    calls: Arc<AtomicUsize>,
}

impl StaticDiscoverer {
    /// Succeed with `devices`.
    pub fn devices(name: &'static str, devices: Vec<Device>) -> Self {
        Self::with_outcome(name, Ok(devices))
    }

    /// Fail with an I/O error carrying `message`.
    pub fn failing(name: &'static str, message: impl Into<String>) -> Self {
        Self::with_outcome(name, Err(message.into()))
    }

    fn with_outcome(name: &'static str, outcome: Result<Vec<Device>, String>) -> Self {
        Self {
            name,
            outcome,
            delay: None,
            wait_for_cancel: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Answer only after `delay`.
    #[must_use]
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answer only once the cancellation token fires.
    #[must_use]
    pub fn until_cancelled(mut self) -> Self {
        self.wait_for_cancel = true;
        self
    }

    /// Shared counter of `discover` calls.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Discoverer for StaticDiscoverer {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn discover(&self, cancel: CancellationToken) -> Result<Vec<Device>, DiscoveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.wait_for_cancel {
            cancel.cancelled().await;
        }
        match &self.outcome {
            Ok(devices) => Ok(devices.clone()),
            Err(message) => Err(DiscoveryError::Io(std::io::Error::other(message.clone()))),
        }
    }
}
