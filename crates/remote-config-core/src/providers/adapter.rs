//! Remote configuration adapter
//!
//! [`RemoteConfigAdapter`] implements [`RemoteConfigFactory`] on top of the
//! backend clients. Every call builds a fresh client from the descriptor;
//! nothing is cached between calls.
//!
//! # Example
//!
//! ```rust,ignore
//! use remote_config_core::providers::{RemoteConfigAdapter, RemoteConfigFactory, RemoteProviderSpec};
//!
//! let adapter = RemoteConfigAdapter::from_env();
//! let spec = RemoteProviderSpec::new("consul", "127.0.0.1:8500", "app/config.json");
//!
//! let reader = adapter.get(&spec).await?;
//! let mut watch = adapter.watch_channel(&spec).await?;
//! ```

use super::selector::BackendSelector;
use super::traits::{
    ConfigReader, ProviderError, ProviderResult, RemoteConfigFactory, RemoteProvider,
    RemoteResponse,
};
use super::watch::{spawn_relay, WatchHandle};
use async_trait::async_trait;
use remote_config_backends::{BackendConfig, ConfigManagerFactory, HttpConfigManagerFactory};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Adapter between the host's remote-provider surface and the backends
#[derive(Debug, Clone)]
pub struct RemoteConfigAdapter {
    selector: BackendSelector,
    active_watches: Arc<AtomicUsize>,
}

impl RemoteConfigAdapter {
    /// Create an adapter over the given backend factory
    pub fn new(factory: Arc<dyn ConfigManagerFactory>) -> Self {
        Self::from_selector(BackendSelector::new(factory))
    }

    /// Create an adapter from a preconfigured selector
    pub fn from_selector(selector: BackendSelector) -> Self {
        Self {
            selector,
            active_watches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create an adapter backed by the HTTP clients
    pub fn with_http_backends(config: BackendConfig) -> Self {
        Self::new(Arc::new(HttpConfigManagerFactory::new(config)))
    }

    /// Create an adapter backed by the HTTP clients, configured from the environment
    pub fn from_env() -> Self {
        Self::with_http_backends(BackendConfig::from_env())
    }

    /// Number of `watch_channel` relays still running
    pub fn active_watches(&self) -> usize {
        self.active_watches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteConfigFactory for RemoteConfigAdapter {
    async fn get(&self, rp: &dyn RemoteProvider) -> ProviderResult<ConfigReader> {
        let cm = self.selector.select(rp)?;
        let value = cm.get(rp.path()).await?;
        Ok(Cursor::new(value))
    }

    async fn watch(&self, rp: &dyn RemoteProvider) -> ProviderResult<ConfigReader> {
        let cm = self.selector.select(rp)?;
        let (stop, stop_rx) = oneshot::channel();
        let mut updates = cm.watch(rp.path(), stop_rx);

        let first = updates.recv().await;
        let _ = stop.send(());

        let response = first.ok_or(ProviderError::WatchClosed)?;
        let value = RemoteResponse::from(response).into_result()?;
        Ok(Cursor::new(value))
    }

    async fn watch_channel(&self, rp: &dyn RemoteProvider) -> ProviderResult<WatchHandle> {
        let cm = match self.selector.select(rp) {
            Ok(cm) => cm,
            Err(e) => {
                tracing::warn!(
                    provider = rp.provider(),
                    endpoint = rp.endpoint(),
                    path = rp.path(),
                    error = %e,
                    "Failed to open remote config watch"
                );
                return Err(e);
            }
        };

        Ok(spawn_relay(cm, rp.path(), Arc::clone(&self.active_watches)))
    }
}
