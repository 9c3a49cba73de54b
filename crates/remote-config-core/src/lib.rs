//! Remote Configuration Core
//!
//! Adapts a configuration library's remote-provider capability to etcd v2,
//! etcd v3 and Consul. Given a provider descriptor (backend kind, endpoints,
//! path and an optional keyring), the adapter builds the matching backend
//! client and offers two read modes:
//!
//! - a one-shot fetch ([`RemoteConfigFactory::get`] / [`RemoteConfigFactory::watch`])
//! - a change-notification stream ([`RemoteConfigFactory::watch_channel`])
//!
//! Configuration bytes are relayed untouched; parsing and merging belong to
//! the host.
//!
//! # Example
//!
//! ```rust,ignore
//! use remote_config_core::providers::{RemoteConfigAdapter, RemoteConfigLoader};
//! use std::sync::Arc;
//!
//! let mut loader = RemoteConfigLoader::new(Arc::new(RemoteConfigAdapter::from_env()));
//! loader.add_remote_provider("etcd", "http://127.0.0.1:2379", "/config/app.json")?;
//!
//! let reader = loader.read_remote_config().await?;
//!
//! let mut watch = loader.watch_remote_config_on_channel().await?;
//! while let Some(update) = watch.recv().await {
//!     println!("config changed: {} bytes", update.value.len());
//! }
//! ```

pub mod providers;
pub mod telemetry;

pub use providers::{
    BackendKind, BackendSelector, ConfigReader, ProviderError, ProviderResult,
    RemoteConfigAdapter, RemoteConfigFactory, RemoteConfigLoader, RemoteProvider,
    RemoteProviderSpec, RemoteResponse, WatchHandle,
};
