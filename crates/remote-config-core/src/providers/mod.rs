//! Remote Configuration Providers
//!
//! This module maps provider descriptors onto backend clients from
//! `remote-config-backends` and exposes them through the
//! [`RemoteConfigFactory`] surface a host configuration library consumes.
//!
//! # Components
//!
//! - **Descriptor**: [`RemoteProvider`] accessors and the serde-friendly
//!   [`RemoteProviderSpec`]
//! - **Backend Selector**: picks one of six constructors from backend kind
//!   and keyring presence
//! - **Adapter**: [`RemoteConfigAdapter`], the `get` / `watch` /
//!   `watch_channel` implementation
//! - **Watch handles**: [`WatchHandle`] owns a relay task and its stop signal
//! - **Loader**: [`RemoteConfigLoader`], the host side, which receives an
//!   adapter by injection rather than through global registration

pub mod adapter;
pub mod descriptor;
pub mod loader;
pub mod selector;
pub mod traits;
pub mod watch;

pub use adapter::RemoteConfigAdapter;
pub use descriptor::{BackendKind, RemoteProviderSpec};
pub use loader::{RemoteConfigLoader, SUPPORTED_REMOTE_PROVIDERS};
pub use selector::{to_machines, BackendSelector, KeyringOpener};
pub use traits::{
    ConfigReader, ProviderError, ProviderResult, RemoteConfigFactory, RemoteProvider,
    RemoteResponse,
};
pub use watch::WatchHandle;
