//! Remote Configuration Backends
//!
//! Clients for the distributed key-value stores that hold remote
//! configuration:
//!
//! - **etcd v2**: the `/v2/keys` HTTP API, watched with `wait=true` long polls
//! - **etcd v3**: the JSON gRPC gateway (`/v3/kv/range`, `/v3/watch`)
//! - **Consul**: the `/v1/kv` API, watched with blocking queries
//!
//! Every client implements [`ConfigManager`], a two-operation surface: a
//! one-shot `get` and a `watch` stream that runs until its stop signal
//! fires. Values may be stored encrypted; [`SecureConfigManager`] wraps any
//! client and decrypts values with a [`Keyring`].
//!
//! # Construction
//!
//! [`ConfigManagerFactory`] names one constructor per backend, each in a
//! standard and an encrypted flavour. [`HttpConfigManagerFactory`] is the
//! implementation backed by the HTTP clients in this crate.
//!
//! # Example
//!
//! ```rust,ignore
//! use remote_config_backends::{ConfigManagerFactory, HttpConfigManagerFactory};
//!
//! let factory = HttpConfigManagerFactory::from_env();
//! let manager = factory.new_standard_consul(vec!["127.0.0.1:8500".into()])?;
//! let bytes = manager.get("app/config.json").await?;
//! ```

pub mod config;
pub mod consul;
pub mod error;
pub mod etcd;
pub mod etcdv3;
pub mod factory;
pub mod keyring;
pub mod secure;
pub mod traits;

mod machines;
mod watch;

pub use config::BackendConfig;
pub use consul::ConsulClient;
pub use error::{BackendError, BackendResult};
pub use etcd::EtcdV2Client;
pub use etcdv3::EtcdV3Client;
pub use factory::{ConfigManagerFactory, HttpConfigManagerFactory};
pub use keyring::Keyring;
pub use secure::SecureConfigManager;
pub use traits::{BackendResponse, ConfigManager, StopSignal};

#[cfg(any(test, feature = "mock"))]
pub use traits::MockConfigManager;
