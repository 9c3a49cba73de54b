//! Backend Selector
//!
//! Maps a descriptor onto one of the six backend constructors:
//!
//! | Backend kind | No keyring | With keyring |
//! |---|---|---|
//! | `etcdv3` | `new_standard_etcd_v3` | `new_etcd_v3` |
//! | `etcd` | `new_standard_etcd` | `new_etcd` |
//! | anything else | `new_standard_consul` | `new_consul` |
//!
//! The keyring file is opened only for the duration of the call and is
//! closed before `select` returns, whether construction succeeded or not.

use super::descriptor::BackendKind;
use super::traits::{ProviderError, ProviderResult, RemoteProvider};
use remote_config_backends::{ConfigManager, ConfigManagerFactory};
use std::fmt;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

/// Opens the keyring file named by a descriptor
pub type KeyringOpener = Arc<dyn Fn(&Path) -> io::Result<Box<dyn Read + Send>> + Send + Sync>;

/// Split an endpoint string into machine addresses
///
/// Splits on literal commas with no trimming or validation, so `""` yields
/// `[""]`. Malformed addresses are left for the backend to reject.
pub fn to_machines(endpoint: &str) -> Vec<String> {
    endpoint.split(',').map(str::to_string).collect()
}

/// Builds a fresh backend client for each descriptor
#[derive(Clone)]
pub struct BackendSelector {
    factory: Arc<dyn ConfigManagerFactory>,
    open_keyring: KeyringOpener,
}

impl fmt::Debug for BackendSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendSelector").finish_non_exhaustive()
    }
}

impl BackendSelector {
    /// Create a selector that opens keyrings from the filesystem
    pub fn new(factory: Arc<dyn ConfigManagerFactory>) -> Self {
        Self {
            factory,
            open_keyring: Arc::new(|path: &Path| {
                let file = std::fs::File::open(path)?;
                Ok(Box::new(file) as Box<dyn Read + Send>)
            }),
        }
    }

    /// Replace how keyring files are opened
    pub fn with_keyring_opener<F>(mut self, opener: F) -> Self
    where
        F: Fn(&Path) -> io::Result<Box<dyn Read + Send>> + Send + Sync + 'static,
    {
        self.open_keyring = Arc::new(opener);
        self
    }

    /// Construct the backend client a descriptor asks for
    pub fn select(&self, rp: &dyn RemoteProvider) -> ProviderResult<Box<dyn ConfigManager>> {
        let kind = BackendKind::from_provider(rp.provider());
        let machines = to_machines(rp.endpoint());
        let keyring_path = rp.secret_keyring();
        let encrypted = !keyring_path.is_empty();

        tracing::debug!(
            provider = %kind,
            machines = ?machines,
            encrypted,
            "Selecting remote config backend"
        );

        let manager = if encrypted {
            let mut keyring =
                (self.open_keyring)(Path::new(keyring_path)).map_err(ProviderError::Keyring)?;
            let keyring: &mut dyn Read = &mut *keyring;
            match kind {
                BackendKind::EtcdV3 => self.factory.new_etcd_v3(machines, keyring),
                BackendKind::EtcdV2 => self.factory.new_etcd(machines, keyring),
                BackendKind::Consul => self.factory.new_consul(machines, keyring),
            }
        } else {
            match kind {
                BackendKind::EtcdV3 => self.factory.new_standard_etcd_v3(machines),
                BackendKind::EtcdV2 => self.factory.new_standard_etcd(machines),
                BackendKind::Consul => self.factory.new_standard_consul(machines),
            }
        };

        Ok(manager?)
    }
}
