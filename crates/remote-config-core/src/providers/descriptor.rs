//! Provider descriptors and backend kinds

use super::traits::RemoteProvider;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key-value store family targeted by a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    EtcdV2,
    EtcdV3,
    Consul,
}

impl BackendKind {
    /// Map a provider string onto a backend
    ///
    /// Matching is exact: `etcd` is etcd v2, `etcdv3` (or `etcd3`) is etcd v3,
    /// and anything else, including the empty string, is Consul.
    pub fn from_provider(provider: &str) -> Self {
        match provider {
            "etcd" => BackendKind::EtcdV2,
            "etcdv3" | "etcd3" => BackendKind::EtcdV3,
            _ => BackendKind::Consul,
        }
    }

    /// Canonical provider string
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::EtcdV2 => "etcd",
            BackendKind::EtcdV3 => "etcdv3",
            BackendKind::Consul => "consul",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owned descriptor for one remote configuration source
///
/// Deserializes from host configuration, e.g. in TOML:
///
/// ```toml
/// [[remote]]
/// provider = "consul"
/// endpoint = "10.0.0.5:8500,10.0.0.6:8500"
/// path = "services/api/config.yaml"
/// secret_keyring = "/etc/api/keyring"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteProviderSpec {
    pub provider: String,
    pub endpoint: String,
    pub path: String,
    #[serde(default)]
    pub secret_keyring: String,
}

impl RemoteProviderSpec {
    /// Create a descriptor for unencrypted values
    pub fn new(
        provider: impl Into<String>,
        endpoint: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            endpoint: endpoint.into(),
            path: path.into(),
            secret_keyring: String::new(),
        }
    }

    /// Set the keyring used to decrypt values
    pub fn with_secret_keyring(mut self, keyring: impl Into<String>) -> Self {
        self.secret_keyring = keyring.into();
        self
    }

    /// Backend this descriptor routes to
    pub fn kind(&self) -> BackendKind {
        BackendKind::from_provider(&self.provider)
    }
}

impl RemoteProvider for RemoteProviderSpec {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn secret_keyring(&self) -> &str {
        &self.secret_keyring
    }
}
