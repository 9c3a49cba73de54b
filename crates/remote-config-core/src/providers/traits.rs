//! Core traits and types for remote configuration providers
//!
//! These define the surface the host library consumes: descriptor
//! accessors, the host response shape, and the three read operations.

use super::watch::WatchHandle;
use remote_config_backends::{BackendError, BackendResponse};
use std::fmt;
use std::io::Cursor;
use thiserror::Error;

/// Readable byte stream returned by one-shot reads
pub type ConfigReader = Cursor<Vec<u8>>;

/// Errors surfaced by remote providers
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The keyring file named by the descriptor could not be opened
    #[error("Failed to open secret keyring: {0}")]
    Keyring(#[source] std::io::Error),

    /// Construction, fetch or watch error from the backend, unchanged
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The backend watch ended before delivering a notification
    #[error("Watch closed before a notification arrived")]
    WatchClosed,

    /// None of the registered remote providers returned configuration
    #[error("No remote configuration found")]
    NoRemoteConfig,

    /// A descriptor was rejected by the loader
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// The backend error behind this error, if any
    pub fn backend(&self) -> Option<&BackendError> {
        match self {
            ProviderError::Backend(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Descriptor accessors for one remote configuration source
///
/// An empty `secret_keyring` means values are stored unencrypted.
pub trait RemoteProvider: Send + Sync + fmt::Debug {
    /// Backend kind: `etcd`, `etcdv3` or `consul`
    fn provider(&self) -> &str;

    /// Comma-separated backend addresses
    fn endpoint(&self) -> &str;

    /// Key holding the configuration
    fn path(&self) -> &str;

    /// Path to the keyring file, or empty
    fn secret_keyring(&self) -> &str;
}

/// A change notification as the host sees it
#[derive(Debug)]
pub struct RemoteResponse {
    pub value: Vec<u8>,
    pub error: Option<ProviderError>,
}

impl RemoteResponse {
    /// Convert into a `Result`, preferring the error when one is set
    pub fn into_result(self) -> ProviderResult<Vec<u8>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.value),
        }
    }
}

impl From<BackendResponse> for RemoteResponse {
    fn from(response: BackendResponse) -> Self {
        Self {
            value: response.value,
            error: response.error.map(ProviderError::Backend),
        }
    }
}

/// The remote-provider capability a host configuration library delegates to
#[async_trait::async_trait]
pub trait RemoteConfigFactory: Send + Sync {
    /// Fetch the configuration once
    async fn get(&self, rp: &dyn RemoteProvider) -> ProviderResult<ConfigReader>;

    /// Wait for the next change and return the new configuration
    async fn watch(&self, rp: &dyn RemoteProvider) -> ProviderResult<ConfigReader>;

    /// Stream every change until the returned handle is stopped or dropped
    async fn watch_channel(&self, rp: &dyn RemoteProvider) -> ProviderResult<WatchHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_translation_keeps_fields() {
        let ok = RemoteResponse::from(BackendResponse::value(vec![0, 159, 146, 150]));
        assert!(ok.error.is_none());
        assert_eq!(ok.value, vec![0, 159, 146, 150]);

        let err = RemoteResponse::from(BackendResponse::error(BackendError::KeyNotFound(
            "/app".into(),
        )));
        assert!(err.value.is_empty());
        assert!(matches!(
            err.error,
            Some(ProviderError::Backend(BackendError::KeyNotFound(ref k))) if k == "/app"
        ));
    }

    #[test]
    fn test_backend_error_is_transparent() {
        let err = ProviderError::from(BackendError::KeyNotFound("/app".into()));
        assert_eq!(err.to_string(), "Key not found: /app");
        assert!(err.backend().unwrap().is_not_found());
    }

    #[test]
    fn test_keyring_error_display() {
        let err = ProviderError::Keyring(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        ));
        assert!(err.to_string().contains("secret keyring"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
