//! The client surface every backend implements

use crate::error::{BackendError, BackendResult};
use tokio::sync::{mpsc, oneshot};

/// Stop signal handed to [`ConfigManager::watch`]
///
/// Sending `()` (or dropping the sender) ends the watch.
pub type StopSignal = oneshot::Receiver<()>;

/// A single watch notification: either a value or an error
#[derive(Debug)]
pub struct BackendResponse {
    pub value: Vec<u8>,
    pub error: Option<BackendError>,
}

impl BackendResponse {
    /// A notification carrying a new value
    pub fn value(value: Vec<u8>) -> Self {
        Self { value, error: None }
    }

    /// A notification carrying an error
    pub fn error(error: BackendError) -> Self {
        Self {
            value: Vec::new(),
            error: Some(error),
        }
    }

    /// Convert into a `Result`, preferring the error when one is set
    pub fn into_result(self) -> BackendResult<Vec<u8>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.value),
        }
    }
}

/// A client for one remote key-value store
///
/// Implementations are cheap to construct and hold no state between calls
/// beyond connection pools. Values are returned exactly as stored (or as
/// decrypted, for [`SecureConfigManager`](crate::SecureConfigManager)).
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait::async_trait]
pub trait ConfigManager: Send + Sync {
    /// Fetch the value stored at `path`
    async fn get(&self, path: &str) -> BackendResult<Vec<u8>>;

    /// Watch `path` for changes
    ///
    /// Returns a stream of notifications delivered in the order the backend
    /// reports them. Errors are sent as notifications and the watch keeps
    /// going; the stream only ends once `stop` fires or the receiver is
    /// dropped.
    fn watch(&self, path: &str, stop: StopSignal) -> mpsc::Receiver<BackendResponse>;
}
