//! Decrypting wrapper around any backend client

use crate::error::BackendResult;
use crate::keyring::Keyring;
use crate::traits::{BackendResponse, ConfigManager, StopSignal};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A [`ConfigManager`] whose stored values are encrypted with a [`Keyring`]
///
/// `get` results and every watch value are decrypted before they are
/// returned. Watch errors pass through untouched; a value that fails to
/// decrypt is reported as an error notification and the watch continues.
pub struct SecureConfigManager {
    inner: Box<dyn ConfigManager>,
    keyring: Arc<Keyring>,
}

impl SecureConfigManager {
    /// Wrap `inner`, decrypting its values with `keyring`
    pub fn new(inner: impl ConfigManager + 'static, keyring: Keyring) -> Self {
        Self::from_boxed(Box::new(inner), keyring)
    }

    /// Wrap an already boxed client
    pub fn from_boxed(inner: Box<dyn ConfigManager>, keyring: Keyring) -> Self {
        Self {
            inner,
            keyring: Arc::new(keyring),
        }
    }
}

impl std::fmt::Debug for SecureConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureConfigManager")
            .field("keyring", &self.keyring)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl ConfigManager for SecureConfigManager {
    async fn get(&self, path: &str) -> BackendResult<Vec<u8>> {
        let sealed = self.inner.get(path).await?;
        self.keyring.decrypt(&sealed)
    }

    fn watch(&self, path: &str, stop: StopSignal) -> mpsc::Receiver<BackendResponse> {
        let mut sealed = self.inner.watch(path, stop);
        let keyring = Arc::clone(&self.keyring);
        let (tx, rx) = mpsc::channel(1);

        // Ends when the inner watch stops or our receiver is dropped; dropping
        // `sealed` in turn lets the inner watch observe the closed channel.
        tokio::spawn(async move {
            while let Some(response) = sealed.recv().await {
                let decrypted = match response.error {
                    Some(err) => BackendResponse::error(err),
                    None => match keyring.decrypt(&response.value) {
                        Ok(value) => BackendResponse::value(value),
                        Err(err) => BackendResponse::error(err),
                    },
                };
                if tx.send(decrypted).await.is_err() {
                    break;
                }
            }
        });

        rx
    }
}
