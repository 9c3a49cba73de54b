//! Constructors for backend clients
//!
//! Each backend comes in a standard flavour, which returns values as stored,
//! and an encrypted flavour, which reads a keyring and decrypts every value.

use crate::config::BackendConfig;
use crate::consul::ConsulClient;
use crate::error::BackendResult;
use crate::etcd::EtcdV2Client;
use crate::etcdv3::EtcdV3Client;
use crate::keyring::Keyring;
use crate::secure::SecureConfigManager;
use crate::traits::ConfigManager;
use std::io::Read;

/// One constructor per backend kind, standard and encrypted
///
/// `machines` is the list of backend addresses. Encrypted constructors read
/// the whole keyring from `keyring` before returning; they never keep the
/// reader.
pub trait ConfigManagerFactory: Send + Sync {
    fn new_standard_etcd_v3(&self, machines: Vec<String>) -> BackendResult<Box<dyn ConfigManager>>;

    fn new_etcd_v3(
        &self,
        machines: Vec<String>,
        keyring: &mut dyn Read,
    ) -> BackendResult<Box<dyn ConfigManager>>;

    fn new_standard_etcd(&self, machines: Vec<String>) -> BackendResult<Box<dyn ConfigManager>>;

    fn new_etcd(
        &self,
        machines: Vec<String>,
        keyring: &mut dyn Read,
    ) -> BackendResult<Box<dyn ConfigManager>>;

    fn new_standard_consul(&self, machines: Vec<String>) -> BackendResult<Box<dyn ConfigManager>>;

    fn new_consul(
        &self,
        machines: Vec<String>,
        keyring: &mut dyn Read,
    ) -> BackendResult<Box<dyn ConfigManager>>;
}

/// Factory building the HTTP clients in this crate
#[derive(Debug, Clone, Default)]
pub struct HttpConfigManagerFactory {
    config: BackendConfig,
}

impl HttpConfigManagerFactory {
    /// Create a factory whose clients share `config`
    pub fn new(config: BackendConfig) -> Self {
        Self { config }
    }

    /// Create a factory configured from environment variables
    pub fn from_env() -> Self {
        Self::new(BackendConfig::from_env())
    }

    /// The configuration handed to every client
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn secure(
        inner: impl ConfigManager + 'static,
        keyring: &mut dyn Read,
    ) -> BackendResult<Box<dyn ConfigManager>> {
        let keyring = Keyring::from_reader(keyring)?;
        Ok(Box::new(SecureConfigManager::new(inner, keyring)))
    }
}

impl ConfigManagerFactory for HttpConfigManagerFactory {
    fn new_standard_etcd_v3(&self, machines: Vec<String>) -> BackendResult<Box<dyn ConfigManager>> {
        Ok(Box::new(EtcdV3Client::new(machines, self.config.clone())?))
    }

    fn new_etcd_v3(
        &self,
        machines: Vec<String>,
        keyring: &mut dyn Read,
    ) -> BackendResult<Box<dyn ConfigManager>> {
        Self::secure(EtcdV3Client::new(machines, self.config.clone())?, keyring)
    }

    fn new_standard_etcd(&self, machines: Vec<String>) -> BackendResult<Box<dyn ConfigManager>> {
        Ok(Box::new(EtcdV2Client::new(machines, self.config.clone())?))
    }

    fn new_etcd(
        &self,
        machines: Vec<String>,
        keyring: &mut dyn Read,
    ) -> BackendResult<Box<dyn ConfigManager>> {
        Self::secure(EtcdV2Client::new(machines, self.config.clone())?, keyring)
    }

    fn new_standard_consul(&self, machines: Vec<String>) -> BackendResult<Box<dyn ConfigManager>> {
        Ok(Box::new(ConsulClient::new(machines, self.config.clone())?))
    }

    fn new_consul(
        &self,
        machines: Vec<String>,
        keyring: &mut dyn Read,
    ) -> BackendResult<Box<dyn ConfigManager>> {
        Self::secure(ConsulClient::new(machines, self.config.clone())?, keyring)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;

    fn machines() -> Vec<String> {
        vec!["127.0.0.1:2379".to_string()]
    }

    #[test]
    fn test_standard_constructors() {
        let factory = HttpConfigManagerFactory::default();
        assert!(factory.new_standard_etcd_v3(machines()).is_ok());
        assert!(factory.new_standard_etcd(machines()).is_ok());
        assert!(factory.new_standard_consul(machines()).is_ok());
    }

    #[test]
    fn test_encrypted_constructors_read_keyring() {
        let factory = HttpConfigManagerFactory::default();
        let text = Keyring::generate().to_text();

        assert!(factory.new_etcd_v3(machines(), &mut text.as_bytes()).is_ok());
        assert!(factory.new_etcd(machines(), &mut text.as_bytes()).is_ok());
        assert!(factory.new_consul(machines(), &mut text.as_bytes()).is_ok());
    }

    #[test]
    fn test_encrypted_constructor_rejects_bad_keyring() {
        let factory = HttpConfigManagerFactory::default();
        let result = factory.new_consul(machines(), &mut "not a key".as_bytes());
        assert!(matches!(result, Err(BackendError::Keyring(_))));
    }

    #[test]
    fn test_constructor_rejects_bad_machine() {
        let factory = HttpConfigManagerFactory::default();
        let result = factory.new_standard_etcd(vec!["http://".to_string()]);
        assert!(matches!(result, Err(BackendError::InvalidEndpoint(_))));
    }
}
