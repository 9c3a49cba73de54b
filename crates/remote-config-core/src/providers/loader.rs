//! Remote Config Loader
//!
//! The host side of the remote-provider contract. A loader holds a list of
//! provider descriptors and an injected [`RemoteConfigFactory`], and reads
//! from the descriptors in the order they were added until one succeeds.
//!
//! # Example
//!
//! ```rust,ignore
//! use remote_config_core::providers::{RemoteConfigAdapter, RemoteConfigLoader};
//! use std::sync::Arc;
//!
//! let mut loader = RemoteConfigLoader::new(Arc::new(RemoteConfigAdapter::from_env()));
//! loader.add_remote_provider("etcd", "http://10.0.0.1:2379", "/config/app.json")?;
//! loader.add_secure_remote_provider("consul", "10.0.0.5:8500", "app/config.json", "/etc/app/keyring")?;
//!
//! // First provider to return configuration wins
//! let reader = loader.read_remote_config().await?;
//! ```

use super::descriptor::RemoteProviderSpec;
use super::traits::{
    ConfigReader, ProviderError, ProviderResult, RemoteConfigFactory, RemoteProvider,
};
use super::watch::WatchHandle;
use std::fmt;
use std::sync::Arc;

/// Provider kinds accepted by [`RemoteConfigLoader`]
pub const SUPPORTED_REMOTE_PROVIDERS: &[&str] = &["etcd", "etcdv3", "etcd3", "consul"];

/// Ordered list of remote sources read through an injected factory
pub struct RemoteConfigLoader {
    factory: Arc<dyn RemoteConfigFactory>,
    providers: Vec<RemoteProviderSpec>,
}

impl fmt::Debug for RemoteConfigLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfigLoader")
            .field("providers", &self.providers)
            .finish_non_exhaustive()
    }
}

impl RemoteConfigLoader {
    /// Create a loader with no providers
    pub fn new(factory: Arc<dyn RemoteConfigFactory>) -> Self {
        Self {
            factory,
            providers: Vec::new(),
        }
    }

    /// Register a source whose values are stored unencrypted
    pub fn add_remote_provider(
        &mut self,
        provider: &str,
        endpoint: &str,
        path: &str,
    ) -> ProviderResult<()> {
        self.add(RemoteProviderSpec::new(provider, endpoint, path))
    }

    /// Register a source whose values are encrypted with the keyring at `secret_keyring`
    pub fn add_secure_remote_provider(
        &mut self,
        provider: &str,
        endpoint: &str,
        path: &str,
        secret_keyring: &str,
    ) -> ProviderResult<()> {
        self.add(RemoteProviderSpec::new(provider, endpoint, path).with_secret_keyring(secret_keyring))
    }

    /// Register a prebuilt descriptor, e.g. one deserialized from a config file
    pub fn add(&mut self, mut spec: RemoteProviderSpec) -> ProviderResult<()> {
        spec.provider = spec.provider.to_ascii_lowercase();

        if !SUPPORTED_REMOTE_PROVIDERS.contains(&spec.provider.as_str()) {
            return Err(ProviderError::Configuration(format!(
                "unsupported remote provider: {}",
                spec.provider
            )));
        }
        if spec.endpoint.is_empty() {
            return Err(ProviderError::Configuration(
                "remote provider endpoint must not be empty".to_string(),
            ));
        }
        if self
            .providers
            .iter()
            .any(|p| p.endpoint == spec.endpoint && p.path == spec.path)
        {
            return Err(ProviderError::Configuration(format!(
                "remote provider already registered: {} {}",
                spec.endpoint, spec.path
            )));
        }

        tracing::debug!(
            provider = %spec.provider,
            endpoint = %spec.endpoint,
            path = %spec.path,
            "Added remote config provider"
        );
        self.providers.push(spec);
        Ok(())
    }

    /// Registered descriptors in priority order
    pub fn providers(&self) -> &[RemoteProviderSpec] {
        &self.providers
    }

    /// Fetch configuration from the first provider that answers
    pub async fn read_remote_config(&self) -> ProviderResult<ConfigReader> {
        for rp in &self.providers {
            match self.factory.get(rp).await {
                Ok(reader) => return Ok(reader),
                Err(e) => log_failure(rp, "get", &e),
            }
        }
        Err(ProviderError::NoRemoteConfig)
    }

    /// Wait for the next change on the first provider that answers
    pub async fn watch_remote_config(&self) -> ProviderResult<ConfigReader> {
        for rp in &self.providers {
            match self.factory.watch(rp).await {
                Ok(reader) => return Ok(reader),
                Err(e) => log_failure(rp, "watch", &e),
            }
        }
        Err(ProviderError::NoRemoteConfig)
    }

    /// Open a change stream on the first provider that accepts one
    pub async fn watch_remote_config_on_channel(&self) -> ProviderResult<WatchHandle> {
        for rp in &self.providers {
            match self.factory.watch_channel(rp).await {
                Ok(handle) => return Ok(handle),
                Err(e) => log_failure(rp, "watch_channel", &e),
            }
        }
        Err(ProviderError::NoRemoteConfig)
    }
}

fn log_failure(rp: &RemoteProviderSpec, operation: &str, error: &ProviderError) {
    tracing::warn!(
        provider = rp.provider(),
        endpoint = rp.endpoint(),
        path = rp.path(),
        operation,
        error = %error,
        "Remote config provider failed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use remote_config_backends::BackendError;
    use std::io::Read;
    use std::sync::Mutex;

    /// Serves values by endpoint; endpoints starting with `down` fail
    #[derive(Default)]
    struct FakeFactory {
        calls: Mutex<Vec<String>>,
    }

    impl FakeFactory {
        fn answer(&self, rp: &dyn RemoteProvider) -> ProviderResult<ConfigReader> {
            self.calls.lock().unwrap().push(rp.endpoint().to_string());
            if rp.endpoint().starts_with("down") {
                return Err(BackendError::KeyNotFound(rp.path().to_string()).into());
            }
            Ok(ConfigReader::new(
                format!("{}:{}", rp.endpoint(), rp.secret_keyring()).into_bytes(),
            ))
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteConfigFactory for FakeFactory {
        async fn get(&self, rp: &dyn RemoteProvider) -> ProviderResult<ConfigReader> {
            self.answer(rp)
        }

        async fn watch(&self, rp: &dyn RemoteProvider) -> ProviderResult<ConfigReader> {
            self.answer(rp)
        }

        async fn watch_channel(&self, rp: &dyn RemoteProvider) -> ProviderResult<WatchHandle> {
            self.answer(rp)?;
            Err(ProviderError::Configuration("channels not served".into()))
        }
    }

    fn read_all(mut reader: ConfigReader) -> String {
        let mut text = String::new();
        reader.read_to_string(&mut text).unwrap();
        text
    }

    #[test]
    fn test_add_validates_descriptors() {
        let mut loader = RemoteConfigLoader::new(Arc::new(FakeFactory::default()));

        loader.add_remote_provider("ETCD", "http://a:2379", "/cfg").unwrap();
        loader.add_remote_provider("etcd3", "http://b:2379", "/cfg").unwrap();
        loader
            .add_secure_remote_provider("Consul", "c:8500", "cfg", "/keyring")
            .unwrap();

        let kinds: Vec<_> = loader.providers().iter().map(|p| p.provider.as_str()).collect();
        assert_eq!(kinds, vec!["etcd", "etcd3", "consul"]);
        assert_eq!(loader.providers()[2].secret_keyring, "/keyring");

        assert!(matches!(
            loader.add_remote_provider("zookeeper", "z:2181", "/cfg"),
            Err(ProviderError::Configuration(_))
        ));
        assert!(matches!(
            loader.add_remote_provider("etcd", "", "/cfg"),
            Err(ProviderError::Configuration(_))
        ));
        assert!(matches!(
            loader.add_remote_provider("etcdv3", "http://a:2379", "/cfg"),
            Err(ProviderError::Configuration(ref m)) if m.contains("already registered")
        ));
        assert_eq!(loader.providers().len(), 3);
    }

    #[tokio::test]
    async fn test_read_returns_first_success() {
        let factory = Arc::new(FakeFactory::default());
        let mut loader = RemoteConfigLoader::new(Arc::clone(&factory) as Arc<dyn RemoteConfigFactory>);
        loader.add_remote_provider("etcd", "down-1", "/cfg").unwrap();
        loader.add_secure_remote_provider("consul", "up-1", "cfg", "/k").unwrap();
        loader.add_remote_provider("consul", "up-2", "cfg").unwrap();

        let reader = loader.read_remote_config().await.unwrap();
        assert_eq!(read_all(reader), "up-1:/k");
        assert_eq!(factory.calls(), vec!["down-1", "up-1"]);

        let reader = loader.watch_remote_config().await.unwrap();
        assert_eq!(read_all(reader), "up-1:/k");
    }

    #[tokio::test]
    async fn test_no_remote_config() {
        let factory = Arc::new(FakeFactory::default());
        let mut loader = RemoteConfigLoader::new(Arc::clone(&factory) as Arc<dyn RemoteConfigFactory>);

        assert!(matches!(loader.read_remote_config().await, Err(ProviderError::NoRemoteConfig)));

        loader.add_remote_provider("etcd", "down-1", "/cfg").unwrap();
        loader.add_remote_provider("etcd", "down-2", "/cfg").unwrap();
        assert!(matches!(loader.watch_remote_config().await, Err(ProviderError::NoRemoteConfig)));
        assert!(matches!(
            loader.watch_remote_config_on_channel().await,
            Err(ProviderError::NoRemoteConfig)
        ));
        assert_eq!(factory.calls().len(), 4);
    }

    #[test]
    fn test_specs_from_toml() {
        #[derive(serde::Deserialize)]
        struct HostConfig {
            remote: Vec<RemoteProviderSpec>,
        }

        let config: HostConfig = toml::from_str(
            r#"
            [[remote]]
            provider = "etcdv3"
            endpoint = "http://10.0.0.1:2379"
            path = "/config/app.json"

            [[remote]]
            provider = "consul"
            endpoint = "10.0.0.5:8500"
            path = "app/config.json"
            secret_keyring = "/etc/app/keyring"
            "#,
        )
        .unwrap();

        let mut loader = RemoteConfigLoader::new(Arc::new(FakeFactory::default()));
        for spec in config.remote {
            loader.add(spec).unwrap();
        }
        assert_eq!(loader.providers().len(), 2);
        assert!(loader.providers()[0].secret_keyring.is_empty());
    }
}
