//! Backend client configuration
//!
//! Values can be set directly through the `with_*` builders or loaded from
//! environment variables with [`BackendConfig::from_env`].

use std::time::Duration;

/// Environment variable for the per-request timeout, in seconds
pub const ENV_REQUEST_TIMEOUT: &str = "REMOTE_CONFIG_REQUEST_TIMEOUT_SECS";
/// Environment variable for the delay between failed watch attempts, in seconds
pub const ENV_RETRY_DELAY: &str = "REMOTE_CONFIG_RETRY_DELAY_SECS";
/// Environment variable for the Consul blocking query wait, in seconds
pub const ENV_CONSUL_WAIT: &str = "REMOTE_CONFIG_CONSUL_WAIT_SECS";
/// Environment variable holding the Consul ACL token
pub const ENV_CONSUL_TOKEN: &str = "CONSUL_HTTP_TOKEN";

/// Configuration shared by all backend clients
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Timeout applied to one-shot requests. Watch requests are long polls
    /// and only use the connect timeout.
    pub request_timeout: Duration,
    /// Connect timeout for every request
    pub connect_timeout: Duration,
    /// Delay before a watch retries after an error
    pub retry_delay: Duration,
    /// Maximum time a Consul blocking query may wait for a change
    pub consul_wait: Duration,
    /// Consul ACL token, sent as `X-Consul-Token`
    pub consul_token: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            retry_delay: Duration::from_secs(5),
            consul_wait: Duration::from_secs(300),
            consul_token: None,
        }
    }
}

impl BackendConfig {
    /// Load configuration from environment variables
    ///
    /// Reads:
    /// - REMOTE_CONFIG_REQUEST_TIMEOUT_SECS: one-shot request timeout
    /// - REMOTE_CONFIG_RETRY_DELAY_SECS: watch retry delay
    /// - REMOTE_CONFIG_CONSUL_WAIT_SECS: Consul blocking query wait
    /// - CONSUL_HTTP_TOKEN: Consul ACL token
    ///
    /// Unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            request_timeout: secs_from_env(ENV_REQUEST_TIMEOUT).unwrap_or(defaults.request_timeout),
            retry_delay: secs_from_env(ENV_RETRY_DELAY).unwrap_or(defaults.retry_delay),
            consul_wait: secs_from_env(ENV_CONSUL_WAIT).unwrap_or(defaults.consul_wait),
            consul_token: std::env::var(ENV_CONSUL_TOKEN).ok().filter(|t| !t.is_empty()),
            ..defaults
        }
    }

    /// Set the one-shot request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the watch retry delay
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the Consul blocking query wait
    pub fn with_consul_wait(mut self, wait: Duration) -> Self {
        self.consul_wait = wait;
        self
    }

    /// Set the Consul ACL token
    pub fn with_consul_token(mut self, token: impl Into<String>) -> Self {
        self.consul_token = Some(token.into());
        self
    }

    /// Build the HTTP client used by every backend
    pub(crate) fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .build()
    }
}

fn secs_from_env(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BackendConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.retry_delay, Duration::from_secs(5));
        assert_eq!(config.consul_wait, Duration::from_secs(300));
        assert!(config.consul_token.is_none());
    }

    #[test]
    fn test_config_from_env() {
        std::env::set_var(ENV_REQUEST_TIMEOUT, "12");
        std::env::set_var(ENV_RETRY_DELAY, "not-a-number");
        std::env::set_var(ENV_CONSUL_WAIT, "60");
        std::env::set_var(ENV_CONSUL_TOKEN, "acl-token");

        let config = BackendConfig::from_env();

        assert_eq!(config.request_timeout, Duration::from_secs(12));
        assert_eq!(config.retry_delay, Duration::from_secs(5));
        assert_eq!(config.consul_wait, Duration::from_secs(60));
        assert_eq!(config.consul_token.as_deref(), Some("acl-token"));

        std::env::remove_var(ENV_REQUEST_TIMEOUT);
        std::env::remove_var(ENV_RETRY_DELAY);
        std::env::remove_var(ENV_CONSUL_WAIT);
        std::env::remove_var(ENV_CONSUL_TOKEN);
    }

    #[test]
    fn test_builders() {
        let config = BackendConfig::default()
            .with_request_timeout(Duration::from_secs(1))
            .with_retry_delay(Duration::from_millis(50))
            .with_consul_wait(Duration::from_secs(2))
            .with_consul_token("t");

        assert_eq!(config.request_timeout, Duration::from_secs(1));
        assert_eq!(config.retry_delay, Duration::from_millis(50));
        assert_eq!(config.consul_wait, Duration::from_secs(2));
        assert_eq!(config.consul_token.as_deref(), Some("t"));
    }
}
