//! Consul KV client
//!
//! Keys are read from `/v1/kv/{key}` (leading slashes are stripped, as Consul
//! keys are relative). Watches use blocking queries: each request carries the
//! last seen `X-Consul-Index` and Consul holds it open until the key changes
//! or the wait expires.

use crate::config::BackendConfig;
use crate::error::{BackendError, BackendResult};
use crate::machines::{check_status, Machines};
use crate::traits::{BackendResponse, ConfigManager, StopSignal};
use crate::watch::{spawn_watch, WatchSource};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use tokio::sync::mpsc;

const INDEX_HEADER: &str = "X-Consul-Index";
const TOKEN_HEADER: &str = "X-Consul-Token";

#[derive(Debug, Deserialize)]
struct KvPair {
    #[serde(rename = "Value", default)]
    value: Option<String>,
    #[serde(rename = "ModifyIndex", default)]
    modify_index: u64,
}

/// Client for the Consul KV store
#[derive(Debug, Clone)]
pub struct ConsulClient {
    http: reqwest::Client,
    machines: Machines,
    config: BackendConfig,
}

impl ConsulClient {
    /// Create a client for the given agents
    ///
    /// Addresses without a scheme (`127.0.0.1:8500`) default to `http://`.
    pub fn new(machines: Vec<String>, config: BackendConfig) -> BackendResult<Self> {
        let machines = Machines::parse(&machines)?;
        let http = config.http_client()?;
        Ok(Self {
            http,
            machines,
            config,
        })
    }

    fn kv_request(&self, base: &str, key: &str) -> reqwest::RequestBuilder {
        let request = self
            .http
            .get(format!("{}/v1/kv/{}", base, key.trim_start_matches('/')));
        match &self.config.consul_token {
            Some(token) => request.header(TOKEN_HEADER, token),
            None => request,
        }
    }

    /// Decode the first pair of a KV response and return it with the index
    async fn read_pair(response: reqwest::Response, key: &str) -> BackendResult<(Vec<u8>, u64)> {
        let response = check_status(response, key).await?;
        let header_index = response
            .headers()
            .get(INDEX_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let pairs: Vec<KvPair> = response.json().await?;
        let pair = pairs
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::KeyNotFound(key.to_string()))?;

        let value = match pair.value {
            Some(v) => STANDARD.decode(v)?,
            None => Vec::new(),
        };
        Ok((value, header_index.unwrap_or(pair.modify_index)))
    }
}

#[async_trait::async_trait]
impl ConfigManager for ConsulClient {
    async fn get(&self, path: &str) -> BackendResult<Vec<u8>> {
        let response = self
            .machines
            .send(|base| self.kv_request(base, path).timeout(self.config.request_timeout))
            .await?;
        let (value, _) = Self::read_pair(response, path).await?;
        Ok(value)
    }

    fn watch(&self, path: &str, stop: StopSignal) -> mpsc::Receiver<BackendResponse> {
        let source = ConsulWatch {
            client: self.clone(),
            key: path.to_string(),
            index: 0,
        };
        spawn_watch(source, stop, self.config.retry_delay)
    }
}

struct ConsulWatch {
    client: ConsulClient,
    key: String,
    index: u64,
}

#[async_trait::async_trait]
impl WatchSource for ConsulWatch {
    fn backend(&self) -> &'static str {
        "consul"
    }

    async fn next_value(&mut self) -> BackendResult<Option<Vec<u8>>> {
        let client = &self.client;
        let key = self.key.as_str();
        let index = self.index;
        let wait = format!("{}s", client.config.consul_wait.as_secs().max(1));

        let response = client
            .machines
            .send(|base| {
                let request = client.kv_request(base, key);
                if index > 0 {
                    request.query(&[("index", index.to_string()), ("wait", wait.clone())])
                } else {
                    request
                }
            })
            .await?;

        let (value, new_index) = ConsulClient::read_pair(response, key).await?;
        if new_index == index {
            // The blocking query timed out without a change.
            return Ok(None);
        }
        // An index that moves backwards means the raft state was reset.
        self.index = if new_index < index { 0 } else { new_index };
        Ok(Some(value))
    }
}
