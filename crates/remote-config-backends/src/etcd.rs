//! etcd v2 client
//!
//! Reads go to `GET /v2/keys/{key}?quorum=true`. Watches use long polls with
//! `wait=true`, resuming from the last seen `modifiedIndex` so no change is
//! missed between polls.

use crate::config::BackendConfig;
use crate::error::{BackendError, BackendResult};
use crate::machines::{check_status, Machines};
use crate::traits::{BackendResponse, ConfigManager, StopSignal};
use crate::watch::{spawn_watch, WatchSource};
use serde::Deserialize;
use tokio::sync::mpsc;

/// etcd error code for a watch index that fell out of the event history
const EVENT_INDEX_CLEARED: u64 = 401;

#[derive(Debug, Deserialize)]
struct KeysResponse {
    node: Node,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Node {
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    dir: bool,
    #[serde(default)]
    modified_index: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EtcdErrorBody {
    error_code: u64,
    #[serde(default)]
    message: String,
}

/// Client for the etcd v2 keys API
#[derive(Debug, Clone)]
pub struct EtcdV2Client {
    http: reqwest::Client,
    machines: Machines,
    config: BackendConfig,
}

impl EtcdV2Client {
    /// Create a client for the given machines
    ///
    /// Fails if any machine address is not a valid http(s) URL.
    pub fn new(machines: Vec<String>, config: BackendConfig) -> BackendResult<Self> {
        let machines = Machines::parse(&machines)?;
        let http = config.http_client()?;
        Ok(Self {
            http,
            machines,
            config,
        })
    }

    fn keys_url(base: &str, key: &str) -> String {
        format!("{}/v2/keys/{}", base, key.trim_start_matches('/'))
    }

    async fn read_node(response: reqwest::Response, key: &str) -> BackendResult<Node> {
        let status = response.status();
        if status.is_client_error() && status != reqwest::StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<EtcdErrorBody>(&body) {
                Ok(err) if err.error_code == EVENT_INDEX_CLEARED => {
                    BackendError::WatchInterrupted(err.message)
                }
                _ => BackendError::Status {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        let response = check_status(response, key).await?;
        let keys: KeysResponse = response.json().await?;
        if keys.node.dir {
            return Err(BackendError::decode(format!("{} is a directory", key)));
        }
        Ok(keys.node)
    }
}

#[async_trait::async_trait]
impl ConfigManager for EtcdV2Client {
    async fn get(&self, path: &str) -> BackendResult<Vec<u8>> {
        let response = self
            .machines
            .send(|base| {
                self.http
                    .get(Self::keys_url(base, path))
                    .query(&[("quorum", "true")])
                    .timeout(self.config.request_timeout)
            })
            .await?;

        let node = Self::read_node(response, path).await?;
        Ok(node.value.unwrap_or_default().into_bytes())
    }

    fn watch(&self, path: &str, stop: StopSignal) -> mpsc::Receiver<BackendResponse> {
        let source = EtcdV2Watch {
            client: self.clone(),
            key: path.to_string(),
            wait_index: None,
        };
        spawn_watch(source, stop, self.config.retry_delay)
    }
}

struct EtcdV2Watch {
    client: EtcdV2Client,
    key: String,
    wait_index: Option<u64>,
}

#[async_trait::async_trait]
impl WatchSource for EtcdV2Watch {
    fn backend(&self) -> &'static str {
        "etcd"
    }

    async fn next_value(&mut self) -> BackendResult<Option<Vec<u8>>> {
        let client = &self.client;
        let key = self.key.as_str();
        let wait_index = self.wait_index;

        let response = client
            .machines
            .send(|base| {
                let request = client
                    .http
                    .get(EtcdV2Client::keys_url(base, key))
                    .query(&[("wait", "true")]);
                match wait_index {
                    Some(index) => request.query(&[("waitIndex", index.to_string())]),
                    None => request,
                }
            })
            .await?;

        match EtcdV2Client::read_node(response, key).await {
            Ok(node) => {
                self.wait_index = Some(node.modified_index + 1);
                Ok(Some(node.value.unwrap_or_default().into_bytes()))
            }
            Err(e @ BackendError::WatchInterrupted(_)) => {
                // History was compacted past our index; resume from now.
                self.wait_index = None;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}
