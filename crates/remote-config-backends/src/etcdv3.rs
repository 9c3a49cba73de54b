//! etcd v3 client over the JSON gRPC gateway
//!
//! The gateway base64-encodes keys and values and renders int64 fields as
//! strings. Watches are a single streaming `POST /v3/watch` whose body is a
//! sequence of newline-delimited JSON frames.

use crate::config::BackendConfig;
use crate::error::{BackendError, BackendResult};
use crate::machines::{check_status, Machines};
use crate::traits::{BackendResponse, ConfigManager, StopSignal};
use crate::watch::{spawn_watch, WatchSource};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::json;
use std::collections::VecDeque;
use tokio::sync::mpsc;

#[derive(Debug, Deserialize)]
struct RangeResponse {
    #[serde(default)]
    kvs: Vec<KeyValue>,
}

#[derive(Debug, Deserialize)]
struct KeyValue {
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    mod_revision: Option<String>,
}

impl KeyValue {
    fn decoded_value(&self) -> BackendResult<Vec<u8>> {
        match &self.value {
            Some(v) => Ok(STANDARD.decode(v)?),
            None => Ok(Vec::new()),
        }
    }

    fn revision(&self) -> Option<i64> {
        self.mod_revision.as_deref().and_then(|r| r.parse().ok())
    }
}

#[derive(Debug, Deserialize)]
struct WatchFrame {
    #[serde(default)]
    result: Option<WatchResult>,
    #[serde(default)]
    error: Option<GatewayError>,
}

#[derive(Debug, Deserialize)]
struct WatchResult {
    #[serde(default)]
    events: Vec<WatchEvent>,
    #[serde(default)]
    canceled: bool,
    #[serde(default)]
    cancel_reason: Option<String>,
    #[serde(default)]
    compact_revision: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WatchEvent {
    #[serde(default)]
    kv: Option<KeyValue>,
}

#[derive(Debug, Deserialize)]
struct GatewayError {
    #[serde(default)]
    http_code: Option<u16>,
    #[serde(default)]
    message: String,
}

/// Client for the etcd v3 API via its JSON gateway
#[derive(Debug, Clone)]
pub struct EtcdV3Client {
    http: reqwest::Client,
    machines: Machines,
    config: BackendConfig,
}

impl EtcdV3Client {
    /// Create a client for the given machines
    pub fn new(machines: Vec<String>, config: BackendConfig) -> BackendResult<Self> {
        let machines = Machines::parse(&machines)?;
        let http = config.http_client()?;
        Ok(Self {
            http,
            machines,
            config,
        })
    }

    async fn open_watch(&self, key: &str, start_revision: Option<i64>) -> BackendResult<reqwest::Response> {
        let mut create = json!({ "key": STANDARD.encode(key) });
        if let Some(revision) = start_revision {
            create["start_revision"] = json!(revision);
        }
        let body = json!({ "create_request": create });

        let response = self
            .machines
            .send(|base| self.http.post(format!("{}/v3/watch", base)).json(&body))
            .await?;
        check_status(response, key).await
    }
}

#[async_trait::async_trait]
impl ConfigManager for EtcdV3Client {
    async fn get(&self, path: &str) -> BackendResult<Vec<u8>> {
        let body = json!({ "key": STANDARD.encode(path) });
        let response = self
            .machines
            .send(|base| {
                self.http
                    .post(format!("{}/v3/kv/range", base))
                    .json(&body)
                    .timeout(self.config.request_timeout)
            })
            .await?;

        let range: RangeResponse = check_status(response, path).await?.json().await?;
        match range.kvs.first() {
            Some(kv) => kv.decoded_value(),
            None => Err(BackendError::KeyNotFound(path.to_string())),
        }
    }

    fn watch(&self, path: &str, stop: StopSignal) -> mpsc::Receiver<BackendResponse> {
        let source = EtcdV3Watch::new(self.clone(), path.to_string());
        spawn_watch(source, stop, self.config.retry_delay)
    }
}

/// Streaming watch state
///
/// `pending` holds values and errors in the order the server sent them, so
/// an error in a chunk is only reported after the events that preceded it.
struct EtcdV3Watch {
    client: EtcdV3Client,
    key: String,
    stream: Option<reqwest::Response>,
    buffer: Vec<u8>,
    pending: VecDeque<BackendResult<Vec<u8>>>,
    next_revision: Option<i64>,
}

impl EtcdV3Watch {
    fn new(client: EtcdV3Client, key: String) -> Self {
        Self {
            client,
            key,
            stream: None,
            buffer: Vec::new(),
            pending: VecDeque::new(),
            next_revision: None,
        }
    }

    fn reset_stream(&mut self) {
        self.stream = None;
        self.buffer.clear();
    }

    /// Parse every complete line in the buffer into pending results
    ///
    /// Returns `true` when the stream can no longer be used: the server
    /// reported an error, cancelled the watch or sent a frame that does not
    /// parse. The error is queued behind the events that came before it.
    fn drain_frames(&mut self) -> bool {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let frame: WatchFrame = match serde_json::from_str(line) {
                Ok(frame) => frame,
                Err(e) => {
                    self.pending.push_back(Err(e.into()));
                    return true;
                }
            };
            if let Some(err) = frame.error {
                self.pending.push_back(Err(BackendError::Status {
                    status: err.http_code.unwrap_or(500),
                    body: err.message,
                }));
                return true;
            }

            let Some(result) = frame.result else { continue };
            for event in &result.events {
                if let Some(kv) = &event.kv {
                    if let Some(revision) = kv.revision() {
                        self.next_revision = Some(revision + 1);
                    }
                    self.pending.push_back(kv.decoded_value());
                }
            }
            if result.canceled {
                // A compacted start revision is rejected on every reconnect;
                // resume from the oldest revision the server still keeps.
                if let Some(compacted) = result
                    .compact_revision
                    .as_deref()
                    .and_then(|r| r.parse::<i64>().ok())
                    .filter(|r| *r > 0)
                {
                    self.next_revision = Some(compacted);
                }
                self.pending.push_back(Err(BackendError::WatchInterrupted(
                    result.cancel_reason.unwrap_or_else(|| "watch canceled".to_string()),
                )));
                return true;
            }
        }
        false
    }
}

#[async_trait::async_trait]
impl WatchSource for EtcdV3Watch {
    fn backend(&self) -> &'static str {
        "etcdv3"
    }

    async fn next_value(&mut self) -> BackendResult<Option<Vec<u8>>> {
        if let Some(next) = self.pending.pop_front() {
            return next.map(Some);
        }

        if self.stream.is_none() {
            let response = self.client.open_watch(&self.key, self.next_revision).await?;
            self.stream = Some(response);
        }

        let chunk = match self.stream.as_mut() {
            Some(stream) => stream.chunk().await,
            None => return Ok(None),
        };

        match chunk {
            Ok(Some(bytes)) => {
                self.buffer.extend_from_slice(&bytes);
                if self.drain_frames() {
                    self.reset_stream();
                }
                self.pending.pop_front().transpose()
            }
            Ok(None) => {
                self.reset_stream();
                Err(BackendError::WatchInterrupted(
                    "stream closed by server".to_string(),
                ))
            }
            Err(e) => {
                self.reset_stream();
                Err(e.into())
            }
        }
    }
}
