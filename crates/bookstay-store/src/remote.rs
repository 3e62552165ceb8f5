// ABOUTME: Remote key-value backend speaking the Upstash/Vercel KV REST dialect over reqwest.
// ABOUTME: The whole snapshot is stored as a JSON string under a single key.

use std::time::Duration;

use async_trait::async_trait;
use bookstay_core::Snapshot;
use serde::Deserialize;
use serde_json::Value;

use crate::backend::{BackendError, DurableStore};

/// Default key the snapshot is stored under.
pub const DEFAULT_KEY: &str = "store";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Body returned by every KV REST command.
#[derive(Debug, Deserialize)]
struct KvResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Stores the snapshot in a hosted key-value database.
pub struct RemoteKvStore {
    client: reqwest::Client,
    base_url: String,
    token: String,
    key: String,
}

impl RemoteKvStore {
    pub fn new(base_url: String, token: String, key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            key,
        }
    }

    /// `{base_url}/{command}/{key}`, with the key percent-encoded as a single
    /// path segment.
    fn command_url(&self, command: &str) -> Result<reqwest::Url, BackendError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| BackendError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .push(command)
            .push(&self.key);
        Ok(url)
    }

    async fn read_response(resp: reqwest::Response) -> Result<KvResponse, BackendError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json::<KvResponse>().await?)
    }
}

/// Interpret a GET reply. The value is normally the snapshot serialized to a
/// string; an inline JSON object is accepted as well.
fn decode_get(reply: KvResponse) -> Result<Option<Snapshot>, BackendError> {
    if let Some(error) = reply.error {
        return Err(BackendError::Rejected(error));
    }
    match reply.result {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => Ok(Some(serde_json::from_str(&raw)?)),
        Some(other) => Ok(Some(serde_json::from_value(other)?)),
    }
}

fn check_set(reply: KvResponse) -> Result<(), BackendError> {
    if let Some(error) = reply.error {
        return Err(BackendError::Rejected(error));
    }
    match reply.result {
        Some(Value::String(ref ok)) if ok == "OK" => Ok(()),
        other => Err(BackendError::Rejected(format!(
            "unexpected SET result: {:?}",
            other
        ))),
    }
}

#[async_trait]
impl DurableStore for RemoteKvStore {
    async fn load_snapshot(&self) -> Result<Option<Snapshot>, BackendError> {
        let resp = self
            .client
            .get(self.command_url("get")?)
            .bearer_auth(&self.token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        decode_get(Self::read_response(resp).await?)
    }

    async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), BackendError> {
        let body = serde_json::to_string(snapshot)?;
        let resp = self
            .client
            .post(self.command_url("set")?)
            .bearer_auth(&self.token)
            .timeout(REQUEST_TIMEOUT)
            .body(body)
            .send()
            .await?;

        check_set(Self::read_response(resp).await?)?;
        tracing::debug!(key = %self.key, "wrote snapshot to remote store");
        Ok(())
    }

    fn name(&self) -> &str {
        "remote-kv"
    }
}
