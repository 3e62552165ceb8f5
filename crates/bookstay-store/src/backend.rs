// ABOUTME: Defines the DurableStore trait implemented by every persistence backend.
// ABOUTME: Also defines BackendError, the failure type a single backend can report.

use async_trait::async_trait;
use bookstay_core::Snapshot;
use thiserror::Error;

/// Errors a single backend can report for one load or save.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote store returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("remote store rejected the request: {0}")]
    Rejected(String),

    #[error("invalid remote store url: {0}")]
    InvalidUrl(String),
}

/// A place snapshots can be durably written to and read back from. Each save
/// replaces the whole stored document.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Read the stored snapshot. `Ok(None)` means nothing has been stored yet.
    async fn load_snapshot(&self) -> Result<Option<Snapshot>, BackendError>;

    /// Replace the stored snapshot with `snapshot`.
    async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), BackendError>;

    /// Backend name for logging (e.g. "remote-kv", "local-file").
    fn name(&self) -> &str;
}
