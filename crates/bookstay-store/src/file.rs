// ABOUTME: Local JSON file backend holding the whole snapshot in one human-readable document.
// ABOUTME: Every save rewrites the file atomically (write to .tmp, fsync, rename).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bookstay_core::Snapshot;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::backend::{BackendError, DurableStore};

/// Default file name for the local snapshot document.
pub const DEFAULT_DATA_FILE: &str = "database.json";

/// Stores the snapshot as pretty-printed JSON at a fixed path.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    path: PathBuf,
}

impl LocalFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl DurableStore for LocalFileStore {
    /// A missing or blank file means no snapshot has been written yet.
    async fn load_snapshot(&self) -> Result<Option<Snapshot>, BackendError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(None);
        }

        let snapshot: Snapshot = serde_json::from_str(&contents)?;
        Ok(Some(snapshot))
    }

    /// Creates the parent directory if it does not exist.
    async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), BackendError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp_path = self.tmp_path();

        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp_path, &self.path).await?;

        tracing::debug!(path = %self.path.display(), bytes = json.len(), "wrote snapshot file");
        Ok(())
    }

    fn name(&self) -> &str {
        "local-file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookstay_core::{Account, MarketStore};
    use tempfile::TempDir;

    fn snapshot_with_account() -> Snapshot {
        let mut store = MarketStore::new();
        store.insert_account(
            "a@x.com".to_string(),
            Account::new("Ann".to_string(), "pw".to_string()),
        );
        store.snapshot()
    }

    #[tokio::test]
    async fn save_then_load_returns_same_snapshot() {
        let dir = TempDir::new().unwrap();
        let backend = LocalFileStore::new(dir.path().join("database.json"));
        let snapshot = snapshot_with_account();

        backend.save_snapshot(&snapshot).await.unwrap();
        let loaded = backend.load_snapshot().await.unwrap().expect("snapshot");

        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let backend = LocalFileStore::new(dir.path().join("absent.json"));

        assert!(backend.load_snapshot().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blank_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("database.json");
        std::fs::write(&path, "\n").unwrap();

        let backend = LocalFileStore::new(&path);
        assert!(backend.load_snapshot().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("database.json");
        std::fs::write(&path, "{\"users\": ").unwrap();

        let backend = LocalFileStore::new(&path);
        let err = backend.load_snapshot().await.unwrap_err();
        assert!(matches!(err, BackendError::Json(_)), "got: {}", err);
    }

    #[tokio::test]
    async fn save_rewrites_whole_document_and_leaves_no_tmp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("database.json");
        let backend = LocalFileStore::new(&path);

        backend.save_snapshot(&snapshot_with_account()).await.unwrap();
        backend.save_snapshot(&Snapshot::empty()).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"users": {}, "listings": {}, "bookings": {}})
        );
        assert!(!dir.path().join("nested").join("database.json.tmp").exists());
    }
}
