// ABOUTME: Chooses where snapshots are loaded from at startup and where each save goes.
// ABOUTME: Saves try the primary backend, then fall back to the local file; both failing is fatal.

use std::sync::Arc;

use bookstay_core::Snapshot;
use thiserror::Error;

use crate::backend::DurableStore;

/// Fatal persistence failures surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("failed to load snapshot from {backend}: {reason}")]
    Load { backend: String, reason: String },

    #[error("snapshot save failed on every backend: {}", .failures.join("; "))]
    AllBackendsFailed { failures: Vec<String> },

    #[error("snapshot writer is not running")]
    WriterClosed,
}

/// Owns the configured backends and applies the load and save fallback rules.
/// The remote backend, when configured, is primary; the local file is always
/// the last resort.
pub struct PersistenceCoordinator {
    remote: Option<Arc<dyn DurableStore>>,
    local: Arc<dyn DurableStore>,
}

impl PersistenceCoordinator {
    pub fn new(remote: Option<Arc<dyn DurableStore>>, local: Arc<dyn DurableStore>) -> Self {
        Self { remote, local }
    }

    pub fn local_only(local: Arc<dyn DurableStore>) -> Self {
        Self::new(None, local)
    }

    /// Name of the backend saves go to first.
    pub fn primary_name(&self) -> &str {
        self.remote
            .as_ref()
            .map_or_else(|| self.local.name(), |remote| remote.name())
    }

    /// Backends in the order a save tries them.
    fn save_chain(&self) -> impl Iterator<Item = &Arc<dyn DurableStore>> {
        self.remote.iter().chain(std::iter::once(&self.local))
    }

    /// Load the snapshot to start from.
    ///
    /// Remote errors and an absent remote document fall through to the local
    /// file. No stored data anywhere starts the marketplace empty. A local file
    /// that exists but cannot be read is an error.
    pub async fn load_at_startup(&self) -> Result<Snapshot, StorageError> {
        if let Some(remote) = &self.remote {
            match remote.load_snapshot().await {
                Ok(Some(snapshot)) => {
                    tracing::info!(backend = remote.name(), "loaded snapshot");
                    return Ok(snapshot);
                }
                Ok(None) => {
                    tracing::info!(
                        backend = remote.name(),
                        "no stored snapshot, trying {}",
                        self.local.name()
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        backend = remote.name(),
                        "snapshot load failed, trying {}: {}",
                        self.local.name(),
                        e
                    );
                }
            }
        }

        match self.local.load_snapshot().await {
            Ok(Some(snapshot)) => {
                tracing::info!(backend = self.local.name(), "loaded snapshot");
                Ok(snapshot)
            }
            Ok(None) => {
                tracing::info!("no stored snapshot found, starting empty");
                Ok(Snapshot::empty())
            }
            Err(e) => {
                tracing::error!(backend = self.local.name(), "snapshot load failed: {}", e);
                Err(StorageError::Load {
                    backend: self.local.name().to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Write the full snapshot, falling back one hop to the local file.
    pub async fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let mut failures = Vec::new();

        for (attempt, backend) in self.save_chain().enumerate() {
            match backend.save_snapshot(snapshot).await {
                Ok(()) => {
                    if attempt > 0 {
                        tracing::warn!(backend = backend.name(), "snapshot saved to fallback backend");
                    }
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(backend = backend.name(), "snapshot save failed: {}", e);
                    failures.push(format!("{}: {}", backend.name(), e));
                }
            }
        }

        tracing::error!("snapshot could not be saved to any backend");
        Err(StorageError::AllBackendsFailed { failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::LocalFileStore;
    use crate::testing::{FailingStore, MemoryStore};
    use bookstay_core::{Account, MarketStore};
    use tempfile::TempDir;

    fn snapshot_with_account(email: &str) -> Snapshot {
        let mut store = MarketStore::new();
        store.insert_account(
            email.to_string(),
            Account::new("Ann".to_string(), "pw".to_string()),
        );
        store.snapshot()
    }

    #[tokio::test]
    async fn failed_primary_save_falls_back_to_local_file() {
        let dir = TempDir::new().unwrap();
        let local = Arc::new(LocalFileStore::new(dir.path().join("database.json")));
        let coordinator = PersistenceCoordinator::new(
            Some(Arc::new(FailingStore::new("remote-kv"))),
            local.clone(),
        );
        let snapshot = snapshot_with_account("a@x.com");

        coordinator.save(&snapshot).await.unwrap();

        let on_disk = local.load_snapshot().await.unwrap().expect("fallback file");
        assert_eq!(on_disk, snapshot);
    }

    #[tokio::test]
    async fn healthy_primary_is_the_only_write() {
        let remote = Arc::new(MemoryStore::new());
        let local = Arc::new(MemoryStore::new());
        let coordinator = PersistenceCoordinator::new(Some(remote.clone()), local.clone());

        coordinator.save(&snapshot_with_account("a@x.com")).await.unwrap();

        assert_eq!(remote.save_count(), 1);
        assert_eq!(local.save_count(), 0);
        assert_eq!(coordinator.primary_name(), "memory");
    }

    #[tokio::test]
    async fn both_backends_failing_is_fatal() {
        let coordinator = PersistenceCoordinator::new(
            Some(Arc::new(FailingStore::new("remote-kv"))),
            Arc::new(FailingStore::new("local-file")),
        );

        let err = coordinator.save(&Snapshot::empty()).await.unwrap_err();
        match err {
            StorageError::AllBackendsFailed { failures } => {
                assert_eq!(failures.len(), 2);
                assert!(failures[0].starts_with("remote-kv"));
                assert!(failures[1].starts_with("local-file"));
            }
            other => panic!("expected AllBackendsFailed, got: {}", other),
        }
    }

    #[tokio::test]
    async fn local_only_failure_is_fatal_after_one_attempt() {
        let coordinator =
            PersistenceCoordinator::local_only(Arc::new(FailingStore::new("local-file")));

        let err = coordinator.save(&Snapshot::empty()).await.unwrap_err();
        assert!(
            matches!(err, StorageError::AllBackendsFailed { ref failures } if failures.len() == 1)
        );
    }

    #[tokio::test]
    async fn startup_prefers_remote_snapshot() {
        let remote = Arc::new(MemoryStore::with_snapshot(snapshot_with_account("remote@x.com")));
        let local = Arc::new(MemoryStore::with_snapshot(snapshot_with_account("local@x.com")));
        let coordinator = PersistenceCoordinator::new(Some(remote), local);

        let snapshot = coordinator.load_at_startup().await.unwrap();
        assert!(snapshot.users.contains("remote@x.com"));
    }

    #[tokio::test]
    async fn startup_falls_back_when_remote_fails_or_is_empty() {
        let local = Arc::new(MemoryStore::with_snapshot(snapshot_with_account("local@x.com")));

        let failing = PersistenceCoordinator::new(
            Some(Arc::new(FailingStore::new("remote-kv"))),
            local.clone(),
        );
        assert!(failing.load_at_startup().await.unwrap().users.contains("local@x.com"));

        let empty = PersistenceCoordinator::new(Some(Arc::new(MemoryStore::new())), local);
        assert!(empty.load_at_startup().await.unwrap().users.contains("local@x.com"));
    }

    #[tokio::test]
    async fn startup_with_nothing_stored_is_empty() {
        let dir = TempDir::new().unwrap();
        let coordinator = PersistenceCoordinator::local_only(Arc::new(LocalFileStore::new(
            dir.path().join("database.json"),
        )));

        assert!(coordinator.load_at_startup().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreadable_local_file_fails_startup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("database.json");
        std::fs::write(&path, "not json").unwrap();
        let coordinator = PersistenceCoordinator::local_only(Arc::new(LocalFileStore::new(path)));

        let err = coordinator.load_at_startup().await.unwrap_err();
        assert!(matches!(err, StorageError::Load { ref backend, .. } if backend == "local-file"));
    }
}
