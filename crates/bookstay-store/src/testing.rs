// ABOUTME: In-memory and always-failing DurableStore implementations for tests.
// ABOUTME: Used to simulate backend outages without a network or a read-only filesystem.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bookstay_core::Snapshot;

use crate::backend::{BackendError, DurableStore};

/// Keeps the last saved snapshot in memory and counts saves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<Snapshot>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `snapshot` already stored.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            saves: AtomicUsize::new(0),
        }
    }

    /// The most recently stored snapshot.
    pub fn stored(&self) -> Option<Snapshot> {
        self.snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn load_snapshot(&self) -> Result<Option<Snapshot>, BackendError> {
        Ok(self.stored())
    }

    async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), BackendError> {
        *self
            .snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Fails every load and save, standing in for an unreachable backend.
#[derive(Debug, Clone)]
pub struct FailingStore {
    name: String,
}

impl FailingStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
        }
    }
}

#[async_trait]
impl DurableStore for FailingStore {
    async fn load_snapshot(&self) -> Result<Option<Snapshot>, BackendError> {
        Err(BackendError::Rejected(format!("{} is unavailable", self.name)))
    }

    async fn save_snapshot(&self, _snapshot: &Snapshot) -> Result<(), BackendError> {
        Err(BackendError::Rejected(format!("{} is unavailable", self.name)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
