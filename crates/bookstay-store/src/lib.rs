// ABOUTME: Persistence layer for bookstay: durable snapshot backends and the coordinator choosing between them.
// ABOUTME: Provides the remote KV backend, the local JSON file backend, fallback rules, and the ordered writer task.

pub mod backend;
pub mod coordinator;
pub mod file;
pub mod remote;
pub mod testing;
pub mod writer;

pub use backend::{BackendError, DurableStore};
pub use coordinator::{PersistenceCoordinator, StorageError};
pub use file::{DEFAULT_DATA_FILE, LocalFileStore};
pub use remote::{DEFAULT_KEY, RemoteKvStore};
pub use writer::{PendingSave, SnapshotWriter};
