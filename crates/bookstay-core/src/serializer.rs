// ABOUTME: Single-worker mutation serializer that owns the shared marketplace state.
// ABOUTME: Jobs run one at a time in submission order; each result travels back on a oneshot channel.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Errors raised by the serializer itself. Errors produced by a job are part
/// of the job's return value and pass through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializerError {
    #[error("serializer worker is not running")]
    Closed,
}

/// A queued critical section.
type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

/// Queue depth before submitters wait for the worker to catch up.
const QUEUE_DEPTH: usize = 64;

/// Handle for submitting critical sections against the state owned by the
/// worker. Cheap to clone; all clones feed the same FIFO queue.
pub struct Serializer<S> {
    job_tx: mpsc::Sender<Job<S>>,
}

impl<S> Clone for Serializer<S> {
    fn clone(&self) -> Self {
        Self {
            job_tx: self.job_tx.clone(),
        }
    }
}

impl<S: Send + 'static> Serializer<S> {
    /// Run `op` with exclusive access to the state and return its result.
    ///
    /// Jobs execute in the order they were submitted, never concurrently. `op`
    /// must not call back into the serializer: the worker is busy running it,
    /// so the nested call would wait forever.
    pub async fn with_exclusive_access<T, F>(&self, op: F) -> Result<T, SerializerError>
    where
        F: FnOnce(&mut S) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job<S> = Box::new(move |state| {
            // Ignore send error: the caller may have stopped waiting
            let _ = reply_tx.send(op(state));
        });

        self.job_tx
            .send(job)
            .await
            .map_err(|_| SerializerError::Closed)?;
        reply_rx.await.map_err(|_| SerializerError::Closed)
    }
}

/// Move `state` into a new worker task and return the handle that feeds it.
pub fn spawn<S: Send + 'static>(state: S) -> Serializer<S> {
    let (job_tx, job_rx) = mpsc::channel::<Job<S>>(QUEUE_DEPTH);

    let worker = Worker { state, job_rx };
    tokio::spawn(worker.run());

    Serializer { job_tx }
}

struct Worker<S> {
    state: S,
    job_rx: mpsc::Receiver<Job<S>>,
}

impl<S> Worker<S> {
    async fn run(mut self) {
        while let Some(job) = self.job_rx.recv().await {
            job(&mut self.state);
        }
        tracing::debug!("serializer worker stopped: all handles dropped");
    }
}
