use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use genopipe_blob::BlobStore;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bridge::{self, BridgeFailure, BridgeHandle, BridgeOutcome};
use crate::fifo::{self, FifoEndpoint};
use crate::{BridgeConfig, PipeError, PipeResult};

/// One-shot approval for a gated writer bridge. The bridge drains its pipe
/// to EOF and then waits for the verdict: `approve` commits the destination
/// object, `reject` (or dropping the gate) aborts it.
pub struct CommitGate {
    tx: oneshot::Sender<bool>,
}

impl CommitGate {
    pub fn approve(self) {
        let _ = self.tx.send(true);
    }

    pub fn reject(self) {
        let _ = self.tx.send(false);
    }
}

/// Creates and tracks bridge workers, and guarantees teardown: after
/// `close_all` returns, every worker has reached a terminal state, every
/// FIFO endpoint is gone from disk, and no blob write is left
/// half-committed.
///
/// One supervisor scopes one job; concurrent jobs each get their own
/// supervisor (endpoint paths are uuid-generated, so scratch roots may be
/// shared).
pub struct BridgeSupervisor {
    store: Arc<dyn BlobStore>,
    config: BridgeConfig,
    scratch: PathBuf,
    workers: Mutex<HashMap<PathBuf, BridgeHandle>>,
    failure_tx: mpsc::UnboundedSender<BridgeFailure>,
    failure_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<BridgeFailure>>,
}

impl BridgeSupervisor {
    /// Create a supervisor with its own scratch subdirectory
    pub fn new(store: Arc<dyn BlobStore>, config: BridgeConfig) -> PipeResult<Self> {
        let scratch = config
            .scratch_dir
            .join(format!("genopipe-{}", Uuid::new_v4().simple()));
        std::fs::create_dir_all(&scratch)?;

        let (failure_tx, failure_rx) = mpsc::unbounded_channel();
        Ok(Self {
            store,
            config,
            scratch,
            workers: Mutex::new(HashMap::new()),
            failure_tx,
            failure_rx: tokio::sync::Mutex::new(failure_rx),
        })
    }

    /// Directory holding this supervisor's FIFO endpoints
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch
    }

    /// Start a reader bridge for `bucket`/`key` and return its endpoint
    /// path. Returns immediately; blocking happens when something opens the
    /// path for reading.
    pub fn open_reader(&self, bucket: &str, key: &str) -> PipeResult<PathBuf> {
        let endpoint = self.new_endpoint()?;
        let path = endpoint.path().to_path_buf();
        let handle = bridge::spawn_reader(
            self.store.clone(),
            bucket.to_string(),
            key.to_string(),
            endpoint,
            self.failure_tx.clone(),
        );
        self.workers.lock().insert(path.clone(), handle);
        info!(bucket, key, path = ?path, "opened reader bridge");
        Ok(path)
    }

    /// Start a writer bridge that commits on clean EOF
    pub fn open_writer(&self, bucket: &str, key: &str) -> PipeResult<PathBuf> {
        self.spawn_writer(bucket, key, None)
    }

    /// Start a writer bridge whose commit requires explicit approval
    pub fn open_gated_writer(
        &self,
        bucket: &str,
        key: &str,
    ) -> PipeResult<(PathBuf, CommitGate)> {
        let (tx, rx) = oneshot::channel();
        let path = self.spawn_writer(bucket, key, Some(rx))?;
        Ok((path, CommitGate { tx }))
    }

    fn spawn_writer(
        &self,
        bucket: &str,
        key: &str,
        gate: Option<oneshot::Receiver<bool>>,
    ) -> PipeResult<PathBuf> {
        let endpoint = self.new_endpoint()?;
        let path = endpoint.path().to_path_buf();
        let handle = bridge::spawn_writer(
            self.store.clone(),
            bucket.to_string(),
            key.to_string(),
            endpoint,
            self.config.chunk_size,
            gate,
            self.failure_tx.clone(),
        );
        self.workers.lock().insert(path.clone(), handle);
        info!(bucket, key, path = ?path, "opened writer bridge");
        Ok(path)
    }

    fn new_endpoint(&self) -> PipeResult<FifoEndpoint> {
        // Recreate lazily so a supervisor stays usable after close_all.
        std::fs::create_dir_all(&self.scratch)?;
        FifoEndpoint::create_in(&self.scratch)
    }

    /// Interrupt a bridge and wait for it to terminate. The endpoint is
    /// removed before this returns, even if no peer ever attached.
    pub async fn close(&self, path: &Path) -> PipeResult<BridgeOutcome> {
        let handle = self
            .workers
            .lock()
            .remove(path)
            .ok_or_else(|| PipeError::unknown_endpoint(path))?;
        Self::shutdown(handle).await
    }

    /// Wait for a bridge that is expected to terminate on its own, without
    /// interrupting it. Used for gated writers once their verdict has been
    /// delivered.
    pub async fn finish(&self, path: &Path) -> PipeResult<BridgeOutcome> {
        let handle = self
            .workers
            .lock()
            .remove(path)
            .ok_or_else(|| PipeError::unknown_endpoint(path))?;
        handle.join().await
    }

    /// Tear down every live bridge and collect their outcomes. Endpoints
    /// are removed even for workers interrupted mid-transfer.
    pub async fn close_all(&self) -> Vec<(PathBuf, PipeResult<BridgeOutcome>)> {
        let handles: Vec<(PathBuf, BridgeHandle)> =
            self.workers.lock().drain().collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (path, handle) in handles {
            outcomes.push((path, Self::shutdown(handle).await));
        }

        // Scratch subdirectory is empty once every endpoint is gone.
        if let Err(err) = std::fs::remove_dir(&self.scratch) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(scratch = ?self.scratch, error = %err, "failed to remove scratch directory");
            }
        }
        outcomes
    }

    /// Await the next worker failure notification. Pends while all workers
    /// are healthy.
    pub async fn next_failure(&self) -> Option<BridgeFailure> {
        self.failure_rx.lock().await.recv().await
    }

    /// Discard failure notifications left over from previously closed
    /// bridges, so a fresh job starts with a clean slate.
    pub(crate) async fn drain_failures(&self) {
        let mut rx = self.failure_rx.lock().await;
        while rx.try_recv().is_ok() {}
    }

    async fn shutdown(handle: BridgeHandle) -> PipeResult<BridgeOutcome> {
        debug!(path = ?handle.path(), direction = %handle.direction(), "shutting down bridge");
        handle.cancel();
        // Release a worker parked in a blocking FIFO open.
        fifo::unblock(handle.path());
        handle.join().await
    }
}

impl Drop for BridgeSupervisor {
    fn drop(&mut self) {
        // Workers own their endpoints and unlink them as they wind down;
        // here we only make sure none of them stays parked forever.
        let workers = self.workers.lock();
        for handle in workers.values() {
            handle.cancel();
            fifo::unblock(handle.path());
        }
    }
}
