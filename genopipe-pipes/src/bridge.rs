use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::BytesMut;
use futures_util::StreamExt;
use genopipe_blob::BlobStore;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::fifo::{FifoEndpoint, PipeDirection};
use crate::{PipeError, PipeResult};

/// Terminal state of a bridge worker that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// The source was exhausted (reader) or the peer closed cleanly and the
    /// destination was committed (writer)
    Completed { bytes: u64 },
    /// Teardown interrupted the transfer; writers have aborted, nothing
    /// was committed
    Cancelled { bytes: u64 },
}

impl BridgeOutcome {
    pub fn bytes(&self) -> u64 {
        match self {
            Self::Completed { bytes } | Self::Cancelled { bytes } => *bytes,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Notification that a worker terminated with an error. The error itself is
/// collected when the worker is joined; this only identifies the endpoint.
#[derive(Debug, Clone)]
pub struct BridgeFailure {
    pub path: PathBuf,
    pub direction: PipeDirection,
}

/// Handle to a running bridge worker. Owns the cancellation token; the
/// worker owns the endpoint and removes it on termination, whatever the
/// cause.
pub struct BridgeHandle {
    path: PathBuf,
    direction: PipeDirection,
    token: CancellationToken,
    task: JoinHandle<PipeResult<BridgeOutcome>>,
}

impl BridgeHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn direction(&self) -> PipeDirection {
        self.direction
    }

    /// Request cancellation. The worker stops copying at the next loop
    /// iteration; an in-flight storage call may still run to completion.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait for the worker to reach a terminal state
    pub async fn join(self) -> PipeResult<BridgeOutcome> {
        match self.task.await {
            Ok(result) => result,
            Err(_) => Err(PipeError::worker_lost(&self.path)),
        }
    }
}

/// Spawn a reader bridge: blob → pipe. The returned handle is live
/// immediately; the worker blocks opening the pipe's write side until a
/// consumer opens the path for reading.
pub(crate) fn spawn_reader(
    store: Arc<dyn BlobStore>,
    bucket: String,
    key: String,
    endpoint: FifoEndpoint,
    failure_tx: mpsc::UnboundedSender<BridgeFailure>,
) -> BridgeHandle {
    let token = CancellationToken::new();
    let path = endpoint.path().to_path_buf();

    let task = tokio::spawn({
        let token = token.clone();
        let path = path.clone();
        async move {
            let result = run_reader(store, &bucket, &key, &endpoint, &token).await;
            match &result {
                Ok(outcome) => debug!(?path, ?outcome, "reader bridge finished"),
                Err(err) => {
                    error!(?path, bucket, key, error = %err, "reader bridge failed");
                    // Note first, then unlink: observers must learn of the
                    // failure no later than the endpoint's disappearance.
                    let _ = failure_tx.send(BridgeFailure {
                        path: path.clone(),
                        direction: PipeDirection::Read,
                    });
                }
            }
            // Release any peer still parked in open before the entry goes
            // away; unlinking alone would leave it parked forever.
            crate::fifo::unblock(endpoint.path());
            endpoint.remove();
            result
        }
    });

    BridgeHandle {
        path,
        direction: PipeDirection::Read,
        token,
        task,
    }
}

/// Spawn a writer bridge: pipe → blob. With a commit gate attached the
/// drained object is only committed once the gate is approved; without one
/// it commits on clean EOF.
pub(crate) fn spawn_writer(
    store: Arc<dyn BlobStore>,
    bucket: String,
    key: String,
    endpoint: FifoEndpoint,
    chunk_size: usize,
    gate: Option<oneshot::Receiver<bool>>,
    failure_tx: mpsc::UnboundedSender<BridgeFailure>,
) -> BridgeHandle {
    let token = CancellationToken::new();
    let path = endpoint.path().to_path_buf();

    let task = tokio::spawn({
        let token = token.clone();
        let path = path.clone();
        async move {
            let result = run_writer(store, &bucket, &key, &endpoint, chunk_size, gate, &token).await;
            match &result {
                Ok(outcome) => debug!(?path, ?outcome, "writer bridge finished"),
                Err(err) => {
                    error!(?path, bucket, key, error = %err, "writer bridge failed");
                    let _ = failure_tx.send(BridgeFailure {
                        path: path.clone(),
                        direction: PipeDirection::Write,
                    });
                }
            }
            crate::fifo::unblock(endpoint.path());
            endpoint.remove();
            result
        }
    });

    BridgeHandle {
        path,
        direction: PipeDirection::Write,
        token,
        task,
    }
}

/// Open one end of a FIFO, cancellably. The blocking open runs on the
/// blocking pool; teardown releases a parked open via `fifo::unblock`.
async fn open_fifo(
    path: &Path,
    write_end: bool,
    token: &CancellationToken,
) -> PipeResult<tokio::fs::File> {
    let owned = path.to_path_buf();
    let open = tokio::task::spawn_blocking(move || {
        let mut options = std::fs::OpenOptions::new();
        if write_end {
            options.write(true);
        } else {
            options.read(true);
        }
        options.open(&owned)
    });

    tokio::select! {
        biased;
        res = open => match res {
            Ok(Ok(file)) => Ok(tokio::fs::File::from_std(file)),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(PipeError::worker_lost(path)),
        },
        _ = token.cancelled() => Err(PipeError::Cancelled),
    }
}

/// Reader copy loop: pull chunks from the blob stream and push them into
/// the pipe until the blob is exhausted. Closing the write end on the way
/// out is the consumer's end-of-file signal.
async fn run_reader(
    store: Arc<dyn BlobStore>,
    bucket: &str,
    key: &str,
    endpoint: &FifoEndpoint,
    token: &CancellationToken,
) -> PipeResult<BridgeOutcome> {
    // Open the blob first so a missing object fails fast, before anything
    // can block on the pipe.
    let mut stream = store.open_read(bucket, key).await?;

    let mut file = match open_fifo(endpoint.path(), true, token).await {
        Ok(file) => file,
        Err(PipeError::Cancelled) => return Ok(BridgeOutcome::Cancelled { bytes: 0 }),
        Err(err) => return Err(err),
    };

    let mut bytes = 0u64;
    loop {
        let chunk = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(BridgeOutcome::Cancelled { bytes }),
            chunk = stream.next() => chunk,
        };

        let data = match chunk {
            None => break,
            Some(Ok(data)) => data,
            Some(Err(err)) => return Err(err.into()),
        };

        // A full pipe stalls here until the consumer drains it; that
        // backpressure is what bounds memory use.
        let written = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(BridgeOutcome::Cancelled { bytes }),
            res = file.write_all(&data) => res,
        };
        if let Err(err) = written {
            if token.is_cancelled() {
                return Ok(BridgeOutcome::Cancelled { bytes });
            }
            if err.kind() == std::io::ErrorKind::BrokenPipe {
                return Err(PipeError::peer_disconnected(endpoint.path()));
            }
            return Err(err.into());
        }
        bytes += data.len() as u64;
    }

    // Close the write end now: the consumer observes EOF.
    let file = file.into_std().await;
    drop(file);

    Ok(BridgeOutcome::Completed { bytes })
}

/// Writer copy loop: drain the pipe into the blob writer, then commit on
/// clean EOF (subject to the commit gate). Any error aborts the blob write
/// so no partial object is ever published.
async fn run_writer(
    store: Arc<dyn BlobStore>,
    bucket: &str,
    key: &str,
    endpoint: &FifoEndpoint,
    chunk_size: usize,
    mut gate: Option<oneshot::Receiver<bool>>,
    token: &CancellationToken,
) -> PipeResult<BridgeOutcome> {
    let mut blob = store.open_write(bucket, key).await?;

    // A verdict that lands while no producer has attached means the job is
    // already over and this pipe was never opened; waiting on the open any
    // longer would hang the finalize path.
    let opened = match gate.as_mut() {
        Some(verdict) => tokio::select! {
            biased;
            res = open_fifo(endpoint.path(), false, token) => Some(res),
            _ = verdict => None,
        },
        None => Some(open_fifo(endpoint.path(), false, token).await),
    };
    let Some(opened) = opened else {
        let _ = blob.abort().await;
        return Ok(BridgeOutcome::Cancelled { bytes: 0 });
    };
    let mut file = match opened {
        Ok(file) => file,
        Err(PipeError::Cancelled) => {
            let _ = blob.abort().await;
            return Ok(BridgeOutcome::Cancelled { bytes: 0 });
        }
        Err(err) => {
            let _ = blob.abort().await;
            return Err(err);
        }
    };

    // An open released during teardown is not a real producer; without
    // this check the unblocking peer would read as an instant EOF and a
    // bogus empty object would be committed.
    if token.is_cancelled() {
        let _ = blob.abort().await;
        return Ok(BridgeOutcome::Cancelled { bytes: 0 });
    }

    let mut bytes = 0u64;
    loop {
        let mut buf = BytesMut::with_capacity(chunk_size);
        // Drain-first: once the peer has closed, the buffered tail and the
        // EOF must win over a racing cancellation so committed objects are
        // never truncated.
        let read = tokio::select! {
            biased;
            res = file.read_buf(&mut buf) => res,
            _ = token.cancelled() => {
                let _ = blob.abort().await;
                return Ok(BridgeOutcome::Cancelled { bytes });
            }
        };

        match read {
            Ok(0) => break,
            Ok(n) => {
                bytes += n as u64;
                if let Err(err) = blob.write(buf.freeze()).await {
                    let _ = blob.abort().await;
                    return Err(err.into());
                }
            }
            Err(err) => {
                let _ = blob.abort().await;
                return Err(err.into());
            }
        }
    }
    drop(file);

    let approved = match gate {
        None => true,
        Some(mut verdict) => tokio::select! {
            biased;
            decision = &mut verdict => decision.unwrap_or(false),
            _ = token.cancelled() => false,
        },
    };

    if approved {
        let outcome = blob.commit().await?;
        debug!(bucket, key, bytes = outcome.bytes_written, "writer bridge committed");
        Ok(BridgeOutcome::Completed { bytes })
    } else {
        let _ = blob.abort().await;
        Ok(BridgeOutcome::Cancelled { bytes })
    }
}
