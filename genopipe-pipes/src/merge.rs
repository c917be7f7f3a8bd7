use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::bridge::BridgeFailure;
use crate::engine::MergeEngine;
use crate::fifo::PipeDirection;
use crate::supervisor::BridgeSupervisor;
use crate::{PipeError, PipeResult};

/// A combine job: merge N chromosome-sorted source objects into one
/// destination object. Key order defines merge input order; chromosome
/// alignment across sources is the caller's responsibility and is not
/// verified here.
#[derive(Debug, Clone)]
pub struct CombineRequest {
    pub src_bucket: String,
    pub src_keys: Vec<String>,
    pub dst_bucket: String,
    pub dst_key: String,
}

impl CombineRequest {
    pub fn new<B, D, K>(src_bucket: B, src_keys: Vec<String>, dst_bucket: D, dst_key: K) -> Self
    where
        B: Into<String>,
        D: Into<String>,
        K: Into<String>,
    {
        Self {
            src_bucket: src_bucket.into(),
            src_keys,
            dst_bucket: dst_bucket.into(),
            dst_key: dst_key.into(),
        }
    }

    /// Reject malformed jobs before any bridge or endpoint is created
    fn validate(&self) -> PipeResult<()> {
        if self.src_keys.is_empty() {
            return Err(PipeError::invalid_job("at least one source key is required"));
        }
        if self.src_bucket.is_empty() || self.dst_bucket.is_empty() {
            return Err(PipeError::invalid_job("bucket names must be non-empty"));
        }
        if self.dst_key.is_empty() || self.src_keys.iter().any(String::is_empty) {
            return Err(PipeError::invalid_job("object keys must be non-empty"));
        }
        if self.src_bucket == self.dst_bucket && self.src_keys.contains(&self.dst_key) {
            return Err(PipeError::invalid_job(
                "destination must be distinct from every source",
            ));
        }
        Ok(())
    }
}

/// Outcome of a successful combine
#[derive(Debug, Clone, Serialize)]
pub struct CombineReport {
    pub sources: usize,
    pub bytes_written: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Merge the given source objects into the destination object, streaming
/// everything through FIFO bridges and the merge engine.
///
/// Either the destination object contains the complete merge and `Ok` is
/// returned, or the job fails and the destination key is untouched — no
/// partial merge is ever visible. All resources (bridges, endpoints, the
/// tool process) are released before this returns.
#[instrument(skip(supervisor, engine, request), fields(sources = request.src_keys.len(), dst = %request.dst_key))]
pub async fn combine_vcfs(
    supervisor: &BridgeSupervisor,
    engine: &dyn MergeEngine,
    request: &CombineRequest,
) -> PipeResult<CombineReport> {
    request.validate()?;
    let started_at = Utc::now();

    let result = drive(supervisor, engine, request).await;
    if result.is_err() {
        // Whatever drive left behind: cancel, join, unlink.
        supervisor.close_all().await;
    }

    let bytes_written = result?;
    let report = CombineReport {
        sources: request.src_keys.len(),
        bytes_written,
        started_at,
        finished_at: Utc::now(),
    };
    info!(bytes = report.bytes_written, "combine succeeded");
    Ok(report)
}

enum Streamed {
    Tool(PipeResult<()>),
    Bridge(BridgeFailure),
}

async fn drive(
    supervisor: &BridgeSupervisor,
    engine: &dyn MergeEngine,
    request: &CombineRequest,
) -> PipeResult<u64> {
    // Initializing: one reader bridge per source, one gated writer for the
    // destination.
    supervisor.drain_failures().await;
    let mut inputs = Vec::with_capacity(request.src_keys.len());
    for key in &request.src_keys {
        inputs.push(supervisor.open_reader(&request.src_bucket, key)?);
    }
    let (output, gate) = supervisor.open_gated_writer(&request.dst_bucket, &request.dst_key)?;

    // Streaming: the tool and all bridges run concurrently. The first
    // bridge failure takes the tool down (kill_on_drop) so nothing hangs
    // waiting on a dead pipe.
    let streamed = tokio::select! {
        biased;
        // A bridge failure wins over a tool error it may have caused.
        Some(failure) = supervisor.next_failure() => Streamed::Bridge(failure),
        res = engine.run(&inputs, &output) => Streamed::Tool(res),
    };

    // Finalizing: join everything, decide the commit.
    match streamed {
        Streamed::Tool(Ok(())) => {
            // Every reader must have completed cleanly before the commit is
            // approved. An errored reader is obvious; a cancelled one means
            // the tool exited without consuming that source, and the
            // "successful" merge output cannot be trusted either way.
            let mut reader_error: Option<(PathBuf, PipeError)> = None;
            for path in &inputs {
                match supervisor.close(path).await {
                    Ok(outcome) if outcome.is_completed() => {}
                    Ok(_) => {
                        reader_error.get_or_insert((path.clone(), PipeError::Cancelled));
                    }
                    Err(err) => {
                        reader_error.get_or_insert((path.clone(), err));
                    }
                }
            }
            if let Some((path, err)) = reader_error {
                gate.reject();
                supervisor.close_all().await;
                return Err(PipeError::bridge_failed(path, PipeDirection::Read, err));
            }

            gate.approve();
            let outcome = supervisor
                .finish(&output)
                .await
                .map_err(|err| {
                    PipeError::bridge_failed(output.clone(), PipeDirection::Write, err)
                })?;
            supervisor.close_all().await;
            // A writer that never saw a producer aborts on the verdict and
            // reports itself cancelled; the tool exited 0 without producing
            // output, which is not a merge.
            if !outcome.is_completed() {
                return Err(PipeError::bridge_failed(
                    output,
                    PipeDirection::Write,
                    PipeError::Cancelled,
                ));
            }
            Ok(outcome.bytes())
        }
        Streamed::Tool(Err(err)) => {
            gate.reject();
            supervisor.close_all().await;
            Err(err)
        }
        Streamed::Bridge(failure) => {
            gate.reject();
            let outcomes = supervisor.close_all().await;
            let source = outcomes
                .into_iter()
                .find_map(|(path, result)| {
                    (path == failure.path).then_some(result.err()).flatten()
                })
                .unwrap_or(PipeError::Cancelled);
            Err(PipeError::bridge_failed(failure.path, failure.direction, source))
        }
    }
}
