use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{PipeError, PipeResult};

/// The external sorted-merge capability. Implementations read each input
/// path as a separate sequential stream and write the merged result to the
/// output path; the returned result is the authoritative success signal.
///
/// The reference implementation shells out to `bcftools`; tests substitute
/// in-process engines.
#[async_trait]
pub trait MergeEngine: Send + Sync {
    async fn run(&self, inputs: &[PathBuf], output: &Path) -> PipeResult<()>;
}

/// Streaming merge via `bcftools merge --no-index`. Record semantics
/// (genotype merging, allele reconciliation) are entirely bcftools'
/// business; this only manages the process.
#[derive(Debug, Clone)]
pub struct BcftoolsMerge {
    binary: PathBuf,
    threads: usize,
}

impl BcftoolsMerge {
    pub fn new() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            binary: PathBuf::from("bcftools"),
            threads: 2 * cores,
        }
    }

    /// Use a specific bcftools binary instead of resolving from PATH
    pub fn with_binary<P: Into<PathBuf>>(mut self, binary: P) -> Self {
        self.binary = binary.into();
        self
    }

    /// Override the worker thread count passed to bcftools
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }
}

impl Default for BcftoolsMerge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MergeEngine for BcftoolsMerge {
    async fn run(&self, inputs: &[PathBuf], output: &Path) -> PipeResult<()> {
        let mut command = Command::new(&self.binary);
        command
            .arg("merge")
            .arg("--no-index")
            .arg("-o")
            .arg(output)
            .arg("-O")
            .arg("z")
            .arg("--threads")
            .arg(self.threads.to_string())
            .args(inputs)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            // Dropping the run future (e.g. when a bridge fails first)
            // must take the tool down with it.
            .kill_on_drop(true);

        debug!(binary = ?self.binary, inputs = inputs.len(), ?output, "launching merge tool");

        let child = command.spawn().map_err(|source| PipeError::ToolSpawn {
            program: self.binary.display().to_string(),
            source,
        })?;

        // Stderr is captured for diagnostics only, never parsed for
        // control decisions.
        let finished = child.wait_with_output().await?;
        if finished.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&finished.stderr).trim().to_string();
            warn!(status = ?finished.status.code(), %stderr, "merge tool failed");
            Err(PipeError::ToolFailed {
                status: finished.status.code(),
                stderr,
            })
        }
    }
}
