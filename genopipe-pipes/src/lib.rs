//! # genopipe-pipes: blob-to-FIFO bridges and indexless VCF combine
//!
//! Cloud object storage only offers non-seekable, read-or-write-only
//! blobs; ordinary genomics tools expect file paths they can open and
//! stream through. This crate bridges the two: background workers relay
//! bytes between a blob stream and a named pipe, so any sequential-I/O
//! tool can consume or produce cloud data without knowing about network
//! storage. On top of the bridges sits `combine_vcfs`, which merges N
//! chromosome-sorted variant streams into one destination object using
//! only forward, single-pass streaming — no random-access index required.
//!
//! ## Key properties
//!
//! - **Bounded memory**: FIFO backpressure stalls a bridge instead of
//!   buffering; object size never matters.
//! - **No leakage**: every endpoint is created and unlinked exactly once,
//!   on worker termination — success, error, or teardown.
//! - **Atomic results**: the destination object of a combine either holds
//!   the complete merge or does not exist; partial output is never
//!   committed.
//! - **Opaque merge tool**: the actual sorted-merge is delegated to a
//!   [`MergeEngine`] (bcftools by default); its exit status is the
//!   authoritative success signal.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use genopipe_pipes::prelude::*;
//! use genopipe_pipes::{BcftoolsMerge, CombineRequest};
//!
//! # async fn example() -> PipeResult<()> {
//! let store = Arc::new(genopipe_blob::S3BlobStore::from_env(Default::default()).await);
//! let supervisor = BridgeSupervisor::new(store, BridgeConfig::default())?;
//!
//! let request = CombineRequest::new(
//!     "cohort-uploads",
//!     vec!["sample-a/chr1.vcf.gz".into(), "sample-b/chr1.vcf.gz".into()],
//!     "cohort-merged",
//!     "merged/chr1.vcf.gz",
//! );
//! let report = combine_vcfs(&supervisor, &BcftoolsMerge::new(), &request).await?;
//! println!("merged {} bytes", report.bytes_written);
//! # Ok(())
//! # }
//! ```
//!
//! Bridges are also usable on their own: `open_reader` hands back a path
//! any tool can treat as a plain file, and `close` tears it down without
//! leaking the endpoint, even if nothing ever attached.

mod bridge;
mod config;
mod engine;
mod error;
mod fifo;
mod merge;
mod supervisor;

pub use bridge::{BridgeFailure, BridgeOutcome};
pub use config::BridgeConfig;
pub use engine::{BcftoolsMerge, MergeEngine};
pub use error::{PipeError, PipeResult};
pub use fifo::PipeDirection;
pub use merge::{combine_vcfs, CombineReport, CombineRequest};
pub use supervisor::{BridgeSupervisor, CommitGate};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        combine_vcfs, BridgeConfig, BridgeOutcome, BridgeSupervisor, MergeEngine, PipeError,
        PipeResult,
    };
}
