//! # genopipe-blob: sequential-streaming blob storage for genomics pipelines
//!
//! `genopipe-blob` gives streaming consumers a narrow view of cloud object
//! storage: forward-only reads and atomic commit-on-success writes. There is
//! deliberately no seek, no range re-read, and no in-place modification —
//! the same constraints the object stores themselves impose — so anything
//! built on top of this crate is guaranteed to work against arbitrarily
//! large objects without buffering them in memory.
//!
//! ## Key properties
//!
//! - **Forward-only reads**: `open_read` hands back a chunked byte stream;
//!   once a chunk is consumed it cannot be re-read.
//! - **Atomic writes**: bytes pushed through a [`BlobWriter`] are invisible
//!   at the destination key until `commit` succeeds. Abandoning or aborting
//!   a writer publishes nothing.
//! - **Backend agnostic**: [`BlobStore`] is a trait; the crate ships an
//!   S3-compatible backend and an in-memory backend for tests.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use genopipe_blob::prelude::*;
//! use bytes::Bytes;
//! use futures_util::StreamExt;
//!
//! # async fn example() -> BlobResult<()> {
//! let store = genopipe_blob::MemoryBlobStore::new();
//!
//! let mut writer = store.open_write("bucket", "sample.vcf.gz").await?;
//! writer.write(Bytes::from_static(b"##fileformat=VCFv4.2\n")).await?;
//! writer.commit().await?;
//!
//! let mut stream = store.open_read("bucket", "sample.vcf.gz").await?;
//! while let Some(chunk) = stream.next().await {
//!     let chunk = chunk?;
//!     // feed the chunk to a downstream consumer
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod memory;
mod retry;
mod s3;
pub mod store;
mod types;

pub use config::{BlobConfig, RetryPolicy};
pub use error::{BlobError, BlobResult};
pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;
pub use store::{BlobStore, BlobWriter};
pub use types::{ByteStream, ObjectHead, PutOutcome};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{BlobConfig, BlobError, BlobResult, BlobStore, BlobWriter, ByteStream};
}
