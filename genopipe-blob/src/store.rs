use async_trait::async_trait;
use bytes::Bytes;

use crate::{BlobResult, ByteStream, ObjectHead, PutOutcome};

/// Core blob storage operations - must be implemented by all storage backends.
///
/// The surface is intentionally narrow: sequential reads, commit-on-success
/// writes, and a metadata probe. No range requests, no append, no in-place
/// modification.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Open a forward-only read stream over an object
    async fn open_read(&self, bucket: &str, key: &str) -> BlobResult<ByteStream>;

    /// Open a write channel to an object. Nothing is visible at the key
    /// until the returned writer's `commit` succeeds.
    async fn open_write(&self, bucket: &str, key: &str) -> BlobResult<Box<dyn BlobWriter>>;

    /// Get object metadata without content
    async fn head(&self, bucket: &str, key: &str) -> BlobResult<ObjectHead>;
}

/// Sequential write channel with an explicit finalize step.
///
/// Writers are atomic-or-nothing: dropping one without calling `commit`
/// must leave the destination key untouched.
#[async_trait]
pub trait BlobWriter: Send {
    /// Append a chunk to the pending object
    async fn write(&mut self, chunk: Bytes) -> BlobResult<()>;

    /// Finalize the write, making the object durably visible at its key
    async fn commit(self: Box<Self>) -> BlobResult<PutOutcome>;

    /// Discard the pending write; no object is published
    async fn abort(self: Box<Self>) -> BlobResult<()>;
}
