use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;

use crate::{BlobError, BlobResult, BlobStore, BlobWriter, ByteStream, ObjectHead, PutOutcome};

/// In-memory blob store with the same atomic-commit contract as the real
/// backends. Intended for tests and local development; reads are chunked so
/// multi-chunk code paths are exercised.
#[derive(Clone)]
pub struct MemoryBlobStore {
    objects: Arc<Mutex<HashMap<(String, String), Bytes>>>,
    chunk_size: usize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
            chunk_size: 64 * 1024,
        }
    }

    /// Override the read chunk size (useful for forcing multi-chunk reads
    /// over small payloads in tests)
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    /// Insert an object directly, bypassing the writer path
    pub fn insert<B: Into<String>, K: Into<String>>(&self, bucket: B, key: K, data: Bytes) {
        self.objects
            .lock()
            .insert((bucket.into(), key.into()), data);
    }

    /// Fetch an object's full content, if present
    pub fn get(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.objects
            .lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Whether an object exists at the key
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .lock()
            .contains_key(&(bucket.to_string(), key.to_string()))
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn open_read(&self, bucket: &str, key: &str) -> BlobResult<ByteStream> {
        let data = self
            .get(bucket, key)
            .ok_or_else(|| BlobError::not_found(bucket, key))?;

        let chunk_size = self.chunk_size;
        let stream = async_stream::stream! {
            let mut offset = 0;
            while offset < data.len() {
                let end = (offset + chunk_size).min(data.len());
                yield Ok(data.slice(offset..end));
                offset = end;
            }
        };
        Ok(Box::pin(stream))
    }

    async fn open_write(&self, bucket: &str, key: &str) -> BlobResult<Box<dyn BlobWriter>> {
        Ok(Box::new(MemoryWriter {
            objects: self.objects.clone(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            buffer: BytesMut::new(),
        }))
    }

    async fn head(&self, bucket: &str, key: &str) -> BlobResult<ObjectHead> {
        let data = self
            .get(bucket, key)
            .ok_or_else(|| BlobError::not_found(bucket, key))?;
        Ok(ObjectHead {
            size_bytes: data.len() as u64,
            etag: None,
        })
    }
}

/// Buffers the pending object and publishes it in one step on commit.
/// Dropped or aborted writers leave the map untouched.
struct MemoryWriter {
    objects: Arc<Mutex<HashMap<(String, String), Bytes>>>,
    bucket: String,
    key: String,
    buffer: BytesMut,
}

#[async_trait]
impl BlobWriter for MemoryWriter {
    async fn write(&mut self, chunk: Bytes) -> BlobResult<()> {
        self.buffer.extend_from_slice(&chunk);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> BlobResult<PutOutcome> {
        let bytes_written = self.buffer.len() as u64;
        self.objects
            .lock()
            .insert((self.bucket, self.key), self.buffer.freeze());
        Ok(PutOutcome {
            bytes_written,
            etag: None,
        })
    }

    async fn abort(self: Box<Self>) -> BlobResult<()> {
        Ok(())
    }
}
