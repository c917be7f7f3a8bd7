use bytes::Bytes;
use futures_core::Stream;
use std::pin::Pin;

/// Stream of bytes for blob content. Forward-only: chunks arrive in object
/// order and cannot be re-read once yielded.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Metadata about a stored object
#[derive(Debug, Clone)]
pub struct ObjectHead {
    pub size_bytes: u64,
    pub etag: Option<String>,
}

/// Result of a successfully committed write
#[derive(Debug, Clone)]
pub struct PutOutcome {
    pub bytes_written: u64,
    pub etag: Option<String>,
}
