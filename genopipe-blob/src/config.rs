use std::time::Duration;

/// S3 multipart parts must be at least 5 MiB (except the final part).
const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Configuration for blob operations
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Preferred read chunk size (bytes). Backends that control their own
    /// framing (e.g. S3) may yield network-sized chunks instead.
    pub chunk_size: usize,

    /// Part size (bytes) for buffered multipart writes. Clamped to the
    /// backend minimum of 5 MiB.
    pub part_size: u64,

    /// Retry policy for transient storage errors
    pub retry: RetryPolicy,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024 * 1024,        // 1MB
            part_size: 8 * 1024 * 1024,     // 8MB
            retry: RetryPolicy::default(),
        }
    }
}

impl BlobConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set read chunk size
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// Set multipart part size (floored at the backend minimum)
    pub fn with_part_size(mut self, bytes: u64) -> Self {
        self.part_size = bytes.max(MIN_PART_SIZE);
        self
    }

    /// Set retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Bounded retry with doubling backoff, applied only to operations that are
/// safe to repeat (stream opens, whole buffered parts).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Backoff before the second attempt; doubles per attempt
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    /// Disable retries entirely
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Backoff to sleep after the given (1-based) failed attempt
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.initial_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}
