use std::path::PathBuf;

/// Configuration for bridge supervision
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Directory under which per-supervisor scratch directories are created.
    /// FIFO endpoints live inside the scratch directory and are removed on
    /// teardown.
    pub scratch_dir: PathBuf,

    /// Copy-loop chunk size (bytes) for writer bridges reading from a pipe
    pub chunk_size: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir(),
            chunk_size: 1024 * 1024, // 1MB
        }
    }
}

impl BridgeConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scratch directory root
    pub fn with_scratch_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// Set the copy-loop chunk size
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }
}
