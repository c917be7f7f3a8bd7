use std::path::{Path, PathBuf};

use genopipe_blob::BlobError;
use thiserror::Error;

use crate::fifo::PipeDirection;

/// Result type for bridge and merge operations
pub type PipeResult<T> = Result<T, PipeError>;

/// Errors that can occur in bridges, supervision, and merge orchestration
#[derive(Error, Debug)]
pub enum PipeError {
    #[error("Blob storage error: {source}")]
    Blob {
        #[from]
        source: BlobError,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Pipe peer disconnected: {path:?}")]
    PeerDisconnected { path: PathBuf },

    #[error("Bridge cancelled before completion")]
    Cancelled,

    #[error("No live bridge owns endpoint {path:?}")]
    UnknownEndpoint { path: PathBuf },

    #[error("Bridge worker terminated abnormally: {path:?}")]
    WorkerLost { path: PathBuf },

    #[error("Failed to launch merge tool {program}: {source}")]
    ToolSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Merge tool exited with status {status:?}: {stderr}")]
    ToolFailed {
        status: Option<i32>,
        stderr: String,
    },

    #[error("Invalid combine request: {message}")]
    InvalidJob { message: String },

    #[error("{direction} bridge failed at {path:?}: {source}")]
    BridgeFailed {
        path: PathBuf,
        direction: PipeDirection,
        #[source]
        source: Box<PipeError>,
    },
}

impl PipeError {
    /// Create a peer disconnected error
    pub fn peer_disconnected<P: AsRef<Path>>(path: P) -> Self {
        Self::PeerDisconnected {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create an unknown endpoint error
    pub fn unknown_endpoint<P: AsRef<Path>>(path: P) -> Self {
        Self::UnknownEndpoint {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create a worker lost error
    pub fn worker_lost<P: AsRef<Path>>(path: P) -> Self {
        Self::WorkerLost {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create an invalid job error
    pub fn invalid_job<S: Into<String>>(message: S) -> Self {
        Self::InvalidJob {
            message: message.into(),
        }
    }

    /// Wrap a component failure with the endpoint it belongs to
    pub fn bridge_failed(path: PathBuf, direction: PipeDirection, source: PipeError) -> Self {
        Self::BridgeFailed {
            path,
            direction,
            source: Box::new(source),
        }
    }
}
