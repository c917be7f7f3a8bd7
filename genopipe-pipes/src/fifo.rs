use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{PipeError, PipeResult};

/// Direction of a pipe endpoint, from the external consumer's perspective:
/// `Read` endpoints are fed by a reader bridge, `Write` endpoints are
/// drained by a writer bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeDirection {
    Read,
    Write,
}

impl std::fmt::Display for PipeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "reader"),
            Self::Write => write!(f, "writer"),
        }
    }
}

/// A named pipe with standard FIFO blocking semantics: opening one end
/// blocks until the peer attaches, and closing the write end delivers EOF
/// to the reader.
///
/// The path is uuid-generated, so concurrent jobs in one process never
/// collide. The filesystem entry is unlinked exactly once, on `remove` or
/// drop, whichever comes first.
pub struct FifoEndpoint {
    path: PathBuf,
    removed: AtomicBool,
}

impl FifoEndpoint {
    /// Create a fresh FIFO inside `dir`
    pub fn create_in(dir: &Path) -> PipeResult<Self> {
        let path = dir.join(format!("pipe-{}", Uuid::new_v4().simple()));
        mkfifo(&path, Mode::S_IRUSR | Mode::S_IWUSR)
            .map_err(|errno| PipeError::Io {
                source: std::io::Error::from_raw_os_error(errno as i32),
            })?;
        debug!(path = ?path, "created fifo endpoint");
        Ok(Self {
            path,
            removed: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unlink the endpoint. Idempotent; removing an already-removed
    /// endpoint is a no-op.
    pub fn remove(&self) {
        if !self.removed.swap(true, Ordering::SeqCst) {
            if let Err(err) = std::fs::remove_file(&self.path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = ?self.path, error = %err, "failed to remove fifo endpoint");
                }
            }
        }
    }
}

impl Drop for FifoEndpoint {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Release any thread parked in a blocking FIFO open on `path` by briefly
/// attaching as the missing peer. Non-blocking opens never park, so this
/// returns immediately whether or not anyone was waiting.
pub(crate) fn unblock(path: &Path) {
    use std::os::unix::fs::OpenOptionsExt;

    let _ = std::fs::OpenOptions::new()
        .read(true)
        .custom_flags(nix::libc::O_NONBLOCK)
        .open(path);
    // Fails with ENXIO when no reader is waiting, which is fine.
    let _ = std::fs::OpenOptions::new()
        .write(true)
        .custom_flags(nix::libc::O_NONBLOCK)
        .open(path);
}
