//! Per-target run locks.
//!
//! At most one run may publish to a given repository branch at a time. A run
//! that finds the target locked is rejected instead of queued.

use std::collections::hash_map::DefaultHasher;
use std::fs::{File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;

#[derive(thiserror::Error, Debug)]
pub enum LockError {
    #[error("another run is already publishing to {target}")]
    Busy { target: String },

    #[error("failed to open lock file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// An exclusive lock on one publish target, released on drop.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Try to lock `target` without waiting.
    pub fn acquire(lock_dir: &Path, target: &str) -> Result<Self, LockError> {
        let path = lock_dir.join(format!("{}.lock", lock_key(target)));
        let io_error = |source| LockError::Io {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(lock_dir).map_err(io_error)?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(io_error)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!(run_target = target, lock = %path.display(), "acquired run lock");
                Ok(Self { file, path })
            }
            Err(e)
                if e.kind() == ErrorKind::WouldBlock
                    || e.raw_os_error() == fs2::lock_contended_error().raw_os_error() =>
            {
                Err(LockError::Busy {
                    target: target.to_string(),
                })
            }
            Err(source) => Err(io_error(source)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Lock file name for a target.
fn lock_key(target: &str) -> String {
    let mut hasher = DefaultHasher::new();
    target.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
