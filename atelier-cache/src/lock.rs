//! Exclusive lock file for the cache directory.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use atelier_core::errors::CacheError;

const LOCK_FILE: &str = ".lock";

/// Held for the lifetime of an open cache; the file is removed on drop.
///
/// A leftover lock from a crashed process must be removed by the operator;
/// probing pids is not worth the complexity for single-node deployments.
#[derive(Debug)]
pub(crate) struct CacheLock {
    path: PathBuf,
}

impl CacheLock {
    pub(crate) fn acquire(dir: &Path) -> Result<Self, CacheError> {
        let path = dir.join(LOCK_FILE);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::AlreadyExists {
                    CacheError::Locked { path: dir.to_path_buf() }
                } else {
                    CacheError::Io { path: path.clone(), source: err }
                }
            })?;

        let _ = writeln!(file, "{}", std::process::id());
        Ok(Self { path })
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %err, "failed to remove cache lock");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let first = CacheLock::acquire(dir.path()).unwrap();
        let second = CacheLock::acquire(dir.path());
        assert!(matches!(second, Err(CacheError::Locked { .. })));
        drop(first);
        let third = CacheLock::acquire(dir.path());
        assert!(third.is_ok());
    }
}
