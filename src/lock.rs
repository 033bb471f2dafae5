// src/lock.rs

//! Process-wide exclusive lock for update operations
//!
//! Every bundle operation holds this lock for its entire duration; it is
//! the sole mechanism preventing two updaters from racing on the same
//! root. There is no wait queue: if the lock is held, acquisition fails
//! immediately.
//!
//! The lock is a kernel advisory lock (`flock(LOCK_EX)`), so a killed
//! process never leaves it held.

use crate::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Exclusive updater lock, released on drop.
#[derive(Debug)]
pub struct UpdateLock {
    /// Kept open to maintain the lock
    #[allow(dead_code)]
    file: File,
    path: PathBuf,
}

impl UpdateLock {
    /// Acquire the lock without blocking.
    ///
    /// Fails with [`Error::LockHeld`] when another updater owns it.
    pub fn acquire<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                info!("Acquired update lock at {:?}", path);
                Ok(Self { file, path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                debug!("Update lock already held at {:?}", path);
                Err(Error::LockHeld(path))
            }
            Err(e) => Err(Error::InitError(format!(
                "failed to acquire update lock: {e}"
            ))),
        }
    }

    /// Check if the lock is currently held by any process.
    ///
    /// Non-destructive: briefly takes and releases the lock when free.
    pub fn is_held<P: AsRef<Path>>(path: P) -> bool {
        let path = path.as_ref();

        if !path.exists() {
            return false;
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(_) => return false,
        };

        match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = fs2::FileExt::unlock(&file);
                false
            }
            Err(_) => true,
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        // Lock is released when the file handle closes
        info!("Released update lock at {:?}", self.path);
    }
}
