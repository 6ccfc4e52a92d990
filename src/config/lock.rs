// ============================================
// TANZU CLI - Config File Lock
// ============================================

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{PluginError, Result};

/// How long an acquirer waits before giving up.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Sibling lock file for a config file: `<dir>/.<file>.lock`.
pub fn lock_path(config_path: &Path) -> PathBuf {
    let file_name = config_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "config".to_string());
    config_path.with_file_name(format!(".{}.lock", file_name))
}

/// Exclusive advisory lock on the client config, released on drop.
#[derive(Debug)]
pub struct ConfigLock {
    file: File,
    path: PathBuf,
}

impl ConfigLock {
    pub async fn acquire(config_path: &Path) -> Result<Self> {
        Self::acquire_with_timeout(config_path, DEFAULT_LOCK_TIMEOUT).await
    }

    /// Poll for the lock until `timeout` runs out.
    pub async fn acquire_with_timeout(config_path: &Path, timeout: Duration) -> Result<Self> {
        let path = lock_path(config_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| PluginError::Lock {
                path: path.clone(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| PluginError::Lock {
                path: path.clone(),
                source,
            })?;

        let contended = fs2::lock_contended_error().raw_os_error();
        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    tracing::trace!(path = %path.display(), "acquired config lock");
                    return Ok(Self { file, path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.raw_os_error() == contended => {}
                Err(source) => return Err(PluginError::Lock { path, source }),
            }

            if Instant::now() >= deadline {
                return Err(PluginError::LockTimeout { path, timeout });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ConfigLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "could not release config lock");
        }
    }
}
