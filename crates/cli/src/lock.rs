// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace Lock (4.3): serializes CLI operations that mutate gateway
//! state for one workspace+session (start/stop/migrate/reap), using an
//! advisory file lock on `paths.gateway_lock`.

use std::fs::{self, File};
use std::path::Path;
use std::time::{Duration, Instant};

use fs2::FileExt;
use thiserror::Error;

/// `lockTimeoutMs` (§5): how long a caller waits for a busy lock before
/// giving up with `LockBusy`.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum LockError {
    #[error("another harness command is already running for this workspace")]
    LockBusy,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Holds the workspace lock for the lifetime of the guard; the lock is
/// released on drop regardless of how the guarded operation returns,
/// including on panic.
pub struct WorkspaceLockGuard {
    file: File,
}

impl Drop for WorkspaceLockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Acquires the workspace lock at `lock_path`, retrying until `timeout`
/// elapses, then runs `operation` while holding it.
pub fn with_lock<T>(
    lock_path: &Path,
    timeout: Duration,
    operation: impl FnOnce() -> T,
) -> Result<T, LockError> {
    let _guard = acquire(lock_path, timeout)?;
    Ok(operation())
}

/// Async counterpart of [`with_lock`]: the file lock itself is acquired with
/// a blocking poll loop (bounded by `timeout`, never longer than a CLI
/// invocation can tolerate), then `operation`'s future is awaited while the
/// guard stays alive.
pub async fn with_lock_async<T, Fut>(
    lock_path: &Path,
    timeout: Duration,
    operation: impl FnOnce() -> Fut,
) -> Result<T, LockError>
where
    Fut: std::future::Future<Output = T>,
{
    let _guard = acquire(lock_path, timeout)?;
    Ok(operation().await)
}

fn acquire(lock_path: &Path, timeout: Duration) -> Result<WorkspaceLockGuard, LockError> {
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::options().create(true).write(true).open(lock_path)?;

    let deadline = Instant::now() + timeout;
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(WorkspaceLockGuard { file }),
            Err(_) if Instant::now() < deadline => {
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(_) => return Err(LockError::LockBusy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquires_and_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("gateway.lock");
        let result = with_lock(&lock_path, LOCK_TIMEOUT, || 42).unwrap();
        assert_eq!(result, 42);

        // A second acquisition after the guard dropped should succeed too.
        let result = with_lock(&lock_path, LOCK_TIMEOUT, || 7).unwrap();
        assert_eq!(result, 7);
    }

    #[test]
    fn contended_lock_times_out_as_lock_busy() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("gateway.lock");
        let held = File::options().create(true).write(true).open(&lock_path).unwrap();
        held.lock_exclusive().unwrap();

        let err = with_lock(&lock_path, Duration::from_millis(100), || ()).unwrap_err();
        assert!(matches!(err, LockError::LockBusy));

        FileExt::unlock(&held).unwrap();
    }
}
