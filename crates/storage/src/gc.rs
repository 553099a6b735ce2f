// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Garbage Collector (4.12): age-based cleanup of named-session runtime
//! directories.

use std::path::Path;
use std::time::{Duration, SystemTime};

use harness_core::{gateway_record, pid_alive};

use crate::error::StoreError;

/// Default `gcMaxAgeMs` (4.12): roughly 7 days.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcReport {
    pub scanned: u32,
    pub removed: u32,
    pub skipped_live: u32,
}

/// Scans `<runtime_root>/sessions/` and removes any child directory whose
/// mtime tree is older than `max_age` *and* whose gateway record (if any)
/// does not name a currently-alive PID.
pub fn gc(runtime_root: &Path, max_age: Duration) -> Result<GcReport, StoreError> {
    let sessions_dir = runtime_root.join("sessions");
    let mut report = GcReport::default();

    let entries = match std::fs::read_dir(&sessions_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        report.scanned += 1;
        let dir = entry.path();

        let record_path = dir.join("gateway.json");
        let is_live = gateway_record::read(&record_path)
            .ok()
            .flatten()
            .is_some_and(|record| pid_alive(record.pid));

        if is_live {
            report.skipped_live += 1;
            continue;
        }

        let newest = newest_mtime(&dir)?;
        let age = SystemTime::now()
            .duration_since(newest)
            .unwrap_or(Duration::ZERO);
        if age >= max_age {
            std::fs::remove_dir_all(&dir)?;
            report.removed += 1;
            tracing::info!(session_dir = %dir.display(), "gc: removed stale session directory");
        }
    }

    tracing::info!(
        scanned = report.scanned,
        removed = report.removed,
        skipped_live = report.skipped_live,
        "gc: scan complete"
    );
    Ok(report)
}

/// Recursively finds the most recent mtime anywhere under `dir`.
fn newest_mtime(dir: &Path) -> std::io::Result<SystemTime> {
    let mut newest = std::fs::metadata(dir)?.modified()?;
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if let Ok(modified) = meta.modified() {
                if modified > newest {
                    newest = modified;
                }
            }
            if meta.is_dir() {
                stack.push(entry.path());
            }
        }
    }
    Ok(newest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use harness_core::gateway_record::{write_atomic, GatewayRecord};
    use std::time::Duration;

    fn sample_record(pid: u32) -> GatewayRecord {
        GatewayRecord {
            version: 1,
            pid,
            host: "127.0.0.1".into(),
            port: 6553,
            auth_token: None,
            state_db_path: "/tmp/x.sqlite".into(),
            started_at: "2026-02-19T00:00:00.000Z".into(),
            workspace_root: "/work/repo".into(),
        }
    }

    #[test]
    fn skips_live_sessions_regardless_of_age() {
        let tmp = tempfile::tempdir().unwrap();
        let session_dir = tmp.path().join("sessions").join("review");
        std::fs::create_dir_all(&session_dir).unwrap();
        write_atomic(&session_dir.join("gateway.json"), &sample_record(std::process::id())).unwrap();

        let report = gc(tmp.path(), Duration::from_secs(0)).unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.skipped_live, 1);
        assert_eq!(report.removed, 0);
        assert!(session_dir.exists());
    }

    #[test]
    fn removes_old_dead_sessions() {
        let tmp = tempfile::tempdir().unwrap();
        let session_dir = tmp.path().join("sessions").join("stale");
        std::fs::create_dir_all(&session_dir).unwrap();
        write_atomic(&session_dir.join("gateway.json"), &sample_record(u32::MAX - 1)).unwrap();

        let report = gc(tmp.path(), Duration::from_secs(0)).unwrap();
        assert_eq!(report.removed, 1);
        assert!(!session_dir.exists());
    }

    #[test]
    fn leaves_young_dead_sessions_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let session_dir = tmp.path().join("sessions").join("young");
        std::fs::create_dir_all(&session_dir).unwrap();
        write_atomic(&session_dir.join("gateway.json"), &sample_record(u32::MAX - 1)).unwrap();

        let report = gc(tmp.path(), Duration::from_secs(3600)).unwrap();
        assert_eq!(report.removed, 0);
        assert!(session_dir.exists());
    }

    #[test]
    fn missing_sessions_dir_is_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        let report = gc(tmp.path(), Duration::from_secs(0)).unwrap();
        assert_eq!(report, GcReport::default());
    }
}
