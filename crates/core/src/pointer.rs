// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Default Gateway Pointer: a small JSON file that lets the CLI find the
//! unnamed gateway for a workspace without re-deriving every path.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const GATEWAY_POINTER_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PointerError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPointer {
    pub version: u32,
    #[serde(rename = "workspaceRoot")]
    pub workspace_root: String,
    #[serde(rename = "workspaceRuntimeRoot")]
    pub workspace_runtime_root: String,
    #[serde(rename = "gatewayRecordPath")]
    pub gateway_record_path: String,
    #[serde(rename = "gatewayLogPath")]
    pub gateway_log_path: String,
    #[serde(rename = "stateDbPath")]
    pub state_db_path: String,
    pub pid: u32,
    #[serde(rename = "startedAt")]
    pub started_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
    #[serde(rename = "gatewayRunId")]
    pub gateway_run_id: String,
}

pub fn read(path: &Path) -> Result<Option<GatewayPointer>, PointerError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn write_atomic(path: &Path, pointer: &GatewayPointer) -> Result<(), PointerError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut text = serde_json::to_string_pretty(pointer)?;
    text.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, text.as_bytes())?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Clears the pointer, but only when it still references `record_path` —
/// a pointer left behind by a different, still-live session must not be
/// clobbered.
pub fn clear_if_matches(path: &Path, record_path: &str) -> Result<bool, PointerError> {
    match read(path)? {
        Some(p) if p.gateway_record_path == record_path => {
            match fs::remove_file(path) {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
                Err(e) => Err(e.into()),
            }
        }
        _ => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GatewayPointer {
        GatewayPointer {
            version: 1,
            workspace_root: "/work/repo".into(),
            workspace_runtime_root: "/home/dev/.cache/.harness/runtime/abc".into(),
            gateway_record_path: "/home/dev/.cache/.harness/runtime/abc/gateway.json".into(),
            gateway_log_path: "/home/dev/.cache/.harness/runtime/abc/gateway.log".into(),
            state_db_path: "/home/dev/.cache/.harness/runtime/abc/control-plane.sqlite".into(),
            pid: 4242,
            started_at: "2026-02-19T00:00:00.000Z".into(),
            updated_at: "2026-02-19T00:00:00.000Z".into(),
            gateway_run_id: "run-1".into(),
        }
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pointers").join("abc.json");
        let pointer = sample();
        write_atomic(&path, &pointer).unwrap();
        assert_eq!(read(&path).unwrap().unwrap(), pointer);
    }

    #[test]
    fn clear_only_clears_matching_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.json");
        let pointer = sample();
        write_atomic(&path, &pointer).unwrap();

        assert!(!clear_if_matches(&path, "/some/other/gateway.json").unwrap());
        assert!(path.exists());

        assert!(clear_if_matches(&path, &pointer.gateway_record_path).unwrap());
        assert!(!path.exists());
    }
}
