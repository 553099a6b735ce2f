// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway Record Store (L2): pure codec for the JSON record describing a
//! running gateway, plus an atomic write/read wrapper.
//!
//! The codec itself never touches the filesystem; [`write_atomic`] and
//! [`read`] are thin wrappers used by both the CLI (after spawning a
//! detached daemon) and the daemon itself (right after bind).

use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const GATEWAY_RECORD_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum GatewayRecordError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The on-disk JSON record describing a running gateway (schema v1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayRecord {
    pub version: u32,
    pub pid: u32,
    pub host: String,
    pub port: u16,
    #[serde(rename = "authToken")]
    pub auth_token: Option<String>,
    #[serde(rename = "stateDbPath")]
    pub state_db_path: String,
    #[serde(rename = "startedAt")]
    pub started_at: String,
    #[serde(rename = "workspaceRoot")]
    pub workspace_root: String,
}

fn non_blank(s: &str) -> bool {
    !s.trim().is_empty() && s == s.trim()
}

impl GatewayRecord {
    pub fn validate(&self) -> Result<(), GatewayRecordError> {
        if self.version != GATEWAY_RECORD_VERSION {
            return Err(GatewayRecordError::InvalidInput(format!(
                "unsupported record version {}",
                self.version
            )));
        }
        if self.pid == 0 {
            return Err(GatewayRecordError::InvalidInput("pid must be positive".into()));
        }
        if self.port == 0 {
            return Err(GatewayRecordError::InvalidInput("port out of range".into()));
        }
        if !non_blank(&self.host) {
            return Err(GatewayRecordError::InvalidInput("host must be non-empty".into()));
        }
        if !non_blank(&self.state_db_path) {
            return Err(GatewayRecordError::InvalidInput(
                "stateDbPath must be non-empty".into(),
            ));
        }
        if !non_blank(&self.started_at) {
            return Err(GatewayRecordError::InvalidInput("startedAt must be non-empty".into()));
        }
        if !non_blank(&self.workspace_root) {
            return Err(GatewayRecordError::InvalidInput(
                "workspaceRoot must be non-empty".into(),
            ));
        }
        if let Some(token) = &self.auth_token {
            if token.is_empty() {
                return Err(GatewayRecordError::InvalidInput(
                    "authToken must be non-empty when present".into(),
                ));
            }
        }
        Ok(())
    }

    /// Whether `host` is one of the canonical loopback forms, after
    /// trim/lowercase.
    pub fn is_loopback_host(host: &str) -> bool {
        let h = host.trim().to_ascii_lowercase();
        if h == "localhost" {
            return true;
        }
        match h.parse::<IpAddr>() {
            Ok(IpAddr::V4(v4)) => v4 == Ipv4Addr::LOCALHOST,
            Ok(IpAddr::V6(v6)) => v6 == Ipv6Addr::LOCALHOST,
            Err(_) => false,
        }
    }
}

/// Parses a record, returning `Ok(None)` only never — malformed text is
/// always an error; absence is represented by the caller not finding the
/// file (see [`read`]).
pub fn parse(text: &str) -> Result<GatewayRecord, GatewayRecordError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(GatewayRecordError::InvalidInput(
            "record must be a JSON object".into(),
        ));
    }
    let record: GatewayRecord = serde_json::from_value(value)?;
    record.validate()?;
    Ok(record)
}

/// Pretty-printed JSON, two-space indent, terminated by a single newline.
pub fn serialize(record: &GatewayRecord) -> Result<String, GatewayRecordError> {
    record.validate()?;
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"  ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    record.serialize(&mut ser)?;
    let mut text = String::from_utf8(buf).expect("serde_json emits valid utf-8");
    text.push('\n');
    Ok(text)
}

/// Reads and parses the record at `path`. Missing files are reported as
/// `Ok(None)`; any other I/O failure propagates, as does a malformed record.
pub fn read(path: &Path) -> Result<Option<GatewayRecord>, GatewayRecordError> {
    match fs::read_to_string(path) {
        Ok(text) => parse(&text).map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Writes `record` to `path` atomically (write to a sibling tempfile, then
/// rename), creating parent directories as needed.
pub fn write_atomic(path: &Path, record: &GatewayRecord) -> Result<(), GatewayRecordError> {
    let text = serialize(record)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, text.as_bytes())?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Removes the record file, tolerating its absence.
pub fn remove(path: &Path) -> Result<(), GatewayRecordError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
