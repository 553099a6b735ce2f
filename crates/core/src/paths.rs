// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path Resolver (L1): maps a workspace root plus an optional named session
//! to every absolute path the rest of the system needs, without touching
//! the filesystem.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Abstracts environment variable lookup so the resolver is testable without
/// mutating the process environment.
pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads from the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Env for SystemEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

/// A fixed map of variables, for tests.
#[derive(Debug, Clone, Default)]
pub struct MapEnv(pub std::collections::HashMap<String, String>);

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("invalid session name: {0:?}")]
    InvalidSessionName(String),
    #[error("no home or cache directory available in this environment")]
    PathsUnavailable,
}

/// Every absolute path the system derives from a workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub workspace_root: PathBuf,
    pub hashed_workspace: String,
    pub runtime_root: PathBuf,
    pub gateway_record: PathBuf,
    pub gateway_log: PathBuf,
    pub gateway_lock: PathBuf,
    pub state_db_path: PathBuf,
    pub profile_state_path: PathBuf,
    pub status_timeline_state_path: PathBuf,
    pub render_trace_state_path: PathBuf,
    pub profiles_dir: PathBuf,
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub secrets_file: PathBuf,
    pub pointer_file: PathBuf,
}

const SESSION_NAME_MAX_LEN: usize = 64;

fn validate_session_name(name: &str) -> Result<(), PathError> {
    if name.is_empty() || name.len() > SESSION_NAME_MAX_LEN {
        return Err(PathError::InvalidSessionName(name.to_string()));
    }
    if name.starts_with('-') {
        return Err(PathError::InvalidSessionName(name.to_string()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(PathError::InvalidSessionName(name.to_string()));
    }
    Ok(())
}

/// First 16 hex characters of the SHA-256 digest of the canonical workspace
/// root, used as the per-workspace directory component everywhere under the
/// runtime and config roots.
pub fn hash_workspace(workspace_root: &Path) -> String {
    let canonical = workspace_root
        .canonicalize()
        .unwrap_or_else(|_| workspace_root.to_path_buf());
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

fn xdg_or_home_subdir(env: &dyn Env, xdg_var: &str, home_subdir: &str) -> Result<PathBuf, PathError> {
    if let Some(v) = env.var(xdg_var) {
        return Ok(PathBuf::from(v));
    }
    let home = env.var("HOME").ok_or(PathError::PathsUnavailable)?;
    Ok(PathBuf::from(home).join(home_subdir))
}

/// Resolves every path for `workspaceRoot` and an optional named session.
///
/// Never touches the filesystem: callers create directories lazily when they
/// actually write into them.
pub fn resolve(
    workspace_root: &Path,
    session_name: Option<&str>,
    env: &dyn Env,
) -> Result<Paths, PathError> {
    if let Some(name) = session_name {
        validate_session_name(name)?;
    }

    let cache_root = xdg_or_home_subdir(env, "XDG_CACHE_HOME", ".cache")?.join(".harness");
    let config_root = xdg_or_home_subdir(env, "XDG_CONFIG_HOME", ".config")?.join(".harness");

    let hashed_workspace = hash_workspace(workspace_root);

    let mut runtime_root = cache_root.join("runtime").join(&hashed_workspace);
    if let Some(name) = session_name {
        runtime_root = runtime_root.join("sessions").join(name);
    }

    let profiles_dir = cache_root
        .join("runtime")
        .join(&hashed_workspace)
        .join("profiles")
        .join(session_name.unwrap_or("default"));

    let config_dir = config_root.join(&hashed_workspace);

    Ok(Paths {
        workspace_root: workspace_root.to_path_buf(),
        hashed_workspace: hashed_workspace.clone(),
        gateway_record: runtime_root.join("gateway.json"),
        gateway_log: runtime_root.join("gateway.log"),
        gateway_lock: runtime_root.join("gateway.lock"),
        state_db_path: runtime_root.join("control-plane.sqlite"),
        profile_state_path: runtime_root.join("active-profile.json"),
        status_timeline_state_path: runtime_root.join("active-status-timeline.json"),
        render_trace_state_path: runtime_root.join("active-render-trace.json"),
        profiles_dir,
        config_file: config_dir.join("harness.config.jsonc"),
        secrets_file: config_dir.join("secrets.env"),
        pointer_file: config_root.join("pointers").join(format!("{hashed_workspace}.json")),
        config_dir,
        runtime_root,
    })
}

/// True when `state_db_path` falls inside `<workspace>/.harness/`, which
/// `gateway start --state-db-path` rejects explicitly (see 4.6).
pub fn is_legacy_workspace_local_path(workspace_root: &Path, candidate: &Path) -> bool {
    let legacy_root = workspace_root.join(".harness");
    candidate.starts_with(&legacy_root)
}
