// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Profile / Trace Controllers (4.13). Three small, near-identical state
//! machines: `profile`, `status-timeline`, `render-trace`. Each writes a
//! JSON state file naming its mode and output path while running, and
//! rejects a duplicate `start`, an unknown option, or an empty
//! `--conversation-id`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Profile,
    StatusTimeline,
    RenderTrace,
}

impl ControlKind {
    fn state_file_name(self) -> &'static str {
        match self {
            ControlKind::Profile => "profile.state.json",
            ControlKind::StatusTimeline => "status-timeline.state.json",
            ControlKind::RenderTrace => "render-trace.state.json",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlState {
    pub conversation_id: String,
    pub mode: String,
    pub output_path: String,
    pub started_at: String,
}

/// Starts, stops, and locates the state file for one of the three
/// profile/trace controllers, scoped to a single gateway's runtime root.
pub struct Controller {
    kind: ControlKind,
    runtime_root: PathBuf,
}

const KNOWN_PROFILE_MODES: &[&str] = &["cpu"];
const KNOWN_STATUS_TIMELINE_MODES: &[&str] = &["status-timeline"];
const KNOWN_RENDER_TRACE_MODES: &[&str] = &["render-trace"];

impl Controller {
    pub fn new(kind: ControlKind, runtime_root: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            runtime_root: runtime_root.into(),
        }
    }

    fn state_path(&self) -> PathBuf {
        self.runtime_root.join(self.kind.state_file_name())
    }

    fn known_modes(&self) -> &'static [&'static str] {
        match self.kind {
            ControlKind::Profile => KNOWN_PROFILE_MODES,
            ControlKind::StatusTimeline => KNOWN_STATUS_TIMELINE_MODES,
            ControlKind::RenderTrace => KNOWN_RENDER_TRACE_MODES,
        }
    }

    pub fn start(
        &self,
        conversation_id: &str,
        mode: &str,
        output_path: &Path,
        started_at: &str,
    ) -> Result<ControlState, EngineError> {
        if conversation_id.trim().is_empty() {
            return Err(EngineError::EmptyConversationId);
        }
        if !self.known_modes().contains(&mode) {
            return Err(EngineError::ControlUnknownOption(mode.to_string()));
        }
        if self.state_path().exists() {
            return Err(EngineError::ControlAlreadyActive(conversation_id.to_string()));
        }

        let state = ControlState {
            conversation_id: conversation_id.to_string(),
            mode: mode.to_string(),
            output_path: output_path.display().to_string(),
            started_at: started_at.to_string(),
        };
        if let Some(parent) = self.state_path().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(self.state_path(), serde_json::to_vec_pretty(&state)?)?;
        Ok(state)
    }

    pub fn stop(&self) -> Result<Option<ControlState>, EngineError> {
        let path = self.state_path();
        let state = match fs::read(&path) {
            Ok(bytes) => Some(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        if state.is_some() {
            fs::remove_file(&path)?;
        }
        Ok(state)
    }

    pub fn active(&self) -> Result<Option<ControlState>, EngineError> {
        match fs::read(self.state_path()) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
