// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Row types produced by the Rail/View Model Builder (4.11). The builder
//! itself is a pure function in `harness-engine::rail`; this module only
//! defines the immutable value it returns, since both the engine (building)
//! and the daemon (serializing into `rail.invalidated`-triggered queries)
//! need the same shape.

use serde::{Deserialize, Serialize};

use crate::{ConversationStatus, DirectoryId, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RailRowKind {
    DirHeader,
    DirMeta,
    ConversationTitle,
    ConversationMeta,
    ProcessTitle,
    ProcessMeta,
    ShortcutHeader,
    ShortcutBody,
    Action,
    Muted,
}

/// One immutable row of the rail view model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RailRow {
    pub kind: RailRowKind,
    pub text: String,
    pub active: bool,
    pub conversation_id: Option<SessionId>,
    pub directory_id: Option<DirectoryId>,
    pub action_id: Option<String>,
    pub status: Option<ConversationStatus>,
}

impl RailRow {
    pub fn new(kind: RailRowKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            active: false,
            conversation_id: None,
            directory_id: None,
            action_id: None,
            status: None,
        }
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn conversation(mut self, id: SessionId, status: ConversationStatus) -> Self {
        self.conversation_id = Some(id);
        self.status = Some(status);
        self
    }

    pub fn directory(mut self, id: DirectoryId) -> Self {
        self.directory_id = Some(id);
        self
    }

    pub fn action(mut self, action_id: impl Into<String>) -> Self {
        self.action_id = Some(action_id.into());
        self
    }
}
