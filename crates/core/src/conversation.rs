// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A conversation: one AI-coding task with an associated PTY and persisted
//! history (Session Runtime State, §3).

use serde::{Deserialize, Serialize};

use crate::{DirectoryId, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversationStatus {
    Starting,
    Running,
    NeedsInput,
    Completed,
    Exited,
}

impl std::fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConversationStatus::Starting => "starting",
            ConversationStatus::Running => "running",
            ConversationStatus::NeedsInput => "needs-input",
            ConversationStatus::Completed => "completed",
            ConversationStatus::Exited => "exited",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: SessionId,
    pub directory_id: Option<DirectoryId>,
    pub title: String,
    pub agent_type: String,
    pub status: ConversationStatus,
    pub started_at_epoch_ms: i64,
    pub last_event_at_epoch_ms: i64,
    pub attention_reason: Option<String>,
}

impl Conversation {
    /// Invariant (ii) of 4.8: `lastEventAt >= startedAt`.
    pub fn is_well_ordered(&self) -> bool {
        self.last_event_at_epoch_ms >= self.started_at_epoch_ms
    }

    pub fn is_live(&self) -> bool {
        !matches!(
            self.status,
            ConversationStatus::Completed | ConversationStatus::Exited
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_ordered_detects_violation() {
        let mut c = Conversation {
            id: SessionId::new("s1"),
            directory_id: None,
            title: "t".into(),
            agent_type: "claude".into(),
            status: ConversationStatus::Running,
            started_at_epoch_ms: 100,
            last_event_at_epoch_ms: 100,
            attention_reason: None,
        };
        assert!(c.is_well_ordered());
        c.last_event_at_epoch_ms = 50;
        assert!(!c.is_well_ordered());
    }

    #[test]
    fn status_display_matches_wire_spelling() {
        assert_eq!(ConversationStatus::NeedsInput.to_string(), "needs-input");
        assert_eq!(
            serde_json::to_string(&ConversationStatus::NeedsInput).unwrap(),
            "\"needs-input\""
        );
    }
}
