// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rail/View Model Builder (4.11): a pure function from the gateway's
//! current domain state to a flat sequence of typed rows. No I/O; ANSI
//! rendering and CSI concerns live with the terminal-mux client.

use std::collections::HashSet;

use harness_core::{Conversation, Directory, DirectoryId, RailRow, RailRowKind, Repository, SessionId};

/// Everything the builder needs; borrowed, never owned, since it runs on
/// every `rail.invalidated` tick.
pub struct RailInputs<'a> {
    pub repositories: &'a [Repository],
    pub directories: &'a [Directory],
    pub conversations: &'a [Conversation],
    /// Directory display order, already resolved by the caller.
    pub ordering: &'a [DirectoryId],
    pub active_conversation: Option<&'a SessionId>,
    pub active_directory: Option<&'a DirectoryId>,
    pub collapsed_directories: &'a HashSet<DirectoryId>,
    pub show_shortcuts: bool,
}

/// Builds the rail's row sequence. Deterministic given its inputs; callers
/// own invalidation (calling this again whenever domain state changes).
pub fn build(inputs: RailInputs<'_>) -> Vec<RailRow> {
    let mut rows = Vec::new();

    for directory_id in inputs.ordering {
        let Some(directory) = inputs.directories.iter().find(|d| &d.id == directory_id) else {
            continue;
        };
        let repository = directory
            .repository_id
            .as_ref()
            .and_then(|repo_id| inputs.repositories.iter().find(|r| &r.id == repo_id));

        let header_text = repository.map(|r| r.name.clone()).unwrap_or_else(|| directory.path.clone());
        let is_active_directory = inputs.active_directory == Some(&directory.id);
        rows.push(
            RailRow::new(RailRowKind::DirHeader, header_text)
                .active(is_active_directory)
                .directory(directory.id.clone()),
        );

        if let Some(repository) = repository {
            if let Some(message) = &repository.last_commit_message {
                rows.push(RailRow::new(RailRowKind::DirMeta, message.clone()).directory(directory.id.clone()));
            }
        }

        if inputs.collapsed_directories.contains(&directory.id) {
            continue;
        }

        for conversation in inputs
            .conversations
            .iter()
            .filter(|c| c.directory_id.as_ref() == Some(&directory.id))
        {
            let is_active_conversation = inputs.active_conversation == Some(&conversation.id);
            rows.push(
                RailRow::new(RailRowKind::ConversationTitle, conversation.title.clone())
                    .active(is_active_conversation)
                    .conversation(conversation.id.clone(), conversation.status)
                    .directory(directory.id.clone()),
            );

            let meta_text = conversation
                .attention_reason
                .clone()
                .unwrap_or_else(|| conversation.status.to_string());
            rows.push(
                RailRow::new(RailRowKind::ConversationMeta, meta_text)
                    .conversation(conversation.id.clone(), conversation.status),
            );
        }

        if inputs
            .conversations
            .iter()
            .all(|c| c.directory_id.as_ref() != Some(&directory.id))
        {
            rows.push(
                RailRow::new(RailRowKind::Muted, "no conversations yet".to_string())
                    .directory(directory.id.clone()),
            );
        }
    }

    if inputs.show_shortcuts {
        rows.push(RailRow::new(RailRowKind::ShortcutHeader, "shortcuts".to_string()));
        rows.push(RailRow::new(RailRowKind::ShortcutBody, "n  new conversation".to_string()).action("new-conversation"));
        rows.push(RailRow::new(RailRowKind::ShortcutBody, "x  archive conversation".to_string()).action("archive-conversation"));
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use harness_core::{ConversationStatus, DirectoryId, RepositoryId};

    fn directory(id: &str, repo: Option<&str>) -> Directory {
        Directory {
            id: DirectoryId::new(id),
            path: format!("/work/{id}"),
            repository_id: repo.map(RepositoryId::new),
        }
    }

    fn conversation(id: &str, dir: &str, status: ConversationStatus) -> Conversation {
        Conversation {
            id: SessionId::new(id),
            directory_id: Some(DirectoryId::new(dir)),
            title: format!("conversation {id}"),
            agent_type: "claude".into(),
            status,
            started_at_epoch_ms: 0,
            last_event_at_epoch_ms: 0,
            attention_reason: None,
        }
    }

    #[test]
    fn empty_directory_gets_a_muted_placeholder_row() {
        let dirs = vec![directory("d1", None)];
        let ordering = vec![DirectoryId::new("d1")];
        let rows = build(RailInputs {
            repositories: &[],
            directories: &dirs,
            conversations: &[],
            ordering: &ordering,
            active_conversation: None,
            active_directory: None,
            collapsed_directories: &Default::default(),
            show_shortcuts: false,
        });
        assert!(rows.iter().any(|r| r.kind == RailRowKind::Muted));
    }

    #[test]
    fn collapsed_directory_hides_its_conversations() {
        let dirs = vec![directory("d1", None)];
        let convos = vec![conversation("c1", "d1", ConversationStatus::Running)];
        let ordering = vec![DirectoryId::new("d1")];
        let mut collapsed = std::collections::HashSet::new();
        collapsed.insert(DirectoryId::new("d1"));
        let rows = build(RailInputs {
            repositories: &[],
            directories: &dirs,
            conversations: &convos,
            ordering: &ordering,
            active_conversation: None,
            active_directory: None,
            collapsed_directories: &collapsed,
            show_shortcuts: false,
        });
        assert!(rows.iter().all(|r| r.kind != RailRowKind::ConversationTitle));
    }

    #[test]
    fn active_conversation_row_is_marked_active() {
        let dirs = vec![directory("d1", None)];
        let convos = vec![conversation("c1", "d1", ConversationStatus::Running)];
        let ordering = vec![DirectoryId::new("d1")];
        let active = SessionId::new("c1");
        let rows = build(RailInputs {
            repositories: &[],
            directories: &dirs,
            conversations: &convos,
            ordering: &ordering,
            active_conversation: Some(&active),
            active_directory: None,
            collapsed_directories: &Default::default(),
            show_shortcuts: false,
        });
        let title_row = rows.iter().find(|r| r.kind == RailRowKind::ConversationTitle).unwrap();
        assert!(title_row.active);
    }
}
