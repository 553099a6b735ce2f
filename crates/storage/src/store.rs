// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session Store (4.8): directories, repositories, conversations, the
//! bounded output ring, and mux UI state, all backed by one SQLite
//! connection per gateway.
//!
//! Single-writer-multiple-reader (§5) is enforced by the caller: the
//! gateway's runtime scheduler is the only component that holds a `&Store`
//! behind a dedicated task, so mutations are already serialized before they
//! reach here. `Store` itself only needs `parking_lot::Mutex` around the
//! connection because `rusqlite::Connection` is `!Sync`.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use harness_core::{Conversation, ConversationStatus, Directory, DirectoryId, Repository, RepositoryId, SessionId};

use crate::error::StoreError;
use crate::schema;

/// Default byte budget for a single session's output ring (4.9: "default
/// 1 MiB").
pub const OUTPUT_RING_BYTE_BUDGET: usize = 1024 * 1024;

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        schema::apply(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::apply(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ── Repositories ────────────────────────────────────────────────────

    pub fn upsert_repository(&self, repo: &Repository) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO repositories (id, name, remote_url, last_commit_sha, last_commit_message)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                remote_url = excluded.remote_url,
                last_commit_sha = excluded.last_commit_sha,
                last_commit_message = excluded.last_commit_message",
            params![
                repo.id.as_str(),
                repo.name,
                repo.remote_url,
                repo.last_commit_sha,
                repo.last_commit_message,
            ],
        )?;
        Ok(())
    }

    pub fn get_repository(&self, id: &RepositoryId) -> Result<Option<Repository>, StoreError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, name, remote_url, last_commit_sha, last_commit_message
             FROM repositories WHERE id = ?1",
            params![id.as_str()],
            |row| {
                Ok(Repository {
                    id: RepositoryId::new(row.get::<_, String>(0)?),
                    name: row.get(1)?,
                    remote_url: row.get(2)?,
                    last_commit_sha: row.get(3)?,
                    last_commit_message: row.get(4)?,
                })
            },
        )
        .optional()
        .map_err(StoreError::from)
    }

    // ── Directories ─────────────────────────────────────────────────────

    pub fn upsert_directory(&self, dir: &Directory) -> Result<(), StoreError> {
        if let Some(repo_id) = &dir.repository_id {
            if self.get_repository(repo_id)?.is_none() {
                return Err(StoreError::InvalidInput(format!(
                    "repository not found: {}",
                    repo_id.as_str()
                )));
            }
        }
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO directories (id, path, repository_id)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                path = excluded.path,
                repository_id = excluded.repository_id",
            params![
                dir.id.as_str(),
                dir.path,
                dir.repository_id.as_ref().map(|r| r.as_str()),
            ],
        )?;
        Ok(())
    }

    pub fn get_directory(&self, id: &DirectoryId) -> Result<Option<Directory>, StoreError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, path, repository_id FROM directories WHERE id = ?1",
            params![id.as_str()],
            |row| {
                Ok(Directory {
                    id: DirectoryId::new(row.get::<_, String>(0)?),
                    path: row.get(1)?,
                    repository_id: row
                        .get::<_, Option<String>>(2)?
                        .map(RepositoryId::new),
                })
            },
        )
        .optional()
        .map_err(StoreError::from)
    }

    pub fn list_directories(&self) -> Result<Vec<Directory>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, path, repository_id FROM directories")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Directory {
                    id: DirectoryId::new(row.get::<_, String>(0)?),
                    path: row.get(1)?,
                    repository_id: row
                        .get::<_, Option<String>>(2)?
                        .map(RepositoryId::new),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Conversations ───────────────────────────────────────────────────

    /// Invariant (i) of 4.8: every conversation references either a valid
    /// `directoryId` or `null`.
    pub fn create_conversation(&self, conv: &Conversation) -> Result<(), StoreError> {
        if !conv.is_well_ordered() {
            return Err(StoreError::InvalidInput(
                "lastEventAt must be >= startedAt".into(),
            ));
        }
        if let Some(dir_id) = &conv.directory_id {
            if self.get_directory(dir_id)?.is_none() {
                return Err(StoreError::InvalidInput(format!(
                    "directory not found: {}",
                    dir_id.as_str()
                )));
            }
        }
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO conversations
                (id, directory_id, title, agent_type, status, started_at_epoch_ms, last_event_at_epoch_ms, attention_reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                conv.id.as_str(),
                conv.directory_id.as_ref().map(|d| d.as_str()),
                conv.title,
                conv.agent_type,
                conv.status.to_string(),
                conv.started_at_epoch_ms,
                conv.last_event_at_epoch_ms,
                conv.attention_reason,
            ],
        )?;
        Ok(())
    }

    pub fn get_conversation(&self, id: &SessionId) -> Result<Option<Conversation>, StoreError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, directory_id, title, agent_type, status, started_at_epoch_ms, last_event_at_epoch_ms, attention_reason
             FROM conversations WHERE id = ?1",
            params![id.as_str()],
            row_to_conversation,
        )
        .optional()
        .map_err(StoreError::from)
    }

    pub fn list_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, directory_id, title, agent_type, status, started_at_epoch_ms, last_event_at_epoch_ms, attention_reason
             FROM conversations ORDER BY started_at_epoch_ms ASC",
        )?;
        let rows = stmt.query_map([], row_to_conversation)?.collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update_conversation_status(
        &self,
        id: &SessionId,
        status: ConversationStatus,
        attention_reason: Option<&str>,
        now_ms: i64,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE conversations SET status = ?2, attention_reason = ?3, last_event_at_epoch_ms = ?4 WHERE id = ?1",
            params![id.as_str(), status.to_string(), attention_reason, now_ms],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.as_str().to_string()));
        }
        Ok(())
    }

    pub fn update_conversation_title(&self, id: &SessionId, title: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE conversations SET title = ?2 WHERE id = ?1",
            params![id.as_str(), title],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.as_str().to_string()));
        }
        Ok(())
    }

    /// Removes the conversation row, its output ring, and its UI state —
    /// used by `conversation.archive`.
    pub fn archive_conversation(&self, id: &SessionId) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM output_ring WHERE session_id = ?1", params![id.as_str()])?;
        conn.execute("DELETE FROM ui_state WHERE session_id = ?1", params![id.as_str()])?;
        let changed = conn.execute("DELETE FROM conversations WHERE id = ?1", params![id.as_str()])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.as_str().to_string()));
        }
        Ok(())
    }

    // ── Output ring ─────────────────────────────────────────────────────

    /// Appends a chunk and trims the ring back to [`OUTPUT_RING_BYTE_BUDGET`],
    /// oldest bytes first.
    pub fn append_output(
        &self,
        session_id: &SessionId,
        seq: i64,
        payload: &[u8],
        now_ms: i64,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO output_ring (session_id, seq, payload, created_at_epoch_ms) VALUES (?1, ?2, ?3, ?4)",
            params![session_id.as_str(), seq, payload, now_ms],
        )?;

        let mut stmt = conn.prepare(
            "SELECT seq, length(payload) FROM output_ring WHERE session_id = ?1 ORDER BY seq DESC",
        )?;
        let mut total = 0usize;
        let mut cutoff_seq: Option<i64> = None;
        let rows = stmt
            .query_map(params![session_id.as_str()], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (seq, len) in rows {
            total += len;
            if total > OUTPUT_RING_BYTE_BUDGET {
                cutoff_seq = Some(seq);
                break;
            }
        }
        if let Some(cutoff) = cutoff_seq {
            conn.execute(
                "DELETE FROM output_ring WHERE session_id = ?1 AND seq <= ?2",
                params![session_id.as_str(), cutoff],
            )?;
        }
        Ok(())
    }

    /// Returns every retained chunk for `session_id` with `seq > from_seq`,
    /// in ascending order — backing `pty.tail {fromSeq}`.
    pub fn tail_output(&self, session_id: &SessionId, from_seq: i64) -> Result<Vec<(i64, Vec<u8>)>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT seq, payload FROM output_ring WHERE session_id = ?1 AND seq > ?2 ORDER BY seq ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id.as_str(), from_seq], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn max_seq(&self, session_id: &SessionId) -> Result<i64, StoreError> {
        let conn = self.conn.lock();
        let seq: Option<i64> = conn.query_row(
            "SELECT MAX(seq) FROM output_ring WHERE session_id = ?1",
            params![session_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(seq.unwrap_or(0))
    }

    // ── UI state ────────────────────────────────────────────────────────

    pub fn set_ui_state(
        &self,
        session_id: &SessionId,
        active_pane: Option<&str>,
        dividers_json: Option<&str>,
        collapsed: bool,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO ui_state (session_id, active_pane, dividers, collapsed)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(session_id) DO UPDATE SET
                active_pane = excluded.active_pane,
                dividers = excluded.dividers,
                collapsed = excluded.collapsed",
            params![session_id.as_str(), active_pane, dividers_json, collapsed as i64],
        )?;
        Ok(())
    }
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let status: String = row.get(4)?;
    Ok(Conversation {
        id: SessionId::new(row.get::<_, String>(0)?),
        directory_id: row.get::<_, Option<String>>(1)?.map(DirectoryId::new),
        title: row.get(2)?,
        agent_type: row.get(3)?,
        status: parse_status(&status),
        started_at_epoch_ms: row.get(5)?,
        last_event_at_epoch_ms: row.get(6)?,
        attention_reason: row.get(7)?,
    })
}

fn parse_status(s: &str) -> ConversationStatus {
    match s {
        "starting" => ConversationStatus::Starting,
        "running" => ConversationStatus::Running,
        "needs-input" => ConversationStatus::NeedsInput,
        "completed" => ConversationStatus::Completed,
        _ => ConversationStatus::Exited,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv(id: &str) -> Conversation {
        Conversation {
            id: SessionId::new(id),
            directory_id: None,
            title: "untitled".into(),
            agent_type: "claude".into(),
            status: ConversationStatus::Starting,
            started_at_epoch_ms: 100,
            last_event_at_epoch_ms: 100,
            attention_reason: None,
        }
    }

    #[test]
    fn create_and_get_conversation() {
        let store = Store::open_in_memory().unwrap();
        store.create_conversation(&conv("s1")).unwrap();
        let got = store.get_conversation(&SessionId::new("s1")).unwrap().unwrap();
        assert_eq!(got.title, "untitled");
    }

    #[test]
    fn rejects_unknown_directory() {
        let store = Store::open_in_memory().unwrap();
        let mut c = conv("s1");
        c.directory_id = Some(DirectoryId::new("missing"));
        assert!(store.create_conversation(&c).is_err());
    }

    #[test]
    fn status_update_bumps_last_event_at() {
        let store = Store::open_in_memory().unwrap();
        store.create_conversation(&conv("s1")).unwrap();
        store
            .update_conversation_status(&SessionId::new("s1"), ConversationStatus::Running, None, 500)
            .unwrap();
        let got = store.get_conversation(&SessionId::new("s1")).unwrap().unwrap();
        assert_eq!(got.status, ConversationStatus::Running);
        assert_eq!(got.last_event_at_epoch_ms, 500);
    }

    #[test]
    fn status_update_missing_conversation_is_not_found() {
        let store = Store::open_in_memory().unwrap();
        let err = store
            .update_conversation_status(&SessionId::new("nope"), ConversationStatus::Running, None, 0)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn output_ring_trims_to_budget() {
        let store = Store::open_in_memory().unwrap();
        let id = SessionId::new("s1");
        store.create_conversation(&conv("s1")).unwrap();
        let chunk = vec![0u8; 1024];
        for seq in 0..(OUTPUT_RING_BYTE_BUDGET / 1024 + 10) as i64 {
            store.append_output(&id, seq, &chunk, 0).unwrap();
        }
        let tail = store.tail_output(&id, -1).unwrap();
        let total: usize = tail.iter().map(|(_, p)| p.len()).sum();
        assert!(total <= OUTPUT_RING_BYTE_BUDGET);
        // newest chunk must have survived
        assert_eq!(
            tail.last().unwrap().0,
            (OUTPUT_RING_BYTE_BUDGET / 1024 + 10) as i64 - 1
        );
    }

    #[test]
    fn tail_output_is_ordered_and_excludes_seen() {
        let store = Store::open_in_memory().unwrap();
        let id = SessionId::new("s1");
        store.create_conversation(&conv("s1")).unwrap();
        for seq in 0..5 {
            store.append_output(&id, seq, b"x", 0).unwrap();
        }
        let tail = store.tail_output(&id, 2).unwrap();
        assert_eq!(tail.iter().map(|(s, _)| *s).collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn archive_removes_conversation_and_ring() {
        let store = Store::open_in_memory().unwrap();
        let id = SessionId::new("s1");
        store.create_conversation(&conv("s1")).unwrap();
        store.append_output(&id, 0, b"x", 0).unwrap();
        store.archive_conversation(&id).unwrap();
        assert!(store.get_conversation(&id).unwrap().is_none());
        assert!(store.tail_output(&id, -1).unwrap().is_empty());
    }
}
