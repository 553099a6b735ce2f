// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DDL for the Session Runtime State database (4.8, §3).

pub const SCHEMA_VERSION: i64 = 1;

pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS repositories (
    id                TEXT PRIMARY KEY,
    name              TEXT NOT NULL,
    remote_url        TEXT,
    last_commit_sha   TEXT,
    last_commit_message TEXT
);

CREATE TABLE IF NOT EXISTS directories (
    id             TEXT PRIMARY KEY,
    path           TEXT NOT NULL UNIQUE,
    repository_id  TEXT REFERENCES repositories(id)
);

CREATE TABLE IF NOT EXISTS conversations (
    id                     TEXT PRIMARY KEY,
    directory_id           TEXT REFERENCES directories(id),
    title                  TEXT NOT NULL,
    agent_type             TEXT NOT NULL,
    status                 TEXT NOT NULL,
    started_at_epoch_ms    INTEGER NOT NULL,
    last_event_at_epoch_ms INTEGER NOT NULL,
    attention_reason       TEXT
);

CREATE TABLE IF NOT EXISTS output_ring (
    session_id       TEXT NOT NULL,
    seq              INTEGER NOT NULL,
    payload          BLOB NOT NULL,
    created_at_epoch_ms INTEGER NOT NULL,
    PRIMARY KEY (session_id, seq)
);

CREATE TABLE IF NOT EXISTS ui_state (
    session_id    TEXT PRIMARY KEY,
    active_pane   TEXT,
    dividers      TEXT,
    collapsed     INTEGER NOT NULL DEFAULT 0
);
"#;

pub fn apply(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.execute_batch(DDL)?;
    Ok(())
}
