// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream Transport message shapes (4.7, §6): commands travel client→server
//! tagged by `type`; responses and envelopes travel server→client tagged by
//! `kind`. All three are plain JSON objects carrying `v:1`.

use harness_core::ConversationStatus;
use serde::{Deserialize, Serialize};

/// Every frame on the wire carries this so a future incompatible change can
/// be detected before the JSON body is even inspected.
pub const WIRE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryUpsert {
    pub name: String,
    pub remote_url: Option<String>,
    pub last_commit_sha: Option<String>,
    pub last_commit_message: Option<String>,
}

/// One client→server command. The first frame on an authenticated
/// connection must be `Auth`; anything else arriving first is dropped with
/// `AuthRequired`. Field names are camelCase on the wire, matching the rest
/// of §6's JSON conventions (`stateDbPath`, `authToken`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Command {
    Auth {
        token: Option<String>,
    },
    /// Used by the Gateway Supervisor's adoption path (4.6): lets a caller
    /// that already knows host/port/token confirm the daemon's own pid and
    /// state DB path before overwriting a missing/stale Gateway Record.
    #[serde(rename = "gateway.info")]
    GatewayInfo,
    #[serde(rename = "session.list")]
    SessionList {
        #[serde(default)]
        limit: Option<usize>,
    },
    #[serde(rename = "directory.upsert")]
    DirectoryUpsert {
        path: String,
        #[serde(default)]
        repository: Option<RepositoryUpsert>,
    },
    #[serde(rename = "conversation.create")]
    ConversationCreate {
        directory_id: Option<String>,
        title: String,
        agent_type: String,
    },
    #[serde(rename = "conversation.archive")]
    ConversationArchive { session_id: String },
    #[serde(rename = "pty.start")]
    PtyStart {
        session_id: String,
        cwd: String,
        args: Vec<String>,
        initial_cols: u16,
        initial_rows: u16,
    },
    #[serde(rename = "pty.attach")]
    PtyAttach {
        session_id: String,
        #[serde(default)]
        from_seq: Option<i64>,
    },
    #[serde(rename = "pty.detach")]
    PtyDetach { session_id: String },
    #[serde(rename = "pty.resize")]
    PtyResize {
        session_id: String,
        cols: u16,
        rows: u16,
        #[serde(default)]
        immediate: bool,
    },
    #[serde(rename = "pty.write")]
    PtyWrite {
        session_id: String,
        /// Base64-encoded bytes, or plain UTF-8 text — callers may send
        /// either; the handler accepts raw text directly.
        text_or_base64: String,
    },
    #[serde(rename = "session.respond")]
    SessionRespond { session_id: String, text: String },
    #[serde(rename = "github.pr-create")]
    GithubPrCreate { directory_id: String },
}

/// A frame the client sends: an opaque request id plus the command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientFrame {
    pub v: u32,
    pub id: String,
    #[serde(flatten)]
    pub command: Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

/// One response, correlated to a command by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub v: u32,
    pub kind: FrameKind,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl ResponseFrame {
    pub fn ok(id: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            v: WIRE_VERSION,
            kind: FrameKind::Response,
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            v: WIRE_VERSION,
            kind: FrameKind::Response,
            id: id.into(),
            result: None,
            error: Some(ErrorBody {
                kind: kind.into(),
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameKind {
    Command,
    Response,
    Envelope,
    Auth,
}

/// Server-initiated push, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Envelope {
    #[serde(rename = "pty.output")]
    PtyOutput {
        session_id: String,
        seq: u64,
        /// base64-encoded chunk (4.9, §6).
        data: String,
    },
    #[serde(rename = "pty.exit")]
    PtyExit {
        session_id: String,
        exit_code: Option<i32>,
    },
    #[serde(rename = "conversation.status")]
    ConversationStatus {
        session_id: String,
        status: ConversationStatus,
        attention_reason: Option<String>,
    },
    #[serde(rename = "conversation.title")]
    ConversationTitle { session_id: String, title: String },
    #[serde(rename = "rail.invalidated")]
    RailInvalidated { epoch: u64 },
    #[serde(rename = "gateway.shutdown")]
    GatewayShutdown { reason: String },
}

/// A frame pushed to the client outside of any response — wraps an
/// [`Envelope`] with the shared `v`/`kind` header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeFrame {
    pub v: u32,
    #[serde(flatten)]
    pub envelope: Envelope,
}

impl EnvelopeFrame {
    pub fn new(envelope: Envelope) -> Self {
        Self { v: WIRE_VERSION, envelope }
    }
}

/// Everything that can be written to a connection's outbound queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Response(ResponseFrame),
    Envelope(EnvelopeFrame),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub id: String,
    pub directory_id: Option<String>,
    pub title: String,
    pub agent_type: String,
    pub status: ConversationStatus,
    pub started_at_epoch_ms: i64,
    pub last_event_at_epoch_ms: i64,
    pub attention_reason: Option<String>,
}

impl From<harness_core::Conversation> for ConversationView {
    fn from(c: harness_core::Conversation) -> Self {
        Self {
            id: c.id.as_str().to_string(),
            directory_id: c.directory_id.map(|d| d.as_str().to_string()),
            title: c.title,
            agent_type: c.agent_type,
            status: c.status,
            started_at_epoch_ms: c.started_at_epoch_ms,
            last_event_at_epoch_ms: c.last_event_at_epoch_ms,
            attention_reason: c.attention_reason,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryView {
    pub id: String,
    pub path: String,
    pub repository_id: Option<String>,
}

impl From<harness_core::Directory> for DirectoryView {
    fn from(d: harness_core::Directory) -> Self {
        Self {
            id: d.id.as_str().to_string(),
            path: d.path,
            repository_id: d.repository_id.map(|r| r.as_str().to_string()),
        }
    }
}
