// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The gateway's in-process hub: owns the Session Store, the PTY Engine,
//! and the Runtime Scheduler, and turns [`Command`]s into responses plus
//! zero or more broadcast [`Envelope`]s. Transport-agnostic — the listener
//! is the only thing that knows about sockets.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use base64::Engine;
use harness_adapters::{PtyAdapter, PtyEvent};
use harness_core::{Clock, DirectoryId, IdGen, RailRow, Repository, RepositoryId, SessionId, UuidIdGen};
use harness_engine::{ActivationController, PaneMode, ResizeAction, ResizeCoalescer};
use harness_storage::Store;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::warn;

use crate::protocol::{Command, ConversationView, DirectoryView, Envelope};

pub struct Hub<P: PtyAdapter> {
    pub store: Arc<Store>,
    pub pty: P,
    pub activation: ActivationController<P>,
    pub resize: Mutex<ResizeCoalescer>,
    pub clock: Arc<dyn Clock>,
    pub envelopes: broadcast::Sender<Envelope>,
    pub auth_token: Option<String>,
    pub ids: UuidIdGen,
    /// This process's own gateway record fields, used to answer
    /// `Command::GatewayInfo` for the Supervisor's adoption path (4.6).
    pub pid: u32,
    pub host: String,
    pub port: u16,
    pub state_db_path: String,
    pub started_at: String,
}

#[derive(Debug, Clone)]
pub struct CommandError {
    pub kind: String,
    pub message: String,
}

impl CommandError {
    fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: kind.into(), message: message.into() }
    }
}

impl From<harness_storage::StoreError> for CommandError {
    fn from(e: harness_storage::StoreError) -> Self {
        use harness_storage::StoreError::*;
        match e {
            NotFound(m) => CommandError::new("NotFound", m),
            InvalidInput(m) => CommandError::new("InvalidInput", m),
            other => CommandError::new("Internal", other.to_string()),
        }
    }
}

impl From<harness_adapters::PtyError> for CommandError {
    fn from(e: harness_adapters::PtyError) -> Self {
        use harness_adapters::PtyError::*;
        match e {
            AlreadyLive => CommandError::new("AlreadyLive", e.to_string()),
            NotFound(_) => CommandError::new("SessionNotFound", e.to_string()),
            Backpressure => CommandError::new("Backpressure", e.to_string()),
            SpawnFailed(_) => CommandError::new("StartupFailed", e.to_string()),
            other => CommandError::new("Internal", other.to_string()),
        }
    }
}

impl From<harness_engine::EngineError> for CommandError {
    fn from(e: harness_engine::EngineError) -> Self {
        use harness_engine::EngineError::*;
        match e {
            ConversationNotFound(_) => CommandError::new("SessionNotFound", e.to_string()),
            SessionNotLive(_) => CommandError::new("SessionNotLive", e.to_string()),
            ActivationAborted => CommandError::new("Internal", e.to_string()),
            Pty(inner) => CommandError::from(inner),
            Storage(inner) => CommandError::from(inner),
            other => CommandError::new("Internal", other.to_string()),
        }
    }
}

impl<P: PtyAdapter> Hub<P> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Store>,
        pty: P,
        clock: Arc<dyn Clock>,
        auth_token: Option<String>,
        host: String,
        port: u16,
        state_db_path: String,
        started_at: String,
    ) -> Self {
        let (envelopes, _) = broadcast::channel(1024);
        Self {
            activation: ActivationController::new(pty.clone()),
            store,
            pty,
            resize: Mutex::new(ResizeCoalescer::default()),
            clock,
            envelopes,
            auth_token,
            ids: UuidIdGen,
            pid: std::process::id(),
            host,
            port,
            state_db_path,
            started_at,
        }
    }

    pub fn subscribe_envelopes(&self) -> broadcast::Receiver<Envelope> {
        self.envelopes.subscribe()
    }

    fn emit(&self, envelope: Envelope) {
        let _ = self.envelopes.send(envelope);
    }

    pub fn check_auth(&self, token: Option<&str>) -> bool {
        match &self.auth_token {
            None => true,
            Some(expected) => token == Some(expected.as_str()),
        }
    }

    /// Handles one already-authenticated command, returning the JSON
    /// payload for a successful response.
    pub async fn dispatch(self: &Arc<Self>, command: Command) -> Result<serde_json::Value, CommandError>
    where
        P: 'static,
    {
        match command {
            Command::Auth { .. } => Ok(serde_json::json!({ "authenticated": true })),

            Command::GatewayInfo => Ok(serde_json::json!({
                "pid": self.pid,
                "host": self.host,
                "port": self.port,
                "stateDbPath": self.state_db_path,
                "startedAt": self.started_at,
            })),

            Command::SessionList { limit } => {
                let mut conversations = self
                    .store
                    .list_conversations()?
                    .into_iter()
                    .map(ConversationView::from)
                    .collect::<Vec<_>>();
                if let Some(limit) = limit {
                    conversations.truncate(limit);
                }
                Ok(serde_json::json!({ "sessions": conversations }))
            }

            Command::DirectoryUpsert { path, repository } => {
                let repository_id = if let Some(r) = repository {
                    let repository_id = RepositoryId::new(self.ids.next());
                    self.store.upsert_repository(&Repository {
                        id: repository_id.clone(),
                        name: r.name,
                        remote_url: r.remote_url,
                        last_commit_sha: r.last_commit_sha,
                        last_commit_message: r.last_commit_message,
                    })?;
                    Some(repository_id)
                } else {
                    None
                };
                let directory_id = DirectoryId::new(self.ids.next());
                let directory = harness_core::Directory {
                    id: directory_id,
                    path,
                    repository_id,
                };
                self.store.upsert_directory(&directory)?;
                self.emit(Envelope::RailInvalidated { epoch: self.clock.now_ms() as u64 });
                Ok(serde_json::json!({ "directory": DirectoryView::from(directory) }))
            }

            Command::ConversationCreate { directory_id, title, agent_type } => {
                let now = self.clock.now_ms();
                let conversation = harness_core::Conversation {
                    id: SessionId::new(self.ids.next()),
                    directory_id: directory_id.map(DirectoryId::new),
                    title,
                    agent_type,
                    status: harness_core::ConversationStatus::Starting,
                    started_at_epoch_ms: now,
                    last_event_at_epoch_ms: now,
                    attention_reason: None,
                };
                self.store.create_conversation(&conversation)?;
                self.emit(Envelope::RailInvalidated { epoch: now as u64 });
                Ok(serde_json::json!({ "conversation": ConversationView::from(conversation) }))
            }

            Command::ConversationArchive { session_id } => {
                let _ = self.pty.kill(&session_id).await;
                self.store.archive_conversation(&SessionId::new(session_id.clone()))?;
                self.emit(Envelope::RailInvalidated { epoch: self.clock.now_ms() as u64 });
                Ok(serde_json::json!({ "archived": session_id }))
            }

            Command::PtyStart { session_id, cwd, args, initial_cols, initial_rows } => {
                let id = SessionId::new(session_id.clone());
                self.pty
                    .start(&session_id, &PathBuf::from(cwd), &args, initial_cols, initial_rows)
                    .await?;
                self.spawn_output_pump(id.clone());
                self.store.update_conversation_status(
                    &id,
                    harness_core::ConversationStatus::Running,
                    None,
                    self.clock.now_ms(),
                )?;
                self.emit(Envelope::ConversationStatus {
                    session_id,
                    status: harness_core::ConversationStatus::Running,
                    attention_reason: None,
                });
                Ok(serde_json::json!({ "started": true }))
            }

            Command::PtyAttach { session_id, from_seq } => {
                let from_seq = from_seq.unwrap_or(0);
                let backlog = self.store.tail_output(&SessionId::new(session_id.clone()), from_seq)?;
                let chunks = backlog
                    .into_iter()
                    .map(|(seq, bytes)| {
                        serde_json::json!({
                            "seq": seq,
                            "data": base64::engine::general_purpose::STANDARD.encode(bytes),
                        })
                    })
                    .collect::<Vec<_>>();
                Ok(serde_json::json!({ "backlog": chunks }))
            }

            Command::PtyDetach { session_id } => {
                self.pty.detach(&session_id).await?;
                Ok(serde_json::json!({ "detached": session_id }))
            }

            Command::PtyResize { session_id, cols, rows, immediate } => {
                let id = SessionId::new(session_id);
                let is_active_live = matches!(
                    self.activation.current(),
                    harness_engine::Activation::Active(ref active) if *active == id
                );
                let action = self
                    .resize
                    .lock()
                    .request(id.clone(), cols, rows, std::time::Instant::now(), immediate, is_active_live);
                if let ResizeAction::CommitNow(cols, rows) = action {
                    self.pty.resize(id.as_str(), cols, rows).await?;
                }
                Ok(serde_json::json!({ "coalesced": matches!(action, ResizeAction::Scheduled) }))
            }

            Command::PtyWrite { session_id, text_or_base64 } => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(&text_or_base64)
                    .unwrap_or_else(|_| text_or_base64.clone().into_bytes());
                self.pty.write(&session_id, &bytes).await?;
                Ok(serde_json::json!({ "written": bytes.len() }))
            }

            Command::SessionRespond { session_id, text } => {
                self.pty.write(&session_id, text.as_bytes()).await?;
                Ok(serde_json::json!({ "sent": true }))
            }

            Command::GithubPrCreate { directory_id } => {
                let directory = self
                    .store
                    .get_directory(&DirectoryId::new(directory_id.clone()))?;
                match directory {
                    Some(directory) => Ok(serde_json::json!({
                        "directory": DirectoryView::from(directory),
                        "status": "not-implemented",
                    })),
                    None => Err(CommandError::new(
                        "NotFound",
                        format!("directory not found: {directory_id}"),
                    )),
                }
            }
        }
    }

    /// Activates `target` (4.10), used by the CLI-facing `gateway call`
    /// surface when the client wants this conversation attached to the
    /// single active pane rather than merely subscribed.
    pub async fn activate(
        &self,
        target: SessionId,
        pane_mode: PaneMode,
        cwd: &std::path::Path,
        argv: &[String],
        cols: u16,
        rows: u16,
        abort: &AtomicBool,
    ) -> Result<harness_engine::ActivationOutcome, CommandError> {
        Ok(self.activation.activate(target, pane_mode, cwd, argv, cols, rows, abort).await?)
    }

    fn spawn_output_pump(self: &Arc<Self>, session_id: SessionId)
    where
        P: 'static,
    {
        let hub = Arc::clone(self);
        let Ok(mut rx) = hub.pty.subscribe(session_id.as_str()) else {
            warn!(session_id = %session_id, "could not subscribe to pty events");
            return;
        };
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(PtyEvent::Output { seq, bytes }) => {
                        let now = hub.clock.now_ms();
                        if let Err(e) = hub.store.append_output(&session_id, seq as i64, &bytes, now) {
                            warn!(error = %e, "failed to persist pty output");
                        }
                        hub.emit(Envelope::PtyOutput {
                            session_id: session_id.as_str().to_string(),
                            seq,
                            data: base64::engine::general_purpose::STANDARD.encode(&bytes),
                        });
                    }
                    Ok(PtyEvent::Exit { exit_code }) => {
                        let now = hub.clock.now_ms();
                        let _ = hub.store.update_conversation_status(
                            &session_id,
                            harness_core::ConversationStatus::Exited,
                            None,
                            now,
                        );
                        hub.emit(Envelope::PtyExit {
                            session_id: session_id.as_str().to_string(),
                            exit_code,
                        });
                        hub.emit(Envelope::ConversationStatus {
                            session_id: session_id.as_str().to_string(),
                            status: harness_core::ConversationStatus::Exited,
                            attention_reason: None,
                        });
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Builds the current rail view model (4.11) from the store.
    pub fn build_rail(&self, active_conversation: Option<&SessionId>) -> Result<Vec<RailRow>, CommandError> {
        let directories = self.store.list_directories()?;
        let conversations = self.store.list_conversations()?;
        let ordering: Vec<DirectoryId> = directories.iter().map(|d| d.id.clone()).collect();
        Ok(harness_engine::build_rail(harness_engine::RailInputs {
            repositories: &[],
            directories: &directories,
            conversations: &conversations,
            ordering: &ordering,
            active_conversation,
            active_directory: None,
            collapsed_directories: &Default::default(),
            show_shortcuts: true,
        }))
    }
}
