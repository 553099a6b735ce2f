// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine runtime

use harness_adapters::PtyError;
use harness_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),
    #[error("session is not live: {0}")]
    SessionNotLive(String),
    #[error("activation aborted before commit")]
    ActivationAborted,
    #[error("pty error: {0}")]
    Pty(#[from] PtyError),
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("control state already active: {0}")]
    ControlAlreadyActive(String),
    #[error("unknown control option: {0}")]
    ControlUnknownOption(String),
    #[error("conversation id must not be empty")]
    EmptyConversationId,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
