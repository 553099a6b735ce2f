// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wraps a [`PtyAdapter`] with a `tracing` span per call, so gateway logs
//! show which conversation drove which PTY operation without every call
//! site having to remember to instrument itself.

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::instrument;

use crate::pty::{PtyAdapter, PtyError, PtyEvent};

#[derive(Clone)]
pub struct TracedPty<P> {
    inner: P,
}

impl<P> TracedPty<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P: PtyAdapter> PtyAdapter for TracedPty<P> {
    #[instrument(skip(self, cwd, argv), fields(session_id))]
    async fn start(
        &self,
        session_id: &str,
        cwd: &Path,
        argv: &[String],
        cols: u16,
        rows: u16,
    ) -> Result<(), PtyError> {
        tracing::debug!(cwd = %cwd.display(), argv = ?argv, cols, rows, "pty: start");
        let result = self.inner.start(session_id, cwd, argv, cols, rows).await;
        if let Err(ref e) = result {
            tracing::warn!(error = %e, "pty: start failed");
        }
        result
    }

    #[instrument(skip(self, bytes), fields(session_id, bytes = bytes.len()))]
    async fn write(&self, session_id: &str, bytes: &[u8]) -> Result<(), PtyError> {
        let result = self.inner.write(session_id, bytes).await;
        if let Err(ref e) = result {
            tracing::debug!(error = %e, "pty: write rejected");
        }
        result
    }

    #[instrument(skip(self), fields(session_id))]
    async fn resize(&self, session_id: &str, cols: u16, rows: u16) -> Result<(), PtyError> {
        tracing::debug!(cols, rows, "pty: resize");
        self.inner.resize(session_id, cols, rows).await
    }

    #[instrument(skip(self), fields(session_id))]
    async fn detach(&self, session_id: &str) -> Result<(), PtyError> {
        tracing::debug!("pty: detach");
        self.inner.detach(session_id).await
    }

    #[instrument(skip(self), fields(session_id))]
    async fn kill(&self, session_id: &str) -> Result<(), PtyError> {
        tracing::info!("pty: kill");
        self.inner.kill(session_id).await
    }

    async fn is_alive(&self, session_id: &str) -> Result<bool, PtyError> {
        self.inner.is_alive(session_id).await
    }

    fn subscribe(&self, session_id: &str) -> Result<broadcast::Receiver<PtyEvent>, PtyError> {
        self.inner.subscribe(session_id)
    }
}
