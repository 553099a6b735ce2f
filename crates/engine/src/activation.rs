// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conversation activation (4.10): the `{none, pending(X), active(X)}`
//! state machine that decides which single conversation a client's pane is
//! currently attached to.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use harness_adapters::{PtyAdapter, PtyError};
use harness_core::SessionId;
use parking_lot::Mutex;

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    None,
    Pending(SessionId),
    Active(SessionId),
}

/// Whether the client's pane is currently rendering the conversation view
/// at all, distinct from which conversation is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneMode {
    Conversation,
    Elsewhere,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// Already active on the requested session and the pane was already
    /// showing it.
    NoOp,
    /// Already active on the requested session; the pane switched back in.
    ReEntered,
    /// A new session was committed active.
    Committed(SessionId),
}

/// Drives the activation FSM for one gateway. `cols`/`rows` used to
/// (re)start a conversation's PTY come from the caller's current layout.
pub struct ActivationController<P: PtyAdapter> {
    pty: P,
    state: Mutex<Activation>,
}

impl<P: PtyAdapter> ActivationController<P> {
    pub fn new(pty: P) -> Self {
        Self {
            pty,
            state: Mutex::new(Activation::None),
        }
    }

    pub fn current(&self) -> Activation {
        self.state.lock().clone()
    }

    /// Attempts to make `target` the active conversation. `cwd`/`argv` are
    /// used only if the PTY needs to be (re)started after a `SessionNotFound`.
    /// `abort` is polled right before commit; if set, the previous active id
    /// is left intact and `ActivationAborted` is returned.
    pub async fn activate(
        &self,
        target: SessionId,
        pane_mode: PaneMode,
        cwd: &std::path::Path,
        argv: &[String],
        cols: u16,
        rows: u16,
        abort: &AtomicBool,
    ) -> Result<ActivationOutcome, EngineError> {
        let prior = self.current();

        if let Activation::Active(ref current_id) = prior {
            if *current_id == target {
                return Ok(if pane_mode == PaneMode::Conversation {
                    ActivationOutcome::NoOp
                } else {
                    ActivationOutcome::ReEntered
                });
            }
            let _ = self.pty.detach(current_id.as_str()).await;
        }

        *self.state.lock() = Activation::Pending(target.clone());

        let attach_result = match self.pty.is_alive(target.as_str()).await {
            Ok(true) => Ok(()),
            Ok(false) | Err(PtyError::NotFound(_)) => {
                // Recreate-and-retry-once: start a fresh PTY for this
                // conversation id and try again.
                self.pty.start(target.as_str(), cwd, argv, cols, rows).await?;
                match self.pty.is_alive(target.as_str()).await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(EngineError::SessionNotLive(target.as_str().to_string())),
                    Err(e) => Err(EngineError::from(e)),
                }
            }
            Err(e) => Err(EngineError::from(e)),
        };

        if abort.load(Ordering::SeqCst) {
            *self.state.lock() = prior;
            return Err(EngineError::ActivationAborted);
        }

        attach_result?;
        *self.state.lock() = Activation::Active(target.clone());
        Ok(ActivationOutcome::Committed(target))
    }
}

pub type SharedActivation<P> = Arc<ActivationController<P>>;

#[cfg(test)]
mod tests {
    use super::*;
    use harness_adapters::FakePtyAdapter;
    use std::path::Path;

    #[tokio::test]
    async fn activating_same_live_session_in_conversation_pane_is_noop() {
        let pty = FakePtyAdapter::new();
        let ctl = ActivationController::new(pty.clone());
        let abort = AtomicBool::new(false);
        let id = SessionId::new("s1");
        ctl.activate(
            id.clone(),
            PaneMode::Elsewhere,
            Path::new("/tmp"),
            &["bash".into()],
            80,
            24,
            &abort,
        )
        .await
        .unwrap();

        let outcome = ctl
            .activate(id.clone(), PaneMode::Conversation, Path::new("/tmp"), &["bash".into()], 80, 24, &abort)
            .await
            .unwrap();
        assert_eq!(outcome, ActivationOutcome::NoOp);
    }

    #[tokio::test]
    async fn abort_before_commit_leaves_prior_active_intact() {
        let pty = FakePtyAdapter::new();
        let ctl = ActivationController::new(pty.clone());
        let first = SessionId::new("s1");
        let abort = AtomicBool::new(false);
        ctl.activate(first.clone(), PaneMode::Elsewhere, Path::new("/tmp"), &["bash".into()], 80, 24, &abort)
            .await
            .unwrap();

        let second = SessionId::new("s2");
        let abort_now = AtomicBool::new(true);
        let result = ctl
            .activate(second, PaneMode::Elsewhere, Path::new("/tmp"), &["bash".into()], 80, 24, &abort_now)
            .await;
        assert!(matches!(result, Err(EngineError::ActivationAborted)));
        assert_eq!(ctl.current(), Activation::Active(first));
    }

    #[tokio::test]
    async fn missing_pty_is_recreated_and_retried_once() {
        let pty = FakePtyAdapter::new();
        let ctl = ActivationController::new(pty.clone());
        let id = SessionId::new("fresh");
        let abort = AtomicBool::new(false);
        let outcome = ctl
            .activate(id.clone(), PaneMode::Elsewhere, Path::new("/tmp"), &["bash".into()], 80, 24, &abort)
            .await
            .unwrap();
        assert_eq!(outcome, ActivationOutcome::Committed(id));
    }
}
