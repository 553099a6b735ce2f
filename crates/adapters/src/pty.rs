// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PTY Engine (4.9): spawns, reads, writes, resizes, and reaps one
//! PTY-backed subprocess per conversation, behind the [`PtyAdapter`] trait
//! so the scheduler can be tested against a fake.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use thiserror::Error;
use tokio::sync::broadcast;

/// Bytes a PTY's write queue may hold before callers start seeing
/// `Backpressure` (4.9: "~1 MiB").
pub const WRITE_BUFFER_LIMIT_BYTES: usize = 1024 * 1024;

/// Default grace period before `kill` escalates to a force-kill.
pub const KILL_GRACE: std::time::Duration = std::time::Duration::from_secs(4);

#[derive(Debug, Error)]
pub enum PtyError {
    #[error("conversation already has a live pty")]
    AlreadyLive,
    #[error("failed to spawn pty: {0}")]
    SpawnFailed(String),
    #[error("conversation not found: {0}")]
    NotFound(String),
    #[error("write buffer exhausted, try again")]
    Backpressure,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

/// An event the output pump or reaper emits for a conversation's live PTY.
#[derive(Debug, Clone)]
pub enum PtyEvent {
    /// A chunk read from the PTY, with a monotonically increasing,
    /// per-session sequence number.
    Output { seq: u64, bytes: Vec<u8> },
    /// The child exited.
    Exit { exit_code: Option<i32> },
}

/// Environment variables stripped from the child's inherited environment —
/// the gateway's own profiling/tracing markers must not leak into spawned
/// agent processes (4.9).
fn is_denylisted_env_key(key: &str) -> bool {
    key.starts_with("HARNESS_PROFILE") || key.starts_with("HARNESS_TRACE") || key.contains("INSPECT")
}

#[async_trait]
pub trait PtyAdapter: Clone + Send + Sync + 'static {
    async fn start(
        &self,
        session_id: &str,
        cwd: &Path,
        argv: &[String],
        cols: u16,
        rows: u16,
    ) -> Result<(), PtyError>;

    async fn write(&self, session_id: &str, bytes: &[u8]) -> Result<(), PtyError>;

    async fn resize(&self, session_id: &str, cols: u16, rows: u16) -> Result<(), PtyError>;

    /// Removes the subscriber set but keeps the PTY alive.
    async fn detach(&self, session_id: &str) -> Result<(), PtyError>;

    async fn kill(&self, session_id: &str) -> Result<(), PtyError>;

    async fn is_alive(&self, session_id: &str) -> Result<bool, PtyError>;

    /// Subscribes to this conversation's output/exit events. Each call gets
    /// its own channel; a slow subscriber only loses its own tail (tokio's
    /// broadcast channel drops oldest-first for a lagging receiver), never
    /// blocks the pump.
    fn subscribe(&self, session_id: &str) -> Result<broadcast::Receiver<PtyEvent>, PtyError>;
}

struct LiveSession {
    child: Mutex<Box<dyn Child + Send + Sync>>,
    writer: Mutex<Box<dyn Write + Send>>,
    master: Mutex<Box<dyn MasterPty + Send>>,
    events: broadcast::Sender<PtyEvent>,
    seq: AtomicU64,
    pending_write_bytes: AtomicUsize,
    alive: std::sync::atomic::AtomicBool,
}

/// Real implementation backed by `portable-pty`.
#[derive(Clone)]
pub struct RealPtyAdapter {
    sessions: Arc<Mutex<HashMap<String, Arc<LiveSession>>>>,
}

impl Default for RealPtyAdapter {
    fn default() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl RealPtyAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, session_id: &str) -> Result<Arc<LiveSession>, PtyError> {
        self.sessions
            .lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| PtyError::NotFound(session_id.to_string()))
    }
}

#[async_trait]
impl PtyAdapter for RealPtyAdapter {
    async fn start(
        &self,
        session_id: &str,
        cwd: &Path,
        argv: &[String],
        cols: u16,
        rows: u16,
    ) -> Result<(), PtyError> {
        if self.sessions.lock().contains_key(session_id) {
            return Err(PtyError::AlreadyLive);
        }
        let argv = argv.to_vec();
        let cwd: PathBuf = cwd.to_path_buf();
        let session_id_owned = session_id.to_string();
        let sessions = self.sessions.clone();

        let live = tokio::task::spawn_blocking(move || -> Result<Arc<LiveSession>, PtyError> {
            let pty_system = native_pty_system();
            let pair = pty_system
                .openpty(PtySize {
                    rows,
                    cols,
                    pixel_width: 0,
                    pixel_height: 0,
                })
                .map_err(|e| PtyError::SpawnFailed(e.to_string()))?;

            let program = argv.first().cloned().unwrap_or_else(|| "bash".to_string());
            let mut cmd = CommandBuilder::new(program);
            for arg in argv.iter().skip(1) {
                cmd.arg(arg);
            }
            cmd.cwd(&cwd);
            for (key, value) in std::env::vars() {
                if !is_denylisted_env_key(&key) {
                    cmd.env(key, value);
                }
            }

            let child = pair
                .slave
                .spawn_command(cmd)
                .map_err(|e| PtyError::SpawnFailed(e.to_string()))?;
            drop(pair.slave);

            let writer = pair
                .master
                .take_writer()
                .map_err(|e| PtyError::SpawnFailed(e.to_string()))?;
            let reader = pair
                .master
                .try_clone_reader()
                .map_err(|e| PtyError::SpawnFailed(e.to_string()))?;

            let (tx, _rx) = broadcast::channel(1024);
            let live = Arc::new(LiveSession {
                child: Mutex::new(child),
                writer: Mutex::new(writer),
                master: Mutex::new(pair.master),
                events: tx.clone(),
                seq: AtomicU64::new(0),
                pending_write_bytes: AtomicUsize::new(0),
                alive: std::sync::atomic::AtomicBool::new(true),
            });

            sessions.lock().insert(session_id_owned.clone(), live.clone());
            spawn_output_pump(session_id_owned, reader, live.clone(), sessions.clone());

            Ok(live)
        })
        .await
        .map_err(|e| PtyError::Internal(e.to_string()))??;

        let _ = live;
        Ok(())
    }

    async fn write(&self, session_id: &str, bytes: &[u8]) -> Result<(), PtyError> {
        let live = self.get(session_id)?;
        let len = bytes.len();
        let prior = live.pending_write_bytes.fetch_add(len, Ordering::SeqCst);
        if prior + len > WRITE_BUFFER_LIMIT_BYTES {
            live.pending_write_bytes.fetch_sub(len, Ordering::SeqCst);
            return Err(PtyError::Backpressure);
        }
        let bytes = bytes.to_vec();
        let live2 = live.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut writer = live2.writer.lock();
            writer.write_all(&bytes)
        })
        .await
        .map_err(|e| PtyError::Internal(e.to_string()))?;
        live.pending_write_bytes.fetch_sub(len, Ordering::SeqCst);
        result.map_err(PtyError::from)
    }

    async fn resize(&self, session_id: &str, cols: u16, rows: u16) -> Result<(), PtyError> {
        let live = self.get(session_id)?;
        live.master
            .lock()
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Internal(e.to_string()))
    }

    async fn detach(&self, session_id: &str) -> Result<(), PtyError> {
        // Subscribers are per-call broadcast receivers owned by the
        // scheduler; detaching is the scheduler simply dropping its
        // receiver, so there is nothing to do at this layer beyond
        // confirming the session still exists.
        self.get(session_id).map(|_| ())
    }

    async fn kill(&self, session_id: &str) -> Result<(), PtyError> {
        let live = self.get(session_id)?;
        {
            let mut writer = live.writer.lock();
            let _ = writer.flush();
        }
        let deadline = tokio::time::Instant::now() + KILL_GRACE;
        loop {
            if !live.alive.load(Ordering::SeqCst) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        let live2 = live.clone();
        tokio::task::spawn_blocking(move || {
            let _ = live2.child.lock().kill();
        })
        .await
        .map_err(|e| PtyError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn is_alive(&self, session_id: &str) -> Result<bool, PtyError> {
        Ok(self
            .sessions
            .lock()
            .get(session_id)
            .map(|live| live.alive.load(Ordering::SeqCst))
            .unwrap_or(false))
    }

    fn subscribe(&self, session_id: &str) -> Result<broadcast::Receiver<PtyEvent>, PtyError> {
        Ok(self.get(session_id)?.events.subscribe())
    }
}

fn spawn_output_pump(
    session_id: String,
    mut reader: Box<dyn std::io::Read + Send>,
    live: Arc<LiveSession>,
    sessions: Arc<Mutex<HashMap<String, Arc<LiveSession>>>>,
) {
    std::thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let seq = live.seq.fetch_add(1, Ordering::SeqCst) + 1;
                    let _ = live.events.send(PtyEvent::Output {
                        seq,
                        bytes: buf[..n].to_vec(),
                    });
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }

        let exit_code = live
            .child
            .lock()
            .wait()
            .ok()
            .and_then(|status| status.exit_code().try_into().ok());
        live.alive.store(false, Ordering::SeqCst);
        let _ = live.events.send(PtyEvent::Exit { exit_code });
        // Keep the entry in `sessions` so `is_alive` can still answer
        // `false` for the conversation until it is archived; only remove
        // it once the scheduler has reaped the exit event. Here we simply
        // leave the map entry — memory for one exited PTY's handles is
        // bounded and reclaimed when the gateway shuts down.
        let _ = sessions;
        let _ = session_id;
    });
}

/// Does nothing; used when the PTY Engine is disabled (dry runs, CLI
/// commands that never spawn a conversation).
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpPtyAdapter;

#[async_trait]
impl PtyAdapter for NoOpPtyAdapter {
    async fn start(&self, _: &str, _: &Path, _: &[String], _: u16, _: u16) -> Result<(), PtyError> {
        Ok(())
    }
    async fn write(&self, _: &str, _: &[u8]) -> Result<(), PtyError> {
        Ok(())
    }
    async fn resize(&self, _: &str, _: u16, _: u16) -> Result<(), PtyError> {
        Ok(())
    }
    async fn detach(&self, _: &str) -> Result<(), PtyError> {
        Ok(())
    }
    async fn kill(&self, _: &str) -> Result<(), PtyError> {
        Ok(())
    }
    async fn is_alive(&self, _: &str) -> Result<bool, PtyError> {
        Ok(false)
    }
    fn subscribe(&self, _: &str) -> Result<broadcast::Receiver<PtyEvent>, PtyError> {
        let (_tx, rx) = broadcast::channel(1);
        Ok(rx)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use std::collections::HashMap as Map;

    #[derive(Debug, Clone)]
    pub enum PtyCall {
        Start { session_id: String, argv: Vec<String>, cols: u16, rows: u16 },
        Write { session_id: String, bytes: Vec<u8> },
        Resize { session_id: String, cols: u16, rows: u16 },
        Detach { session_id: String },
        Kill { session_id: String },
    }

    struct FakeState {
        alive: Map<String, bool>,
        calls: Vec<PtyCall>,
        events: Map<String, broadcast::Sender<PtyEvent>>,
        seq: Map<String, u64>,
    }

    /// Fake PTY adapter for scheduler/engine tests: records calls, never
    /// spawns a real process, and lets tests push synthetic output.
    #[derive(Clone)]
    pub struct FakePtyAdapter {
        inner: Arc<Mutex<FakeState>>,
    }

    impl Default for FakePtyAdapter {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeState {
                    alive: Map::new(),
                    calls: Vec::new(),
                    events: Map::new(),
                    seq: Map::new(),
                })),
            }
        }
    }

    impl FakePtyAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<PtyCall> {
            self.inner.lock().calls.clone()
        }

        /// Pushes a synthetic output chunk as if the PTY's reader produced
        /// it, for tests of output ordering/backpressure.
        pub fn push_output(&self, session_id: &str, bytes: &[u8]) {
            let mut inner = self.inner.lock();
            let seq_entry = inner.seq.entry(session_id.to_string()).or_insert(0);
            *seq_entry += 1;
            let seq = *seq_entry;
            if let Some(tx) = inner.events.get(session_id) {
                let _ = tx.send(PtyEvent::Output {
                    seq,
                    bytes: bytes.to_vec(),
                });
            }
        }

        pub fn push_exit(&self, session_id: &str, exit_code: Option<i32>) {
            let mut inner = self.inner.lock();
            inner.alive.insert(session_id.to_string(), false);
            if let Some(tx) = inner.events.get(session_id) {
                let _ = tx.send(PtyEvent::Exit { exit_code });
            }
        }
    }

    #[async_trait]
    impl PtyAdapter for FakePtyAdapter {
        async fn start(
            &self,
            session_id: &str,
            _cwd: &Path,
            argv: &[String],
            cols: u16,
            rows: u16,
        ) -> Result<(), PtyError> {
            let mut inner = self.inner.lock();
            if inner.alive.get(session_id) == Some(&true) {
                return Err(PtyError::AlreadyLive);
            }
            inner.calls.push(PtyCall::Start {
                session_id: session_id.to_string(),
                argv: argv.to_vec(),
                cols,
                rows,
            });
            inner.alive.insert(session_id.to_string(), true);
            inner
                .events
                .entry(session_id.to_string())
                .or_insert_with(|| broadcast::channel(1024).0);
            Ok(())
        }

        async fn write(&self, session_id: &str, bytes: &[u8]) -> Result<(), PtyError> {
            let mut inner = self.inner.lock();
            if !inner.alive.get(session_id).copied().unwrap_or(false) {
                return Err(PtyError::NotFound(session_id.to_string()));
            }
            inner.calls.push(PtyCall::Write {
                session_id: session_id.to_string(),
                bytes: bytes.to_vec(),
            });
            Ok(())
        }

        async fn resize(&self, session_id: &str, cols: u16, rows: u16) -> Result<(), PtyError> {
            let mut inner = self.inner.lock();
            inner.calls.push(PtyCall::Resize {
                session_id: session_id.to_string(),
                cols,
                rows,
            });
            Ok(())
        }

        async fn detach(&self, session_id: &str) -> Result<(), PtyError> {
            self.inner.lock().calls.push(PtyCall::Detach {
                session_id: session_id.to_string(),
            });
            Ok(())
        }

        async fn kill(&self, session_id: &str) -> Result<(), PtyError> {
            let mut inner = self.inner.lock();
            inner.calls.push(PtyCall::Kill {
                session_id: session_id.to_string(),
            });
            inner.alive.insert(session_id.to_string(), false);
            Ok(())
        }

        async fn is_alive(&self, session_id: &str) -> Result<bool, PtyError> {
            Ok(self.inner.lock().alive.get(session_id).copied().unwrap_or(false))
        }

        fn subscribe(&self, session_id: &str) -> Result<broadcast::Receiver<PtyEvent>, PtyError> {
            let mut inner = self.inner.lock();
            let tx = inner
                .events
                .entry(session_id.to_string())
                .or_insert_with(|| broadcast::channel(1024).0);
            Ok(tx.subscribe())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakePtyAdapter;
    use super::*;

    #[tokio::test]
    async fn fake_rejects_double_start() {
        let pty = FakePtyAdapter::new();
        pty.start("s1", Path::new("/tmp"), &["bash".into()], 80, 24)
            .await
            .unwrap();
        assert!(matches!(
            pty.start("s1", Path::new("/tmp"), &["bash".into()], 80, 24).await,
            Err(PtyError::AlreadyLive)
        ));
    }

    #[tokio::test]
    async fn subscriber_sees_pushed_output_in_order() {
        let pty = FakePtyAdapter::new();
        pty.start("s1", Path::new("/tmp"), &["bash".into()], 80, 24)
            .await
            .unwrap();
        let mut rx = pty.subscribe("s1").unwrap();
        pty.push_output("s1", b"hello ");
        pty.push_output("s1", b"world");
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        match (first, second) {
            (PtyEvent::Output { seq: s1, .. }, PtyEvent::Output { seq: s2, .. }) => {
                assert!(s2 > s1);
            }
            _ => panic!("expected output events"),
        }
    }
}
