// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway Supervisor (4.6): resolves start settings, spawns/adopts the
//! gateway daemon under the workspace lock, and tears it down on `stop`.

use std::io::Read;
use std::net::TcpListener as StdTcpListener;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use harness_core::{gateway_record, paths, pointer, GatewayRecord, Paths};
use thiserror::Error;
use tracing::{info, warn};

use crate::client::{ClientError, DaemonClient};
use crate::lock::{self, LockError};
use crate::reaper::{self, ReaperTarget, TERMINATION_GRACE};

/// `startupTimeoutMs` (4.6): how long `ensureRunning` waits for the record
/// file to appear and the health probe to succeed.
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
const STARTUP_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Short timeout for `probe` — it must never hang a `gateway list`.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const STOP_GRACE: Duration = TERMINATION_GRACE;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("a --state-db-path inside <workspace>/.harness/ is not allowed")]
    InvalidStateDbPath,
    #[error("gateway failed to start: {0}")]
    StartupFailed(String),
    #[error("timed out waiting for the gateway to start")]
    StartupTimeout,
    #[error("no gateway is running for this workspace")]
    NotRunning,
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Record(#[from] harness_core::GatewayRecordError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// User-supplied overrides for `gateway start`; `None` falls through to the
/// next-lower-priority source in the 4.6 resolution order.
#[derive(Debug, Clone, Default)]
pub struct StartSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub auth_token: Option<String>,
    pub state_db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub connected: bool,
    pub session_count: Option<usize>,
    pub live_session_count: Option<usize>,
}

/// Ensures a gateway is running for `paths`, migrating legacy state first.
/// Returns the live record and whether this call started it.
pub async fn ensure_running(
    paths: &Paths,
    workspace_root: &Path,
    settings: &StartSettings,
) -> Result<(GatewayRecord, bool), SupervisorError> {
    if let Some(candidate) = &settings.state_db_path {
        if paths::is_legacy_workspace_local_path(workspace_root, candidate) {
            return Err(SupervisorError::InvalidStateDbPath);
        }
    }

    let paths = paths.clone();
    lock::with_lock_async(&paths.gateway_lock.clone(), lock::LOCK_TIMEOUT, move || {
        let settings = settings.clone();
        async move {
            if let Err(e) = crate::migrate::migrate(&paths) {
                warn!(error = %e, "legacy migration failed, continuing with existing state");
            }

            if let Some(existing) = gateway_record::read(&paths.gateway_record)? {
                if harness_core::pid_alive(existing.pid) {
                    if probe(&existing.host, existing.port, existing.auth_token.as_deref())
                        .await
                        .connected
                    {
                        return Ok((existing, false));
                    }
                }
            }

            let host = resolve_host(&settings);
            let port = resolve_port(&settings)?;

            if let Some(adopted) = adopt(&paths, &host, port, settings.auth_token.as_deref()).await? {
                return Ok((adopted, false));
            }

            spawn_and_wait(&paths, workspace_root, &host, port, settings.auth_token.as_deref()).await
        }
    })
    .await?
}

fn resolve_host(settings: &StartSettings) -> String {
    settings.host.clone().unwrap_or_else(|| "127.0.0.1".to_string())
}

fn resolve_port(settings: &StartSettings) -> Result<u16, SupervisorError> {
    if let Some(port) = settings.port.or_else(crate::env::control_plane_port) {
        return Ok(port);
    }
    reserve_port()
}

/// Binds an ephemeral TCP port, then releases it immediately so the daemon
/// can bind the same number moments later (4.6's `reservePort()`).
fn reserve_port() -> Result<u16, SupervisorError> {
    let listener = StdTcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

/// Adoption case (4.6 step 3, testable property 4): the record is missing or
/// stale, but a daemon is already reachable on the resolved port with the
/// supplied auth token. Overwrites the record with the adopted PID and
/// preserves the running daemon's actual `stateDbPath` rather than spawning
/// a second gateway.
async fn adopt(
    paths: &Paths,
    host: &str,
    port: u16,
    auth_token: Option<&str>,
) -> Result<Option<GatewayRecord>, SupervisorError> {
    let connected = tokio::time::timeout(PROBE_TIMEOUT, DaemonClient::connect(host, port, auth_token)).await;
    let Ok(Ok(mut client)) = connected else {
        return Ok(None);
    };

    let info = match tokio::time::timeout(
        PROBE_TIMEOUT,
        client.call(harness_daemon::protocol::Command::GatewayInfo),
    )
    .await
    {
        Ok(Ok(info)) => info,
        _ => return Ok(None),
    };

    let pid = info.get("pid").and_then(|v| v.as_u64()).unwrap_or_default() as u32;
    let state_db_path = info
        .get("stateDbPath")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let started_at = info
        .get("startedAt")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let record = GatewayRecord {
        version: 1,
        pid,
        host: host.to_string(),
        port,
        auth_token: auth_token.map(str::to_string),
        state_db_path,
        started_at,
        workspace_root: paths.workspace_root.display().to_string(),
    };
    gateway_record::write_atomic(&paths.gateway_record, &record)?;
    info!(pid = record.pid, host = %record.host, port = record.port, "adopted already-running gateway");
    Ok(Some(record))
}

async fn spawn_and_wait(
    paths: &Paths,
    workspace_root: &Path,
    host: &str,
    port: u16,
    auth_token: Option<&str>,
) -> Result<(GatewayRecord, bool), SupervisorError> {
    let binary = daemon_binary_path();
    let mut command = Command::new(&binary);
    command
        .arg("--workspace-root")
        .arg(workspace_root)
        .arg("--host")
        .arg(host)
        .arg("--port")
        .arg(port.to_string());
    if let Some(token) = auth_token {
        command.arg("--auth-token").arg(token);
    }

    command.env_clear();
    for key in ["PATH", "HOME"] {
        if let Ok(value) = std::env::var(key) {
            command.env(key, value);
        }
    }
    if let Some(key) = crate::env::anthropic_api_key() {
        command.env("ANTHROPIC_API_KEY", key);
    }

    std::fs::create_dir_all(&paths.runtime_root)?;
    let log = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.gateway_log)?;
    command
        .stdin(Stdio::null())
        .stdout(Stdio::from(log.try_clone()?))
        .stderr(Stdio::from(log));

    let mut child = command.spawn().map_err(|e| SupervisorError::StartupFailed(e.to_string()))?;

    let deadline = Instant::now() + STARTUP_TIMEOUT;
    loop {
        if let Some(status) = child.try_wait()? {
            return Err(SupervisorError::StartupFailed(format!(
                "gateway exited during startup: {status}. {}",
                tail_log(&paths.gateway_log)
            )));
        }
        if let Some(record) = gateway_record::read(&paths.gateway_record)? {
            if probe(&record.host, record.port, record.auth_token.as_deref()).await.connected {
                return Ok((record, true));
            }
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            return Err(SupervisorError::StartupTimeout);
        }
        tokio::time::sleep(STARTUP_POLL_INTERVAL).await;
    }
}

fn tail_log(log_path: &Path) -> String {
    let Ok(mut file) = std::fs::File::open(log_path) else {
        return String::new();
    };
    let mut contents = String::new();
    if file.read_to_string(&mut contents).is_err() {
        return String::new();
    }
    let tail: Vec<&str> = contents.lines().rev().take(10).collect();
    tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
}

fn daemon_binary_path() -> PathBuf {
    if let Some(path) = crate::env::daemon_script_path() {
        return path;
    }
    if let Ok(current_exe) = std::env::current_exe() {
        if let Some(dir) = current_exe.parent() {
            let sibling = dir.join("harnessd");
            if sibling.exists() {
                return sibling;
            }
        }
    }
    PathBuf::from("harnessd")
}

/// `probe(host, port, token)` (4.6): never raises, always returns a
/// structured result.
pub async fn probe(host: &str, port: u16, token: Option<&str>) -> ProbeResult {
    let connected = tokio::time::timeout(PROBE_TIMEOUT, DaemonClient::connect(host, port, token)).await;
    let Ok(Ok(mut client)) = connected else {
        return ProbeResult { connected: false, session_count: None, live_session_count: None };
    };

    let command = harness_daemon::protocol::Command::SessionList { limit: None };
    match tokio::time::timeout(PROBE_TIMEOUT, client.call(command)).await {
        Ok(Ok(result)) => {
            let sessions = result.get("sessions").and_then(|v| v.as_array()).map(Vec::len);
            let live = result.get("sessions").and_then(|v| v.as_array()).map(|rows| {
                rows.iter()
                    .filter(|r| matches!(r.get("status").and_then(|s| s.as_str()), Some("running") | Some("starting")))
                    .count()
            });
            ProbeResult { connected: true, session_count: sessions, live_session_count: live }
        }
        _ => ProbeResult { connected: false, session_count: None, live_session_count: None },
    }
}

/// `stop(force?)` (4.6): returns whether a gateway was actually stopped.
pub async fn stop(paths: &Paths, workspace_root: &Path, force: bool) -> Result<(bool, String), SupervisorError> {
    let paths = paths.clone();
    let workspace_root = workspace_root.to_path_buf();
    lock::with_lock_async(&paths.gateway_lock.clone(), lock::LOCK_TIMEOUT, move || {
        let paths = paths.clone();
        async move {
            let Some(record) = gateway_record::read(&paths.gateway_record)? else {
                if force {
                    let report = reap_workspace(&paths, &workspace_root);
                    let message = format!(
                        "gateway not running (no record)\norphan gateway daemon cleanup: scanned={} matched={} killed={}",
                        report.daemon_interpreter.scanned
                            + report.daemon_script.scanned
                            + report.sql_client.scanned
                            + report.pty_helper.scanned,
                        report.daemon_interpreter.matched
                            + report.daemon_script.matched
                            + report.sql_client.matched
                            + report.pty_helper.matched,
                        report.total_killed()
                    );
                    return Ok((false, message));
                }
                return Err(SupervisorError::NotRunning);
            };

            let outcome = harness_core::terminate(record.pid, STOP_GRACE);
            info!(pid = record.pid, outcome = ?outcome, "stopped gateway");

            let _ = reap_workspace(&paths, &workspace_root);

            gateway_record::remove(&paths.gateway_record)?;
            let _ = pointer::clear_if_matches(&paths.pointer_file, &paths.gateway_record.display().to_string());

            Ok((true, format!("gateway stopped ({outcome:?})")))
        }
    })
    .await?
}

fn reap_workspace(paths: &Paths, workspace_root: &Path) -> reaper::ReaperReport {
    let target = ReaperTarget {
        state_db_path: &paths.state_db_path.display().to_string(),
        daemon_script_path: crate::env::daemon_script_path().map(|p| p.display().to_string()).as_deref(),
        workspace_root,
    };
    let report = reaper::reap(&target, TERMINATION_GRACE);
    if report.total_killed() > 0 {
        info!(killed = report.total_killed(), "orphan reaper cleaned up leftover processes");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_port_returns_a_nonzero_ephemeral_port() {
        let port = reserve_port().unwrap();
        assert!(port > 0);
    }

    #[test]
    fn resolve_host_defaults_to_loopback() {
        assert_eq!(resolve_host(&StartSettings::default()), "127.0.0.1");
    }

    #[tokio::test]
    async fn probe_against_nothing_listening_is_not_connected() {
        let result = probe("127.0.0.1", 1, None).await;
        assert!(!result.connected);
    }
}
