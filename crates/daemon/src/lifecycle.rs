// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway process lifecycle: bind, write the Gateway Record, open the
//! Session Store, and the reverse on shutdown (§3, 4.6's daemon-side half).

use std::path::PathBuf;
use std::sync::Arc;

use harness_adapters::{PtyAdapter, RealPtyAdapter, TracedPty};
use harness_core::{gateway_record, pointer, Clock, GatewayRecord, Paths, SystemClock};
use harness_storage::Store;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::hub::Hub;

#[derive(Debug, Clone)]
pub struct Config {
    pub workspace_root: PathBuf,
    pub session_name: Option<String>,
    pub host: String,
    /// 0 means "pick any free ephemeral port".
    pub port: u16,
    pub auth_token: Option<String>,
    pub paths: Paths,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to bind {host}:{port}: {source}")]
    BindFailed { host: String, port: u16, source: std::io::Error },
    #[error("storage error: {0}")]
    Storage(#[from] harness_storage::StoreError),
    #[error("gateway record error: {0}")]
    Record(#[from] harness_core::GatewayRecordError),
    #[error("gateway pointer error: {0}")]
    Pointer(#[from] harness_core::pointer::PointerError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct StartupResult {
    pub listener: TcpListener,
    pub hub: Arc<Hub<TracedPty<RealPtyAdapter>>>,
    pub record_path: PathBuf,
}

/// Binds the listener, opens the state DB, and writes the Gateway Record
/// (and the default pointer, for the unnamed session) only after the bind
/// succeeds — so a record never outlives a port it doesn't actually hold.
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.paths.runtime_root)?;

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|source| LifecycleError::BindFailed {
            host: config.host.clone(),
            port: config.port,
            source,
        })?;
    let bound_port = listener.local_addr()?.port();

    let store = Arc::new(Store::open(&config.paths.state_db_path)?);

    let pty = TracedPty::new(RealPtyAdapter::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state_db_path = config.paths.state_db_path.display().to_string();
    let started_at = clock.now_iso8601();
    let hub = Arc::new(Hub::new(
        store,
        pty,
        Arc::clone(&clock),
        config.auth_token.clone(),
        config.host.clone(),
        bound_port,
        state_db_path.clone(),
        started_at.clone(),
    ));

    let record = GatewayRecord {
        version: 1,
        pid: std::process::id(),
        host: config.host.clone(),
        port: bound_port,
        auth_token: config.auth_token.clone(),
        state_db_path,
        started_at,
        workspace_root: config.workspace_root.display().to_string(),
    };
    gateway_record::write_atomic(&config.paths.gateway_record, &record)?;

    if config.session_name.is_none() {
        let now = clock.now_iso8601();
        let ptr = pointer::GatewayPointer {
            version: 1,
            workspace_root: config.workspace_root.display().to_string(),
            workspace_runtime_root: config.paths.runtime_root.display().to_string(),
            gateway_record_path: config.paths.gateway_record.display().to_string(),
            gateway_log_path: config.paths.gateway_log.display().to_string(),
            state_db_path: config.paths.state_db_path.display().to_string(),
            pid: record.pid,
            started_at: record.started_at.clone(),
            updated_at: now,
            gateway_run_id: uuid::Uuid::new_v4().to_string(),
        };
        pointer::write_atomic(&config.paths.pointer_file, &ptr)?;
    }

    info!(host = %config.host, port = bound_port, "gateway started");

    Ok(StartupResult {
        listener,
        hub,
        record_path: config.paths.gateway_record.clone(),
    })
}

/// Graceful shutdown: broadcasts `gateway.shutdown`, removes the Gateway
/// Record (3(v)), and clears the default pointer if it still points here.
pub fn shutdown<P: PtyAdapter>(config: &Config, hub: &Hub<P>) {
    let _ = hub.envelopes.send(crate::protocol::Envelope::GatewayShutdown {
        reason: "stop requested".to_string(),
    });

    if let Err(e) = gateway_record::remove(&config.paths.gateway_record) {
        warn!(error = %e, "failed to remove gateway record on shutdown");
    }
    if config.session_name.is_none() {
        match pointer::clear_if_matches(&config.paths.pointer_file, &config.paths.gateway_record.display().to_string()) {
            Ok(_) => {}
            Err(e) => warn!(error = %e, "failed to clear gateway pointer on shutdown"),
        }
    }
    info!("gateway shutdown complete");
}
