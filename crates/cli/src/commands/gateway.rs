// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `gateway {start|stop|status|run|list|gc|call}` — the CLI surface over
//! the Gateway Supervisor (4.6), Stream Transport client, and Garbage
//! Collector (4.12).

use std::path::Path;
use std::time::Duration;

use harness_core::{pid_alive, GatewayRecord, Paths};
use harness_daemon::protocol::Command;

use crate::client::DaemonClient;
use crate::color;
use crate::output::OutputFormat;
use crate::supervisor::{self, ProbeResult, StartSettings};
use crate::table::{Column, Table};

pub async fn start(
    paths: &Paths,
    workspace_root: &Path,
    settings: &StartSettings,
    format: OutputFormat,
) -> Result<(), String> {
    let (record, started) = supervisor::ensure_running(paths, workspace_root, settings)
        .await
        .map_err(|e| e.to_string())?;
    match format {
        OutputFormat::Json => {
            let payload = serde_json::json!({ "record": record, "started": started });
            println!("{}", serde_json::to_string(&payload).map_err(|e| e.to_string())?);
        }
        OutputFormat::Text => {
            let verb = if started { "started" } else { "already running" };
            println!(
                "gateway {verb} on {}:{} (pid {})",
                record.host, record.port, record.pid
            );
        }
    }
    Ok(())
}

/// Returns the process exit code: 0 when a running gateway was actually
/// stopped, 1 when `--force` found no record to act on (S6).
pub async fn stop(paths: &Paths, workspace_root: &Path, force: bool) -> Result<i32, String> {
    let (stopped, message) = supervisor::stop(paths, workspace_root, force)
        .await
        .map_err(|e| e.to_string())?;
    println!("{message}");
    Ok(if stopped { 0 } else { 1 })
}

pub async fn status(paths: &Paths, format: OutputFormat) -> Result<(), String> {
    let record = harness_core::gateway_record::read(&paths.gateway_record).map_err(|e| e.to_string())?;
    let Some(record) = record else {
        match format {
            OutputFormat::Json => println!("{{\"running\":false}}"),
            OutputFormat::Text => println!("gateway status: stopped"),
        }
        return Ok(());
    };

    let alive = pid_alive(record.pid);
    let probe = if alive {
        supervisor::probe(&record.host, record.port, record.auth_token.as_deref()).await
    } else {
        ProbeResult { connected: false, session_count: None, live_session_count: None }
    };

    match format {
        OutputFormat::Json => {
            let payload = serde_json::json!({
                "running": true,
                "record": record,
                "connected": probe.connected,
                "sessionCount": probe.session_count,
                "liveSessionCount": probe.live_session_count,
            });
            println!("{}", serde_json::to_string(&payload).map_err(|e| e.to_string())?);
        }
        OutputFormat::Text => {
            let status_word = if probe.connected { "running" } else { "exited" };
            println!("status: {}", color::apply_status(status_word));
            println!("pid:    {}", record.pid);
            println!("addr:   {}:{}", record.host, record.port);
            if let Some(count) = probe.session_count {
                println!("sessions: {count}");
            }
        }
    }
    Ok(())
}

pub async fn run(
    paths: &Paths,
    workspace_root: &Path,
    settings: &StartSettings,
    mux_args: &[String],
) -> Result<i32, String> {
    let (record, _started) = supervisor::ensure_running(paths, workspace_root, settings)
        .await
        .map_err(|e| e.to_string())?;

    let mux_path = crate::env::mux_script_path().unwrap_or_else(|| "harness-mux".into());
    let mut command = std::process::Command::new(mux_path);
    command
        .args(mux_args)
        .env("HARNESS_CONTROL_PLANE_PORT", record.port.to_string())
        .env("HARNESS_CONTROL_PLANE_HOST", &record.host);
    if let Some(token) = &record.auth_token {
        command.env("HARNESS_GATEWAY_AUTH_TOKEN", token);
    }
    if let Some(key) = crate::env::anthropic_api_key() {
        command.env("ANTHROPIC_API_KEY", key);
    }

    let status = command.status().map_err(|e| e.to_string())?;
    Ok(status.code().unwrap_or(1))
}

/// Lists the unnamed gateway plus every named session's gateway under this
/// workspace's runtime root.
pub async fn list(paths: &Paths, format: OutputFormat) -> Result<(), String> {
    let mut records: Vec<(String, GatewayRecord)> = Vec::new();

    if let Some(record) = harness_core::gateway_record::read(&paths.gateway_record).map_err(|e| e.to_string())? {
        records.push(("(default)".to_string(), record));
    }

    let sessions_dir = paths.runtime_root.join("sessions");
    if let Ok(entries) = std::fs::read_dir(&sessions_dir) {
        for entry in entries.flatten() {
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let record_path = entry.path().join("gateway.json");
            if let Some(record) = harness_core::gateway_record::read(&record_path).map_err(|e| e.to_string())? {
                records.push((name, record));
            }
        }
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(&records).map_err(|e| e.to_string())?);
        }
        OutputFormat::Text => {
            let mut table = Table::new(vec![
                Column::left("SESSION"),
                Column::status("STATUS"),
                Column::left("ADDR"),
                Column::right("PID"),
            ]);
            for (name, record) in &records {
                let status = if pid_alive(record.pid) { "running" } else { "exited" };
                table.row(vec![
                    name.clone(),
                    status.to_string(),
                    format!("{}:{}", record.host, record.port),
                    record.pid.to_string(),
                ]);
            }
            table.render(&mut std::io::stdout());
        }
    }
    Ok(())
}

pub fn gc(paths: &Paths, max_age: Duration) -> Result<(), String> {
    let report = harness_storage::gc(&paths.runtime_root, max_age).map_err(|e| e.to_string())?;
    println!(
        "gc: scanned={} removed={} skipped_live={}",
        report.scanned, report.removed, report.skipped_live
    );
    Ok(())
}

/// `gateway call <json>` (debugging/scripting escape hatch): sends one raw
/// command frame and prints the raw response.
pub async fn call(paths: &Paths, raw_command: &str) -> Result<(), String> {
    let record = harness_core::gateway_record::read(&paths.gateway_record)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "no gateway is running for this workspace".to_string())?;

    let command: Command = serde_json::from_str(raw_command).map_err(|e| format!("invalid command json: {e}"))?;
    let mut client = DaemonClient::connect(&record.host, record.port, record.auth_token.as_deref())
        .await
        .map_err(|e| e.to_string())?;
    let result = client.call(command).await.map_err(|e| e.to_string())?;
    println!("{}", serde_json::to_string(&result).map_err(|e| e.to_string())?);
    Ok(())
}
