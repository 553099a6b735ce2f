// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! harnessd — the gateway daemon.
//!
//! Architecture (per-process, one gateway per workspace or named session):
//! - Lifecycle: binds the Stream Transport listener, opens the Session
//!   Store, writes the Gateway Record (and default Pointer) only after the
//!   bind succeeds.
//! - Listener: accepts connections, demands auth, multiplexes
//!   command/response traffic with broadcast envelopes (4.7).
//! - Hub: the in-process dispatcher sitting between the listener and the
//!   PTY Engine / Session Store.
//!
//! `harnessd` is normally spawned by the `harness` CLI's Gateway Supervisor
//! and should not be invoked directly by end users.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;
use std::time::Duration;

use harness_core::paths::{self, SystemEnv};
use harness_daemon::lifecycle::{self, Config, LifecycleError};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolved from flags, with the legacy `HARNESS_CONTROL_PLANE_PORT`
/// environment override (§6) honored when `--port` is not given. Everything
/// else is always passed explicitly by the CLI's Gateway Supervisor when it
/// spawns this process — it already resolved host/session/auth-token once
/// and must not let this process re-derive different values.
struct Args {
    workspace_root: PathBuf,
    session_name: Option<String>,
    host: String,
    port: u16,
    auth_token: Option<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut workspace_root = std::env::current_dir().map_err(|e| e.to_string())?;
    let mut session_name = None;
    let mut host = "127.0.0.1".to_string();
    let mut port: u16 = std::env::var("HARNESS_CONTROL_PLANE_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let mut auth_token = None;

    let mut args = std::env::args().skip(1).peekable();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("harnessd {VERSION}");
                std::process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--workspace-root" => {
                workspace_root = PathBuf::from(args.next().ok_or("--workspace-root requires a value")?);
            }
            "--session" => {
                session_name = Some(args.next().ok_or("--session requires a value")?);
            }
            "--host" => {
                host = args.next().ok_or("--host requires a value")?;
            }
            "--port" => {
                let value = args.next().ok_or("--port requires a value")?;
                port = value.parse().map_err(|_| format!("invalid --port value: {value}"))?;
            }
            "--auth-token" => {
                auth_token = Some(args.next().ok_or("--auth-token requires a value")?);
            }
            other => return Err(format!("unexpected argument '{other}'")),
        }
    }

    Ok(Args { workspace_root, session_name, host, port, auth_token })
}

fn print_help() {
    println!("harnessd {VERSION}");
    println!("Gateway daemon for the workspace-local agent harness.");
    println!();
    println!("harnessd is normally started by `harness gateway start` and should not");
    println!("be invoked directly.");
    println!();
    println!("OPTIONS:");
    println!("    --workspace-root <path>   Workspace this gateway serves (default: cwd)");
    println!("    --session <name>          Named session (default: unnamed gateway)");
    println!("    --host <host>             Bind host (default: 127.0.0.1)");
    println!("    --port <port>             Bind port, 0 for ephemeral (default: 0)");
    println!("    --auth-token <token>      Require this token on the first frame");
    println!("    -h, --help                Print help information");
    println!("    -v, --version             Print version information");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("Usage: harnessd [--workspace-root <path>] [--session <name>] [--host <host>] [--port <port>] [--auth-token <token>]");
            std::process::exit(1);
        }
    };

    let paths = paths::resolve(&args.workspace_root, args.session_name.as_deref(), &SystemEnv)
        .map_err(|e| format!("failed to resolve paths: {e}"))?;

    let log_guard = setup_logging(&paths.runtime_root.join("gateway.log"))?;

    let config = Config {
        workspace_root: args.workspace_root.clone(),
        session_name: args.session_name.clone(),
        host: args.host.clone(),
        port: args.port,
        auth_token: args.auth_token.clone(),
        paths,
    };

    info!(workspace_root = %config.workspace_root.display(), "starting gateway");

    let startup = match lifecycle::startup(&config).await {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "failed to start gateway");
            drop(log_guard);
            return Err(Box::new(e));
        }
    };

    spawn_resize_driver(startup.hub.clone());

    println!("READY port={}", startup.listener.local_addr()?.port());

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = harness_daemon::listener::run(startup.listener, startup.hub.clone()) => {}
        _ = sigterm.recv() => {
            info!("received SIGTERM, shutting down");
        }
        _ = sigint.recv() => {
            info!("received SIGINT, shutting down");
        }
    }

    lifecycle::shutdown(&config, &startup.hub);
    info!("gateway stopped");
    Ok(())
}

/// Resize coalescer tick resolution (4.10's min-interval/settle window is in
/// the tens of milliseconds, so a much finer tick would just spin).
const RESIZE_TICK: Duration = Duration::from_millis(10);

/// Periodically commits any resize requests the coalescer deferred.
fn spawn_resize_driver<P>(hub: std::sync::Arc<harness_daemon::Hub<P>>)
where
    P: harness_adapters::PtyAdapter + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RESIZE_TICK);
        loop {
            interval.tick().await;
            let due = hub.resize.lock().due(std::time::Instant::now());
            for (session_id, (cols, rows)) in due {
                if let Err(e) = hub.pty.resize(session_id.as_str(), cols, rows).await {
                    tracing::warn!(session_id = %session_id, error = %e, "deferred resize failed");
                }
            }
        }
    });
}

fn setup_logging(log_path: &std::path::Path) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_appender = tracing_appender::rolling::never(
        log_path.parent().expect("log_path always has a parent"),
        log_path.file_name().expect("log_path always has a file name"),
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
