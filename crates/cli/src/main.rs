// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! harness — CLI front door for the workspace-local agent harness: drives
//! the Gateway Supervisor, Legacy Migrator, Workspace Lock, and Orphan
//! Reaper, then hands off to the daemon over the Stream Transport for
//! everything else (§1, §6).

mod client;
mod color;
mod commands;
mod env;
mod lock;
mod migrate;
mod output;
mod poll;
mod reaper;
mod supervisor;
mod table;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use harness_core::paths::{self, SystemEnv};
use harness_engine::ControlKind;

use output::OutputFormat;
use supervisor::StartSettings;

#[derive(Parser)]
#[command(name = "harness", version, about = "Workspace-local agent harness CLI", styles = color::styles())]
struct Cli {
    /// Operate on a named session instead of the default gateway.
    #[arg(long, global = true, value_name = "NAME")]
    session: Option<String>,

    /// Output format for commands that support it.
    #[arg(short = 'o', long = "output", value_enum, default_value_t, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start, stop, and inspect the gateway daemon.
    #[command(subcommand)]
    Gateway(GatewayCommand),
    /// CPU profiling of a conversation's gateway process.
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Recorded status-line timeline capture.
    #[command(subcommand)]
    StatusTimeline(TraceCommand),
    /// Recorded render-trace capture.
    #[command(subcommand)]
    RenderTrace(TraceCommand),
}

#[derive(Subcommand)]
enum GatewayCommand {
    /// Start the gateway for this workspace, adopting a live one if found.
    Start {
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        auth_token: Option<String>,
        #[arg(long)]
        state_db_path: Option<PathBuf>,
    },
    /// Stop the gateway, terminating orphaned helper processes too.
    Stop {
        #[arg(long)]
        force: bool,
    },
    /// Show whether the gateway is running and reachable.
    Status,
    /// Ensure the gateway is running, then launch the mux client.
    Run {
        #[arg(trailing_var_arg = true)]
        mux_args: Vec<String>,
    },
    /// List the default gateway and every named session's gateway.
    List,
    /// Remove stale named-session runtime directories.
    Gc {
        #[arg(long, value_name = "SECONDS")]
        max_age_secs: Option<u64>,
    },
    /// Send one raw command frame to the running gateway (scripting escape hatch).
    Call {
        /// JSON-encoded command, e.g. '{"type":"session.list"}'
        command: String,
    },
}

#[derive(Subcommand)]
enum ProfileCommand {
    Start {
        #[arg(long)]
        conversation_id: String,
        #[arg(long)]
        output: PathBuf,
    },
    Stop,
    Run {
        #[arg(long)]
        conversation_id: String,
        #[arg(long)]
        output: PathBuf,
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
}

#[derive(Subcommand)]
enum TraceCommand {
    Start {
        #[arg(long)]
        conversation_id: String,
        #[arg(long)]
        output: PathBuf,
    },
    Stop,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(message) => {
            if !message.is_empty() {
                eprintln!("error: {message}");
            }
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<i32, String> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).try_init().ok();

    let workspace_root = env::invoke_cwd().map_err(|e| e.to_string())?;
    let paths = paths::resolve(&workspace_root, cli.session.as_deref(), &SystemEnv).map_err(|e| e.to_string())?;

    match cli.command {
        Commands::Gateway(cmd) => run_gateway(cmd, &workspace_root, &paths, cli.output).await,
        Commands::Profile(cmd) => run_profile(cmd, &paths, cli.output),
        Commands::StatusTimeline(cmd) => run_trace(cmd, &paths, ControlKind::StatusTimeline, cli.output),
        Commands::RenderTrace(cmd) => run_trace(cmd, &paths, ControlKind::RenderTrace, cli.output),
    }
}

async fn run_gateway(
    cmd: GatewayCommand,
    workspace_root: &std::path::Path,
    paths: &harness_core::Paths,
    output: OutputFormat,
) -> Result<i32, String> {
    match cmd {
        GatewayCommand::Start { port, host, auth_token, state_db_path } => {
            let settings = StartSettings { host, port, auth_token, state_db_path };
            commands::gateway::start(paths, workspace_root, &settings, output).await?;
            Ok(0)
        }
        GatewayCommand::Stop { force } => commands::gateway::stop(paths, workspace_root, force).await,
        GatewayCommand::Status => {
            commands::gateway::status(paths, output).await?;
            Ok(0)
        }
        GatewayCommand::Run { mux_args } => {
            let settings = StartSettings::default();
            commands::gateway::run(paths, workspace_root, &settings, &mux_args).await
        }
        GatewayCommand::List => {
            commands::gateway::list(paths, output).await?;
            Ok(0)
        }
        GatewayCommand::Gc { max_age_secs } => {
            let max_age = max_age_secs.map(Duration::from_secs).unwrap_or(harness_storage::gc::DEFAULT_MAX_AGE);
            commands::gateway::gc(paths, max_age)?;
            Ok(0)
        }
        GatewayCommand::Call { command } => {
            commands::gateway::call(paths, &command).await?;
            Ok(0)
        }
    }
}

fn run_profile(cmd: ProfileCommand, paths: &harness_core::Paths, output: OutputFormat) -> Result<i32, String> {
    match cmd {
        ProfileCommand::Start { conversation_id, output: out } => {
            commands::control::start(paths, ControlKind::Profile, &conversation_id, &out)?;
            Ok(0)
        }
        ProfileCommand::Stop => {
            commands::control::stop(paths, ControlKind::Profile, output)?;
            Ok(0)
        }
        ProfileCommand::Run { conversation_id, output: out, command } => {
            commands::control::run(paths, &conversation_id, &out, &command)
        }
    }
}

fn run_trace(cmd: TraceCommand, paths: &harness_core::Paths, kind: ControlKind, output: OutputFormat) -> Result<i32, String> {
    match cmd {
        TraceCommand::Start { conversation_id, output: out } => {
            commands::control::start(paths, kind, &conversation_id, &out)?;
            Ok(0)
        }
        TraceCommand::Stop => {
            commands::control::stop(paths, kind, output)?;
            Ok(0)
        }
    }
}
