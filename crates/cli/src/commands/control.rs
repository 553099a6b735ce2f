// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin CLI wrappers around `harness_engine::control::Controller` for the
//! `profile`, `status-timeline`, and `render-trace` subcommands. All the
//! state-machine logic already lives in the engine crate (4.13); this
//! module only resolves paths, prints results, and maps exit codes.

use std::path::PathBuf;
use std::process::Command as ChildCommand;

use harness_core::{Clock, Paths, SystemClock};
use harness_engine::{ControlKind, Controller};

use crate::output::OutputFormat;

pub fn start(paths: &Paths, kind: ControlKind, conversation_id: &str, output: &PathBuf) -> Result<(), String> {
    let mode = mode_for(kind);
    let controller = Controller::new(kind, paths.runtime_root.clone());
    let started_at = SystemClock.now_iso8601();
    let state = controller
        .start(conversation_id, mode, output, &started_at)
        .map_err(|e| e.to_string())?;
    println!("started {} for conversation {}", label(kind), state.conversation_id);
    Ok(())
}

pub fn stop(paths: &Paths, kind: ControlKind, format: OutputFormat) -> Result<(), String> {
    let controller = Controller::new(kind, paths.runtime_root.clone());
    let stopped = controller.stop().map_err(|e| e.to_string())?;
    match (format, stopped) {
        (OutputFormat::Json, Some(state)) => {
            println!("{}", serde_json::to_string(&state).map_err(|e| e.to_string())?);
        }
        (OutputFormat::Json, None) => println!("null"),
        (OutputFormat::Text, Some(state)) => {
            println!("stopped {} for conversation {}", label(kind), state.conversation_id);
        }
        (OutputFormat::Text, None) => println!("no active {} to stop", label(kind)),
    }
    Ok(())
}

/// `profile run` (§6): starts the profiler, runs `command` to completion,
/// then stops the profiler regardless of how the child exited.
pub fn run(
    paths: &Paths,
    conversation_id: &str,
    output: &PathBuf,
    command: &[String],
) -> Result<i32, String> {
    let controller = Controller::new(ControlKind::Profile, paths.runtime_root.clone());
    let started_at = SystemClock.now_iso8601();
    controller
        .start(conversation_id, "cpu", output, &started_at)
        .map_err(|e| e.to_string())?;

    let status = match command.split_first() {
        Some((program, args)) => ChildCommand::new(program)
            .args(args)
            .status()
            .map_err(|e| e.to_string()),
        None => Err("profile run requires a command to execute".to_string()),
    };

    let _ = controller.stop();

    let status = status?;
    Ok(status.code().unwrap_or(1))
}

fn mode_for(kind: ControlKind) -> &'static str {
    match kind {
        ControlKind::Profile => "cpu",
        ControlKind::StatusTimeline => "status-timeline",
        ControlKind::RenderTrace => "render-trace",
    }
}

fn label(kind: ControlKind) -> &'static str {
    match kind {
        ControlKind::Profile => "profile",
        ControlKind::StatusTimeline => "status timeline",
        ControlKind::RenderTrace => "render trace",
    }
}
