// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access (§6's "recognized" list) — the
//! one place in this crate allowed to call `std::env::var`, mirroring the
//! donor's single `env.rs` module per crate.

use std::path::PathBuf;

/// The directory the CLI should treat as the workspace root: `cwd`, unless
/// overridden by the invoking shell wrapper (`HARNESS_INVOKE_CWD`) or a
/// package-manager-style fallback (`INIT_CWD`).
pub fn invoke_cwd() -> std::io::Result<PathBuf> {
    if let Some(dir) = non_empty("HARNESS_INVOKE_CWD") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(dir) = non_empty("INIT_CWD") {
        return Ok(PathBuf::from(dir));
    }
    std::env::current_dir()
}

/// Legacy port override (§6), honored when `--port` is not given.
pub fn control_plane_port() -> Option<u16> {
    non_empty("HARNESS_CONTROL_PLANE_PORT").and_then(|s| s.parse().ok())
}

/// Override for the daemon binary's path, used by tests to point at a
/// freshly built `harnessd` without relying on `PATH`.
pub fn daemon_script_path() -> Option<PathBuf> {
    non_empty("HARNESS_DAEMON_SCRIPT_PATH").map(PathBuf::from)
}

/// Override for the mux client binary's path (§6). The mux itself is an
/// out-of-scope external collaborator (§1); this crate only needs to know
/// where to find one when `gateway run` is asked to launch it.
pub fn mux_script_path() -> Option<PathBuf> {
    non_empty("HARNESS_MUX_SCRIPT_PATH").map(PathBuf::from)
}

/// Forwarded to the mux when present (§6); the CLI never reads the key
/// material itself, only passes the variable through to a spawned child.
pub fn anthropic_api_key() -> Option<String> {
    non_empty("ANTHROPIC_API_KEY")
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn invoke_cwd_prefers_harness_invoke_cwd() {
        std::env::set_var("HARNESS_INVOKE_CWD", "/tmp/example-workspace");
        std::env::remove_var("INIT_CWD");
        assert_eq!(invoke_cwd().unwrap(), PathBuf::from("/tmp/example-workspace"));
        std::env::remove_var("HARNESS_INVOKE_CWD");
    }

    #[test]
    #[serial]
    fn falls_back_to_init_cwd_then_actual_cwd() {
        std::env::remove_var("HARNESS_INVOKE_CWD");
        std::env::set_var("INIT_CWD", "/tmp/init-cwd-example");
        assert_eq!(invoke_cwd().unwrap(), PathBuf::from("/tmp/init-cwd-example"));
        std::env::remove_var("INIT_CWD");
    }

    #[test]
    #[serial]
    fn control_plane_port_parses_env_override() {
        std::env::set_var("HARNESS_CONTROL_PLANE_PORT", "6553");
        assert_eq!(control_plane_port(), Some(6553));
        std::env::remove_var("HARNESS_CONTROL_PLANE_PORT");
    }

    #[test]
    #[serial]
    fn empty_vars_are_treated_as_unset() {
        std::env::set_var("HARNESS_CONTROL_PLANE_PORT", "");
        assert_eq!(control_plane_port(), None);
        std::env::remove_var("HARNESS_CONTROL_PLANE_PORT");
    }
}
