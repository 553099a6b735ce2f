//! Test helpers for behavioral specifications.
//!
//! Provides a high-level DSL for driving the `harness` CLI black-box.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Returns the path to a binary, checking the llvm-cov target directory
/// first. Falls back to resolving relative to the test binary itself when
/// `CARGO_MANIFEST_DIR` is stale (e.g. compiled by a removed worktree into a
/// shared target directory).
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let llvm_cov_path = manifest_dir.join("target/llvm-cov-target/debug").join(name);
    if llvm_cov_path.exists() {
        return llvm_cov_path;
    }

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

/// Returns the path to the `harness` CLI binary.
fn harness_binary() -> PathBuf {
    binary_path("harness")
}

/// Returns the path to the `harnessd` daemon binary.
pub fn harnessd_binary() -> PathBuf {
    binary_path("harnessd")
}

/// Returns a `Command` configured to run the `harness` binary.
pub fn harness_cmd() -> Command {
    Command::new(harness_binary())
}

/// Creates a CLI builder for `harness` commands.
pub fn cli() -> CliBuilder {
    CliBuilder::new()
}

/// High-level CLI builder for fluent test assertions.
pub struct CliBuilder {
    args: Vec<String>,
    dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl CliBuilder {
    fn new() -> Self {
        Self {
            args: Vec::new(),
            dir: None,
            envs: vec![("HARNESS_DAEMON_SCRIPT_PATH".into(), harnessd_binary().to_string_lossy().into())],
        }
    }

    /// Adds CLI arguments.
    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Sets the working directory.
    pub fn pwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.dir = Some(path.into());
        self
    }

    /// Sets an environment variable.
    pub fn env(mut self, key: &str, value: impl AsRef<Path>) -> Self {
        self.envs.push((key.to_string(), value.as_ref().to_string_lossy().to_string()));
        self
    }

    /// Builds the command without running it.
    pub fn command(self) -> Command {
        let mut cmd = harness_cmd();
        cmd.args(&self.args);

        if let Some(dir) = self.dir {
            cmd.current_dir(dir);
        }

        // Prevent a parent HARNESS_INVOKE_CWD from leaking into tests; it
        // would override the CWD-based workspace root resolution.
        cmd.env_remove("HARNESS_INVOKE_CWD");
        cmd.env_remove("INIT_CWD");

        for (key, value) in self.envs {
            cmd.env(key, value);
        }

        cmd
    }

    /// Runs and expects success (exit code 0).
    pub fn passes(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("command should run");
        assert!(
            output.status.success(),
            "expected command to pass, got exit code {:?}\nstdout: {}\nstderr: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    /// Runs and expects failure (non-zero exit code).
    pub fn fails(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("command should run");
        assert!(
            !output.status.success(),
            "expected command to fail, but it passed\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    /// Runs without asserting on the exit code, for scenarios that check
    /// the code themselves (e.g. S6's "exit 1 is the documented outcome").
    pub fn run(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("command should run");
        RunAssert { output }
    }
}

/// Result of a CLI run, for chaining assertions.
pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn code(&self) -> Option<i32> {
        self.output.status.code()
    }

    pub fn code_eq(self, expected: i32) -> Self {
        assert_eq!(self.output.status.code(), Some(expected), "stdout: {}\nstderr: {}", self.stdout(), self.stderr());
        self
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(stdout.contains(expected), "stdout does not contain '{}'\nstdout: {}", expected, stdout);
        self
    }

    pub fn stdout_lacks(self, unexpected: &str) -> Self {
        let stdout = self.stdout();
        assert!(!stdout.contains(unexpected), "stdout should not contain '{}'\nstdout: {}", unexpected, stdout);
        self
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(stderr.contains(expected), "stderr does not contain '{}'\nstderr: {}", expected, stderr);
        self
    }
}

// =============================================================================
// Polling
// =============================================================================

/// Polls a condition until it returns true or the timeout is reached.
pub fn wait_for<F>(timeout_ms: u64, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_millis(timeout_ms);
    let poll_interval = std::time::Duration::from_millis(20);

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(poll_interval);
    }
    false
}

// =============================================================================
// Workspace
// =============================================================================

/// A temporary workspace directory plus an isolated home/cache/config tree,
/// so tests never touch the real `$HOME`.
pub struct Workspace {
    dir: tempfile::TempDir,
    home_dir: tempfile::TempDir,
}

impl Workspace {
    /// Creates an empty workspace.
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
            home_dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The isolated `$XDG_CACHE_HOME` this workspace's gateway runtime
    /// state (gateway record, log, state DB) is written under.
    pub fn cache_root(&self) -> PathBuf {
        self.home_dir.path().join("cache")
    }

    /// Recursively finds a file named `name` under this workspace's cache
    /// root, for tests that need the gateway record path without
    /// re-implementing the workspace-root hash.
    pub fn find_under_cache(&self, name: &str) -> Option<PathBuf> {
        find_file(&self.cache_root(), name)
    }

    /// Writes a file at the given path (parent directories created automatically).
    pub fn file(&self, path: impl AsRef<Path>, content: &str) {
        let full_path = self.dir.path().join(path.as_ref());
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full_path, content).unwrap();
    }

    /// Runs a `harness` command in this workspace's context, with an
    /// isolated `HOME`/`XDG_CACHE_HOME`/`XDG_CONFIG_HOME`.
    pub fn harness(&self) -> CliBuilder {
        cli()
            .pwd(self.path())
            .env("HOME", self.home_dir.path())
            .env("XDG_CACHE_HOME", self.home_dir.path().join("cache"))
            .env("XDG_CONFIG_HOME", self.home_dir.path().join("config"))
    }

    /// Sends one raw command frame via `gateway call` and parses the
    /// response as JSON.
    pub fn call(&self, command_json: &str) -> serde_json::Value {
        let stdout = self.harness().args(&["gateway", "call", command_json]).passes().stdout();
        serde_json::from_str(stdout.trim()).expect("call response should be JSON")
    }
}

fn find_file(root: &Path, name: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(root).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = find_file(&path, name) {
                return Some(found);
            }
        } else if path.file_name().and_then(|n| n.to_str()) == Some(name) {
            return Some(path);
        }
    }
    None
}

impl Drop for Workspace {
    fn drop(&mut self) {
        // Always try to stop the gateway (no-op if not running).
        let mut cmd = self.harness().args(&["gateway", "stop", "--force"]).command();
        cmd.stdout(std::process::Stdio::null()).stderr(std::process::Stdio::null());
        let _ = cmd.status();
    }
}
