// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orphan Reaper (4.5): finds and terminates processes left behind by a
//! workspace's gateway after its record has gone stale, using the same
//! process-table helpers as `harness_storage::gc` — never shells out to
//! `kill`.

use std::path::Path;
use std::time::Duration;

use harness_core::process::{scan, terminate, TerminateOutcome};

/// `terminationGraceMs` (4.5): default grace period before a force-kill.
pub const TERMINATION_GRACE: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryReport {
    pub scanned: u32,
    pub matched: u32,
    pub killed: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaperReport {
    pub daemon_interpreter: CategoryReport,
    pub daemon_script: CategoryReport,
    pub sql_client: CategoryReport,
    pub pty_helper: CategoryReport,
}

impl ReaperReport {
    pub fn total_killed(&self) -> u32 {
        self.daemon_interpreter.killed
            + self.daemon_script.killed
            + self.sql_client.killed
            + self.pty_helper.killed
    }
}

/// What the reaper needs to know to recognize this workspace's processes.
pub struct ReaperTarget<'a> {
    pub state_db_path: &'a str,
    pub daemon_script_path: Option<&'a str>,
    pub workspace_root: &'a Path,
}

pub fn reap(target: &ReaperTarget<'_>, grace: Duration) -> ReaperReport {
    let mut report = ReaperReport::default();

    report.daemon_interpreter = reap_category(grace, |cmd| {
        cmd.contains("--state-db-path") && cmd.contains(target.state_db_path)
    });

    if let Some(script) = target.daemon_script_path {
        report.daemon_script = reap_category(grace, |cmd| cmd.contains(script));
    }

    report.sql_client = reap_category(grace, |cmd| {
        is_sql_client(cmd) && cmd.contains(target.state_db_path)
    });

    let workspace_prefix = format!("{}/", target.workspace_root.display());
    report.pty_helper = reap_category(grace, |cmd| {
        cmd.split_whitespace()
            .next()
            .is_some_and(|argv0| argv0.starts_with(&workspace_prefix))
    });

    report
}

fn is_sql_client(cmd: &str) -> bool {
    let first = cmd.split_whitespace().next().unwrap_or("");
    let name = first.rsplit('/').next().unwrap_or(first);
    matches!(name, "sqlite3" | "psql" | "mysql")
}

fn reap_category(grace: Duration, predicate: impl Fn(&str) -> bool) -> CategoryReport {
    let matches = scan(predicate);
    let mut report = CategoryReport { scanned: matches.len() as u32, matched: matches.len() as u32, killed: 0 };
    for m in matches {
        match terminate(m.pid, grace) {
            TerminateOutcome::Graceful | TerminateOutcome::ForceKilled => report.killed += 1,
            TerminateOutcome::AlreadyGone => {}
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_client_detection_matches_common_binaries() {
        assert!(is_sql_client("/usr/bin/sqlite3 /tmp/db.sqlite"));
        assert!(is_sql_client("psql -d mydb"));
        assert!(!is_sql_client("/usr/bin/harnessd --state-db-path /tmp/db"));
    }

    #[test]
    fn reaping_with_no_matches_reports_zeros() {
        let target = ReaperTarget {
            state_db_path: "/nonexistent/path/that/will/never/match.sqlite",
            daemon_script_path: None,
            workspace_root: Path::new("/nonexistent/workspace/that/will/never/match"),
        };
        let report = reap(&target, Duration::from_millis(10));
        assert_eq!(report.total_killed(), 0);
    }
}
