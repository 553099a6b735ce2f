// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin process-table helpers backing the Orphan Reaper (4.5) and the
//! Garbage Collector's liveness check (4.12). Shared between
//! `harness-storage::gc` and `harness-cli::reaper` so both scan processes
//! the same way.

use std::time::{Duration, Instant};

use sysinfo::{Pid, Signal, System};

/// A process the reaper's predicate matched.
#[derive(Debug, Clone)]
pub struct ProcessMatch {
    pub pid: u32,
    pub command_line: String,
}

/// Whether a PID currently names a live process.
pub fn pid_alive(pid: u32) -> bool {
    let mut sys = System::new();
    sys.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
    sys.process(Pid::from_u32(pid)).is_some()
}

/// Scans the process table and returns every process (other than the
/// caller) whose command line satisfies `predicate`.
pub fn scan<F>(predicate: F) -> Vec<ProcessMatch>
where
    F: Fn(&str) -> bool,
{
    let mut sys = System::new_all();
    sys.refresh_processes(sysinfo::ProcessesToUpdate::All, true);
    let own_pid = std::process::id();
    sys.processes()
        .iter()
        .filter(|(pid, _)| pid.as_u32() != own_pid)
        .filter_map(|(pid, proc_)| {
            let command_line = proc_
                .cmd()
                .iter()
                .map(|s| s.to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join(" ");
            if predicate(&command_line) {
                Some(ProcessMatch {
                    pid: pid.as_u32(),
                    command_line,
                })
            } else {
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateOutcome {
    /// The process was already gone.
    AlreadyGone,
    /// Exited on its own within the grace period after a graceful signal.
    Graceful,
    /// Did not exit within the grace period and was force-killed.
    ForceKilled,
}

/// Sends a graceful termination signal, polls for exit up to `grace`, and
/// force-kills if it hasn't exited by then. Never touches the calling
/// process (callers are expected to have filtered that out already via
/// [`scan`]).
pub fn terminate(pid: u32, grace: Duration) -> TerminateOutcome {
    let mut sys = System::new();
    let target = Pid::from_u32(pid);
    sys.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[target]), true);
    let Some(proc_) = sys.process(target) else {
        return TerminateOutcome::AlreadyGone;
    };
    proc_.kill_with(Signal::Term);

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
        sys.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[target]), true);
        if sys.process(target).is_none() {
            return TerminateOutcome::Graceful;
        }
    }

    sys.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[target]), true);
    if let Some(proc_) = sys.process(target) {
        proc_.kill_with(Signal::Kill);
        TerminateOutcome::ForceKilled
    } else {
        TerminateOutcome::Graceful
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        assert!(pid_alive(std::process::id()));
    }

    #[test]
    fn bogus_pid_is_not_alive() {
        // A PID this high is exceedingly unlikely to be assigned.
        assert!(!pid_alive(u32::MAX - 1));
    }

    #[test]
    fn scan_never_includes_the_caller() {
        let matches = scan(|_| true);
        assert!(matches.iter().all(|m| m.pid != std::process::id()));
    }
}
