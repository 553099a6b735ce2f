//! S6: `gateway stop --force` with no record on disk still hunts down and
//! kills an orphaned gateway daemon process, and reports exit code 1 (there
//! was nothing recorded to stop, even though cleanup happened).

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use sysinfo::{Pid, System};

use crate::prelude::{wait_for, Workspace};

fn pid_alive(pid: u32) -> bool {
    let mut sys = System::new();
    sys.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
    sys.process(Pid::from_u32(pid)).is_some()
}

#[test]
fn force_stop_with_no_record_reaps_an_orphaned_daemon() {
    let ws = Workspace::empty();

    // Start a real gateway, then delete its record file without stopping
    // it, leaving a leftover `harnessd` process behind — the scenario this
    // command exists to clean up.
    ws.harness().args(&["gateway", "start", "--port", "0"]).passes();

    let record_path = ws.find_under_cache("gateway.json").expect("gateway record should exist after start");
    let record: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&record_path).unwrap()).unwrap();
    let orphan_pid = record["pid"].as_u64().unwrap() as u32;
    assert!(pid_alive(orphan_pid), "gateway daemon should still be running before the forced stop");
    std::fs::remove_file(&record_path).unwrap();

    let result = ws.harness().args(&["gateway", "stop", "--force"]).run();
    assert_eq!(result.code(), Some(1));
    let stdout = result.stdout();
    assert!(stdout.contains("gateway not running (no record)"), "stdout: {stdout}");
    assert!(stdout.contains("orphan gateway daemon cleanup:"), "stdout: {stdout}");

    let exited = wait_for(4_000, || !pid_alive(orphan_pid));
    assert!(exited, "orphaned gateway daemon (pid {orphan_pid}) should exit within 4s of the forced stop");
}
