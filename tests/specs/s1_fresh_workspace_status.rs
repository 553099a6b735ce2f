//! S1: a fresh workspace with no prior gateway state reports itself stopped.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::prelude::Workspace;

#[test]
fn gateway_status_on_fresh_workspace_reports_stopped() {
    let ws = Workspace::empty();

    ws.harness()
        .args(&["gateway", "status"])
        .passes()
        .stdout_has("gateway status: stopped");

    assert!(!ws.path().join(".harness").exists());
}
