//! S2: a workspace-local `.harness/` directory from an older release is
//! migrated into the global runtime/config roots on the next `gateway start`.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::prelude::Workspace;

#[test]
fn legacy_harness_directory_is_migrated_on_start() {
    let ws = Workspace::empty();

    let legacy_record = serde_json::json!({
        "version": 1,
        "pid": 999_999_999,
        "host": "127.0.0.1",
        "port": 6553,
        "authToken": serde_json::Value::Null,
        "stateDbPath": ws.path().join(".harness/control-plane.sqlite").to_string_lossy(),
        "startedAt": "2025-01-01T00:00:00.000Z",
        "workspaceRoot": ws.path().to_string_lossy(),
    });
    ws.file(".harness/gateway.json", &serde_json::to_string_pretty(&legacy_record).unwrap());
    ws.file(".harness/gateway.log", "stale log line\n");

    ws.harness()
        .args(&["gateway", "start", "--port", "0"])
        .passes()
        .stdout_has("[migration] local .harness migrated");

    assert!(!ws.path().join(".harness").exists(), "legacy directory should be removed after migration");

    ws.harness()
        .args(&["gateway", "status"])
        .passes()
        .stdout_has("status:");
}
