//! S3: once started, the gateway answers a raw `session.list` call frame.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::prelude::Workspace;

#[test]
fn session_list_call_round_trips_through_a_running_gateway() {
    let ws = Workspace::empty();

    ws.harness().args(&["gateway", "start", "--port", "0"]).passes().stdout_has("gateway started");

    ws.harness()
        .args(&["gateway", "call", r#"{"type":"session.list","limit":1}"#])
        .passes()
        .stdout_has("\"sessions\"");
}
