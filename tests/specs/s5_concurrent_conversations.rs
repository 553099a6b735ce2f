//! S5: two conversations running in the same gateway concurrently each
//! produce their own ordered output stream, and both show up in the
//! session list.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use base64::Engine;

use crate::prelude::{wait_for, Workspace};

fn start_conversation(ws: &Workspace, title: &str) -> String {
    let created = ws.call(&format!(
        r#"{{"type":"conversation.create","directoryId":null,"title":"{title}","agentType":"shell"}}"#
    ));
    let session_id = created["conversation"]["id"].as_str().expect("conversation id").to_string();

    let cwd = ws.path().to_string_lossy().replace('\\', "\\\\");
    ws.call(&format!(
        r#"{{"type":"pty.start","sessionId":"{session_id}","cwd":"{cwd}","args":["/bin/sh","-c","yes pad | head -c 400"],"initialCols":80,"initialRows":24}}"#
    ));
    session_id
}

fn backlog_bytes(ws: &Workspace, session_id: &str) -> (usize, Vec<i64>) {
    let response = ws.call(&format!(r#"{{"type":"pty.attach","sessionId":"{session_id}","fromSeq":0}}"#));
    let chunks = response["backlog"].as_array().cloned().unwrap_or_default();
    let seqs: Vec<i64> = chunks.iter().map(|c| c["seq"].as_i64().unwrap_or(-1)).collect();
    let total: usize = chunks
        .iter()
        .map(|c| {
            let data = c["data"].as_str().unwrap_or_default();
            base64::engine::general_purpose::STANDARD.decode(data).map(|b| b.len()).unwrap_or(0)
        })
        .sum();
    (total, seqs)
}

#[test]
fn two_concurrent_terminal_conversations_each_stream_ordered_output() {
    let ws = Workspace::empty();
    ws.harness().args(&["gateway", "start", "--port", "0"]).passes();

    let session_a = start_conversation(&ws, "conversation a");
    let session_b = start_conversation(&ws, "conversation b");

    let got_enough = wait_for(5_000, || {
        backlog_bytes(&ws, &session_a).0 >= 250 && backlog_bytes(&ws, &session_b).0 >= 250
    });
    assert!(got_enough, "expected both conversations to produce at least 250 bytes of output");

    let (bytes_a, seqs_a) = backlog_bytes(&ws, &session_a);
    let (bytes_b, seqs_b) = backlog_bytes(&ws, &session_b);
    assert!(bytes_a >= 250, "session a produced only {bytes_a} bytes");
    assert!(bytes_b >= 250, "session b produced only {bytes_b} bytes");
    assert!(seqs_a.windows(2).all(|w| w[0] < w[1]), "session a sequence numbers must strictly increase: {seqs_a:?}");
    assert!(seqs_b.windows(2).all(|w| w[0] < w[1]), "session b sequence numbers must strictly increase: {seqs_b:?}");

    let listed = ws.call(r#"{"type":"session.list"}"#);
    let ids: Vec<String> = listed["sessions"]
        .as_array()
        .expect("sessions array")
        .iter()
        .map(|s| s["id"].as_str().unwrap_or_default().to_string())
        .collect();
    assert!(ids.contains(&session_a), "session list should contain conversation a: {ids:?}");
    assert!(ids.contains(&session_b), "session list should contain conversation b: {ids:?}");
}
