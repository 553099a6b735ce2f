//! S4: a command naming a directory that doesn't exist fails with a
//! readable `NotFound` error instead of a panic or a silent success.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::prelude::Workspace;

#[test]
fn github_pr_create_on_missing_directory_fails_cleanly() {
    let ws = Workspace::empty();

    ws.harness().args(&["gateway", "start", "--port", "0"]).passes();

    ws.harness()
        .args(&["gateway", "call", r#"{"type":"github.pr-create","directoryId":"directory-missing"}"#])
        .fails()
        .code_eq(1)
        .stderr_has("directory not found: directory-missing");
}
