//! End-to-end behavioral specifications for the `harness` CLI + `harnessd`
//! gateway daemon, driven black-box via spawned processes.

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/s1_fresh_workspace_status.rs"]
mod s1_fresh_workspace_status;

#[path = "specs/s2_legacy_migration.rs"]
mod s2_legacy_migration;

#[path = "specs/s3_start_and_call.rs"]
mod s3_start_and_call;

#[path = "specs/s4_call_error.rs"]
mod s4_call_error;

#[path = "specs/s5_concurrent_conversations.rs"]
mod s5_concurrent_conversations;

#[path = "specs/s6_force_stop_no_record.rs"]
mod s6_force_stop_no_record;
