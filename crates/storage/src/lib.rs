// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! harness-storage: the Session Store (4.8) and the Garbage Collector (4.12).
//!
//! Session Runtime State lives in a SQLite database (`bundled` `rusqlite`):
//! directories, repositories, conversations, the bounded per-session output
//! ring, and mux UI state. SQLite's own WAL journal mode supplies the
//! durability the donor codebase previously hand-rolled with its own
//! WAL+snapshot pair.

pub mod error;
pub mod gc;
pub mod schema;
pub mod store;

pub use error::StoreError;
pub use gc::{gc, GcReport};
pub use store::Store;
