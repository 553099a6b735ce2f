// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: the PTY Engine (4.9) behind a trait, so the
//! scheduler can run against a real terminal or a fake.

pub mod pty;
pub mod traced;

pub use pty::{NoOpPtyAdapter, PtyAdapter, PtyError, PtyEvent, RealPtyAdapter};
pub use traced::TracedPty;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use pty::fake::{FakePtyAdapter, PtyCall};
