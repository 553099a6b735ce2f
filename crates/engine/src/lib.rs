// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Runtime Scheduler (4.10), Rail/View Model Builder (4.11), and
//! Profile/Trace Controllers (4.13): the stateful logic that sits between
//! the Stream Transport and the PTY Engine inside the gateway process.

pub mod activation;
pub mod control;
mod error;
pub mod rail;
pub mod resize;

pub use activation::{Activation, ActivationController, ActivationOutcome, PaneMode};
pub use control::{ControlKind, ControlState, Controller};
pub use error::EngineError;
pub use rail::{build as build_rail, RailInputs};
pub use resize::{ResizeAction, ResizeCoalescer};
