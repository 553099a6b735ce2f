// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! harness-daemon library
//!
//! Exposes the Stream Transport wire types and codec so CLI clients can
//! speak the protocol without re-implementing it, plus the gateway's
//! process-lifecycle and dispatch pieces for the `harnessd` binary.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod hub;
pub mod lifecycle;
pub mod listener;
pub mod protocol;
pub mod protocol_wire;

pub use hub::{CommandError, Hub};
pub use lifecycle::{startup, Config, LifecycleError, StartupResult};
pub use protocol::{
    ClientFrame, Command, ConversationView, DirectoryView, Envelope, EnvelopeFrame, ErrorBody,
    FrameKind, RepositoryUpsert, ResponseFrame, ServerFrame, WIRE_VERSION,
};
pub use protocol_wire::{
    decode, encode, read_frame, read_message, write_frame, write_message, ProtocolError,
    DEFAULT_TIMEOUT, MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};
