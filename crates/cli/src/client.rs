// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream Transport client used by every `gateway`/`profile`/`status-timeline`/
//! `render-trace` subcommand that talks to a running daemon.
//!
//! Mirrors the wire-level contract in `harness_daemon::listener`: the first
//! frame on a connection must be `Command::Auth`, and any `ServerFrame`
//! received afterward may be an envelope that must be skipped while waiting
//! on a response correlated by `id`.

use std::time::Duration;

use harness_daemon::protocol::{ClientFrame, Command, ResponseFrame, ServerFrame};
use harness_daemon::protocol_wire::{self, ProtocolError, DEFAULT_TIMEOUT, PROTOCOL_VERSION};
use thiserror::Error;
use tokio::net::TcpStream;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no gateway is running for this workspace")]
    DaemonNotRunning,
    #[error("gateway failed to start")]
    DaemonStartFailed,
    #[error("timed out waiting for the gateway to start")]
    DaemonStartTimeout,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("authentication required")]
    AuthRequired,
    #[error("authentication rejected")]
    AuthInvalid,
    #[error("{kind}: {message}")]
    Rejected { kind: String, message: String },
    #[error("unexpected response shape from gateway")]
    UnexpectedResponse,
    #[error("connection to gateway closed")]
    TransportClosed,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProtocolError> for ClientError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::ConnectionClosed => ClientError::TransportClosed,
            ProtocolError::Timeout => ClientError::Protocol("timed out".to_string()),
            ProtocolError::Io(io) => ClientError::Io(io),
            other => ClientError::Protocol(other.to_string()),
        }
    }
}

/// A connected, authenticated Stream Transport client for one command
/// invocation. Not reused across processes — each CLI invocation opens its
/// own connection and drops it on exit.
pub struct DaemonClient {
    stream: TcpStream,
    timeout: Duration,
}

impl DaemonClient {
    pub async fn connect(host: &str, port: u16, token: Option<&str>) -> Result<Self, ClientError> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|_| ClientError::DaemonNotRunning)?;
        let mut client = Self { stream, timeout: DEFAULT_TIMEOUT };
        client.authenticate(token).await?;
        Ok(client)
    }

    async fn authenticate(&mut self, token: Option<&str>) -> Result<(), ClientError> {
        let id = new_id();
        let frame = ClientFrame {
            v: PROTOCOL_VERSION,
            id: id.clone(),
            command: Command::Auth { token: token.map(str::to_string) },
        };
        protocol_wire::write_frame(&mut self.stream, &frame, self.timeout).await?;
        let response = self.await_response(&id).await?;
        if response.error.is_some() {
            return Err(ClientError::AuthInvalid);
        }
        Ok(())
    }

    /// Sends one command and waits for its correlated response, silently
    /// skipping any envelopes that arrive on the same connection first.
    pub async fn call(&mut self, command: Command) -> Result<serde_json::Value, ClientError> {
        let id = new_id();
        let frame = ClientFrame { v: PROTOCOL_VERSION, id: id.clone(), command };
        protocol_wire::write_frame(&mut self.stream, &frame, self.timeout).await?;
        let response = self.await_response(&id).await?;
        match (response.result, response.error) {
            (Some(result), None) => Ok(result),
            (_, Some(err)) => Err(ClientError::Rejected { kind: err.kind, message: err.message }),
            (None, None) => Err(ClientError::UnexpectedResponse),
        }
    }

    async fn await_response(&mut self, id: &str) -> Result<ResponseFrame, ClientError> {
        loop {
            let frame: ServerFrame = protocol_wire::read_frame(&mut self.stream, self.timeout).await?;
            match frame {
                ServerFrame::Response(r) if r.id == id => return Ok(r),
                ServerFrame::Response(_) | ServerFrame::Envelope(_) => continue,
            }
        }
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
