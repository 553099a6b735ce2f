// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream Transport (4.7): accepts TCP connections, demands auth when a
//! token is configured, and multiplexes command/response traffic with
//! broadcast envelopes over one outbound queue per connection.

use std::sync::Arc;
use std::time::Duration;

use harness_adapters::PtyAdapter;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::hub::Hub;
use crate::protocol::{ClientFrame, Command, EnvelopeFrame, ResponseFrame, ServerFrame};
use crate::protocol_wire::{self, ProtocolError};

/// `authTimeoutMs` (4.7, §6): grace period for the first frame to be `auth`.
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(5);
/// Bounded per-connection outbound queue (4.7): full queue drops envelopes,
/// never blocks the producer.
const OUTBOUND_QUEUE_CAPACITY: usize = 256;

pub async fn run<P: PtyAdapter>(listener: TcpListener, hub: Arc<Hub<P>>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };
        debug!(%peer, "accepted connection");
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, hub).await {
                debug!(%peer, error = %e, "connection ended");
            }
        });
    }
}

async fn handle_connection<P: PtyAdapter>(stream: TcpStream, hub: Arc<Hub<P>>) -> Result<(), ProtocolError> {
    let (mut read_half, write_half) = stream.into_split();

    let first: ClientFrame = protocol_wire::read_frame(&mut read_half, AUTH_TIMEOUT).await?;
    let authenticated = match &first.command {
        Command::Auth { token } => hub.check_auth(token.as_deref()),
        _ => hub.auth_token.is_none(),
    };
    if !authenticated {
        return Ok(());
    }

    let (outbound_tx, outbound_rx) = mpsc::channel::<ServerFrame>(OUTBOUND_QUEUE_CAPACITY);
    let writer_task = tokio::spawn(writer_loop(write_half, outbound_rx));

    if !matches!(first.command, Command::Auth { .. }) {
        dispatch_and_reply(&hub, first, &outbound_tx).await;
    } else {
        let _ = outbound_tx
            .send(ServerFrame::Response(ResponseFrame::ok(first.id, serde_json::json!({ "authenticated": true }))))
            .await;
    }

    let envelope_forwarder = {
        let mut rx = hub.subscribe_envelopes();
        let tx = outbound_tx.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(envelope) => {
                        if tx.try_send(ServerFrame::Envelope(EnvelopeFrame::new(envelope))).is_err() {
                            warn!("outbound queue full, dropping subscriber envelope (Backpressure)");
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    };

    let result = read_loop(read_half, &hub, outbound_tx).await;
    envelope_forwarder.abort();
    writer_task.abort();
    result
}

async fn read_loop<P: PtyAdapter>(
    mut read_half: tokio::net::tcp::OwnedReadHalf,
    hub: &Arc<Hub<P>>,
    outbound_tx: mpsc::Sender<ServerFrame>,
) -> Result<(), ProtocolError> {
    loop {
        let frame: ClientFrame = match protocol_wire::read_frame(&mut read_half, Duration::from_secs(3600)).await {
            Ok(frame) => frame,
            Err(ProtocolError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e),
        };
        dispatch_and_reply(hub, frame, &outbound_tx).await;
    }
}

async fn dispatch_and_reply<P: PtyAdapter>(
    hub: &Arc<Hub<P>>,
    frame: ClientFrame,
    outbound_tx: &mpsc::Sender<ServerFrame>,
) {
    let id = frame.id.clone();
    let response = match hub.dispatch(frame.command).await {
        Ok(result) => ResponseFrame::ok(id, result),
        Err(e) => ResponseFrame::err(id, e.kind, e.message),
    };
    // Responses are never dropped for queue pressure — only envelope
    // fanout is allowed to shed load (4.7).
    if outbound_tx.send(ServerFrame::Response(response)).await.is_err() {
        debug!("connection closed before response could be delivered");
    }
}

async fn writer_loop(mut write_half: tokio::net::tcp::OwnedWriteHalf, mut rx: mpsc::Receiver<ServerFrame>) {
    while let Some(frame) = rx.recv().await {
        let bytes = match protocol_wire::encode(&frame) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to encode outbound frame");
                continue;
            }
        };
        if protocol_wire::write_message(&mut write_half, &bytes).await.is_err() {
            break;
        }
    }
    let _ = write_half.shutdown().await;
}
