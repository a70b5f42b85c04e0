//! One connected push client.
//!
//! The session registers with the hub, then runs two halves until either
//! ends: a writer that drains the handle's queue and sends pings, and a
//! reader that records pongs and watches for a close. The handle is always
//! deregistered on the way out.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures::stream::SplitStream;
use futures::{Sink, SinkExt, StreamExt};
use relay_core::ConnectionId;
use relay_hub::ClientHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::heartbeat::{HeartbeatResult, run_heartbeat};
use super::message::encode_reading;
use crate::errors::ClientWriteError;
use crate::server::AppState;

/// Why a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The hub closed the handle (deregistered elsewhere, or shutdown).
    HubClosed,
    /// The server is shutting down.
    Shutdown,
    /// The client sent a close frame or the socket ended.
    ClientClosed,
    /// A write failed or timed out.
    WriteFailed(ClientWriteError),
}

/// Serve one upgraded socket until it ends.
#[tracing::instrument(skip_all, fields(conn_id))]
pub async fn run_session(mut socket: WebSocket, state: AppState) {
    let id = ConnectionId::new();
    let _ = tracing::Span::current().record("conn_id", id.as_str());

    let handle = match state.hub.register(id.clone()) {
        Ok(h) => h,
        Err(e) => {
            warn!(error = %e, "refusing client");
            let frame = CloseFrame {
                code: close_code::POLICY,
                reason: e.to_string().into(),
            };
            let _ = socket.send(Message::Close(Some(frame))).await;
            return;
        }
    };
    info!(connections = state.hub.connection_count(), "client connected");

    let shutdown = state.shutdown.token();
    let heartbeat_cancel = CancellationToken::new();
    let heartbeat = {
        let hub = Arc::clone(&state.hub);
        let handle = Arc::clone(&handle);
        let cancel = heartbeat_cancel.clone();
        let interval = state.config.heartbeat_interval();
        let timeout = state.config.heartbeat_timeout();
        tokio::spawn(async move {
            let id = handle.id().clone();
            if run_heartbeat(handle, interval, timeout, cancel).await == HeartbeatResult::TimedOut {
                warn!(conn_id = %id, "heartbeat timed out, reaping client");
                let _ = hub.deregister(&id);
            }
        })
    };

    let (ws_tx, ws_rx) = socket.split();
    let writer = write_loop(
        ws_tx,
        &handle,
        shutdown,
        state.config.heartbeat_interval(),
        state.config.write_timeout(),
    );
    let reader = read_loop(ws_rx, &handle);

    let end = tokio::select! {
        end = writer => end,
        () = reader => SessionEnd::ClientClosed,
    };

    heartbeat_cancel.cancel();
    let _ = heartbeat.await;
    let _ = state.hub.deregister(&id);

    match &end {
        SessionEnd::WriteFailed(e) => warn!(
            error = %e,
            dropped = handle.dropped_count(),
            "client write failed, disconnected"
        ),
        other => info!(
            reason = ?other,
            dropped = handle.dropped_count(),
            connections = state.hub.connection_count(),
            "client disconnected"
        ),
    }
}

async fn write_loop<S>(
    mut ws_tx: S,
    handle: &ClientHandle,
    shutdown: CancellationToken,
    ping_every: Duration,
    write_timeout: Duration,
) -> SessionEnd
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let mut ping_interval = tokio::time::interval(ping_every);
    let _ = ping_interval.tick().await;

    loop {
        // Pings go ahead of readings so a busy queue cannot starve them.
        tokio::select! {
            biased;
            () = handle.closing().cancelled() => {
                close_normal(&mut ws_tx, write_timeout).await;
                return SessionEnd::HubClosed;
            }
            () = shutdown.cancelled() => {
                let frame = CloseFrame {
                    code: close_code::AWAY,
                    reason: "server shutting down".into(),
                };
                let _ = send_with_timeout(&mut ws_tx, Message::Close(Some(frame)), write_timeout).await;
                return SessionEnd::Shutdown;
            }
            _ = ping_interval.tick() => {
                if let Err(e) = send_with_timeout(&mut ws_tx, Message::Ping(Bytes::new()), write_timeout).await {
                    return SessionEnd::WriteFailed(e);
                }
                trace!("sent ping");
            }
            next = handle.recv() => {
                let Some(reading) = next else {
                    close_normal(&mut ws_tx, write_timeout).await;
                    return SessionEnd::HubClosed;
                };
                let text = match encode_reading(&reading) {
                    Ok(t) => t,
                    Err(e) => return SessionEnd::WriteFailed(e.into()),
                };
                if let Err(e) = send_with_timeout(&mut ws_tx, Message::Text(text.into()), write_timeout).await {
                    return SessionEnd::WriteFailed(e);
                }
                trace!(seq = reading.seq, "reading sent");
            }
        }
    }
}

async fn close_normal<S>(ws_tx: &mut S, write_timeout: Duration)
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let frame = CloseFrame {
        code: close_code::NORMAL,
        reason: "closed by relay".into(),
    };
    let _ = send_with_timeout(ws_tx, Message::Close(Some(frame)), write_timeout).await;
}

async fn read_loop(mut ws_rx: SplitStream<WebSocket>, handle: &ClientHandle) {
    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Pong(_)) => handle.mark_alive(),
            Ok(Message::Close(frame)) => {
                debug!(?frame, "client sent close");
                return;
            }
            Ok(Message::Text(_) | Message::Binary(_)) => {
                trace!("ignoring inbound message");
            }
            Ok(Message::Ping(_)) => {}
            Err(e) => {
                debug!(error = %e, "socket read failed");
                return;
            }
        }
    }
}

async fn send_with_timeout<S>(
    ws_tx: &mut S,
    message: Message,
    write_timeout: Duration,
) -> Result<(), ClientWriteError>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    match tokio::time::timeout(write_timeout, ws_tx.send(message)).await {
        Ok(result) => result.map_err(ClientWriteError::from),
        Err(_) => Err(ClientWriteError::Timeout {
            timeout_ms: u64::try_from(write_timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}
