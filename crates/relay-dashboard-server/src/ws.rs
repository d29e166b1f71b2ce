//! Stream proxy for the dashboard `WebSocket`.
//!
//! In proxy mode the daemon side is connected *before* the client upgrade
//! is accepted; if that fails the client gets a 502 `upgrade_failed` and
//! the session goes straight to `Closed`. Once both sides are up, frames
//! are relayed verbatim in both directions, preserving frame boundaries
//! and text/binary framing. When either side closes or errors, the other
//! side is closed too.
//!
//! In mock mode no upstream connection is attempted; the session opens
//! immediately and is driven by the synthetic feed.

use std::sync::Arc;

use axum::extract::ws::{
    CloseFrame as ClientCloseFrame, Message as ClientMessage, WebSocket, WebSocketUpgrade,
};
use axum::http::{HeaderMap, Uri};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use relay_dashboard_types::ServerMode;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as UpstreamCloseFrame;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tracing::{debug, warn};

use crate::feed::{start_synthetic_stream, SyntheticFeed};
use crate::forward::{UpstreamSocket, UpstreamStream};
use crate::session::{CloseReason, SessionEvent, StreamSession};
use crate::shutdown::ShutdownSignal;
use crate::state::AppState;

/// Accept a stream upgrade under the server's mode.
///
/// In proxy mode `headers` (the client's handshake headers) are replayed
/// on the daemon handshake, and the subprotocol the daemon picks is
/// offered back to the client.
pub async fn upgrade(
    state: Arc<AppState>,
    upgrade: WebSocketUpgrade,
    uri: &Uri,
    headers: &HeaderMap,
) -> Response {
    let session = StreamSession::new(state.mode, &state.sessions);
    let shutdown = state.shutdown.clone();
    let upgrade = upgrade.on_failed_upgrade(|e| {
        warn!(error = %e, "client stream upgrade failed");
    });

    match state.mode {
        ServerMode::Mock => {
            let feed = state.mock.synthetic_feed(state.stream);
            let interval = state.stream.interval;
            upgrade.on_upgrade(move |socket| run_mock(socket, session, feed, interval, shutdown))
        }
        ServerMode::Proxy => {
            let path_and_query = uri.path_and_query().map_or(uri.path(), |pq| pq.as_str());
            match state.upstream.connect_stream(path_and_query, headers).await {
                Ok(UpstreamStream { socket: upstream, protocol }) => {
                    let upgrade = match protocol {
                        Some(protocol) => upgrade.protocols([protocol]),
                        None => upgrade,
                    };
                    upgrade.on_upgrade(move |socket| relay(socket, upstream, session, shutdown))
                }
                Err(e) => {
                    warn!(
                        path = uri.path(),
                        mode = %state.mode,
                        upstream = %state.upstream.base_url(),
                        error = %e,
                        "could not open daemon stream"
                    );
                    let mut session = session;
                    if let Err(err) = session.apply(SessionEvent::ConnectFailed(e.to_string())) {
                        warn!(error = %err, "session state out of sync");
                    }
                    e.into_response()
                }
            }
        }
    }
}

/// Mock-mode session: synthetic feed until the client leaves.
async fn run_mock(
    mut socket: WebSocket,
    mut session: StreamSession,
    feed: SyntheticFeed,
    interval: std::time::Duration,
    mut shutdown: ShutdownSignal,
) {
    if session.apply(SessionEvent::Established).is_err() {
        return;
    }

    let reason = start_synthetic_stream(&mut socket, feed, interval, &mut shutdown).await;
    let notify_client = !matches!(reason, CloseReason::ClientClosed | CloseReason::ClientError(_));
    finish_close(&mut session, reason);

    if notify_client && let Err(e) = socket.send(ClientMessage::Close(None)).await {
        debug!(session_id = %session.id(), error = %e, "client close frame not delivered");
    }
    drop(socket);
    release(&mut session);
}

/// Proxy-mode session: bidirectional verbatim relay.
async fn relay(
    client: WebSocket,
    upstream: UpstreamSocket,
    mut session: StreamSession,
    mut shutdown: ShutdownSignal,
) {
    if session.apply(SessionEvent::Established).is_err() {
        return;
    }

    let (mut client_tx, mut client_rx) = client.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    let reason = loop {
        tokio::select! {
            frame = client_rx.next() => match frame {
                Some(Ok(ClientMessage::Close(frame))) => {
                    let close = UpstreamMessage::Close(frame.map(close_frame_to_upstream));
                    if let Err(e) = upstream_tx.send(close).await {
                        debug!(session_id = %session.id(), error = %e, "upstream close frame not delivered");
                    }
                    break CloseReason::ClientClosed;
                }
                Some(Ok(message)) => {
                    if let Err(e) = upstream_tx.send(client_to_upstream(message)).await {
                        break CloseReason::UpstreamError(e.to_string());
                    }
                }
                Some(Err(e)) => break CloseReason::ClientError(e.to_string()),
                None => break CloseReason::ClientClosed,
            },
            frame = upstream_rx.next() => match frame {
                Some(Ok(UpstreamMessage::Close(frame))) => {
                    let close = ClientMessage::Close(frame.map(close_frame_to_client));
                    if let Err(e) = client_tx.send(close).await {
                        debug!(session_id = %session.id(), error = %e, "client close frame not delivered");
                    }
                    break CloseReason::UpstreamClosed;
                }
                Some(Ok(message)) => {
                    if let Some(message) = upstream_to_client(message)
                        && let Err(e) = client_tx.send(message).await
                    {
                        break CloseReason::ClientError(e.to_string());
                    }
                }
                Some(Err(e)) => break CloseReason::UpstreamError(e.to_string()),
                None => break CloseReason::UpstreamClosed,
            },
            () = shutdown.fired() => break CloseReason::Shutdown,
        }
    };

    finish_close(&mut session, reason);

    // Close both halves. A half that already saw a close frame just
    // reports an error, which is expected here.
    if let Err(e) = upstream_tx.close().await {
        debug!(session_id = %session.id(), error = %e, "upstream socket already closed");
    }
    if let Err(e) = client_tx.close().await {
        debug!(session_id = %session.id(), error = %e, "client socket already closed");
    }
    drop((client_tx, client_rx, upstream_tx, upstream_rx));
    release(&mut session);
}

fn finish_close(session: &mut StreamSession, reason: CloseReason) {
    if let CloseReason::ClientError(e) | CloseReason::UpstreamError(e) = &reason {
        warn!(session_id = %session.id(), mode = %session.mode(), error = %e, "stream session failed");
    }
    if let Err(e) = session.apply(SessionEvent::Close(reason)) {
        warn!(error = %e, "session state out of sync");
    }
}

fn release(session: &mut StreamSession) {
    if let Err(e) = session.apply(SessionEvent::Released) {
        warn!(error = %e, "session state out of sync");
    }
}

/// Convert a client frame to the daemon's frame type, unchanged.
pub fn client_to_upstream(message: ClientMessage) -> UpstreamMessage {
    match message {
        ClientMessage::Text(text) => UpstreamMessage::text(text.as_str().to_owned()),
        ClientMessage::Binary(data) => UpstreamMessage::Binary(data),
        ClientMessage::Ping(data) => UpstreamMessage::Ping(data),
        ClientMessage::Pong(data) => UpstreamMessage::Pong(data),
        ClientMessage::Close(frame) => UpstreamMessage::Close(frame.map(close_frame_to_upstream)),
    }
}

/// Convert a daemon frame to the client's frame type, unchanged.
///
/// Raw frames never surface from a reading socket and are dropped.
pub fn upstream_to_client(message: UpstreamMessage) -> Option<ClientMessage> {
    match message {
        UpstreamMessage::Text(text) => Some(ClientMessage::Text(text.as_str().to_owned().into())),
        UpstreamMessage::Binary(data) => Some(ClientMessage::Binary(data)),
        UpstreamMessage::Ping(data) => Some(ClientMessage::Ping(data)),
        UpstreamMessage::Pong(data) => Some(ClientMessage::Pong(data)),
        UpstreamMessage::Close(frame) => Some(ClientMessage::Close(frame.map(close_frame_to_client))),
        UpstreamMessage::Frame(_) => None,
    }
}

fn close_frame_to_upstream(frame: ClientCloseFrame) -> UpstreamCloseFrame {
    UpstreamCloseFrame {
        code: CloseCode::from(frame.code),
        reason: frame.reason.as_str().to_owned().into(),
    }
}

fn close_frame_to_client(frame: UpstreamCloseFrame) -> ClientCloseFrame {
    ClientCloseFrame {
        code: u16::from(frame.code),
        reason: frame.reason.as_str().to_owned().into(),
    }
}
