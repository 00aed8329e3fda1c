//! WebSocket transport for one connection.
//!
//! Splits the socket into a writer task that drains the connection's
//! [`Peer`] queue and a stream of incoming text frames that feeds
//! [`run_session`].

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, Stream, StreamExt, future};
use tracing::Instrument;

use super::session_handler::run_session;
use crate::domain::{Outbox, Peer, SessionRegistry};
use crate::error::GatewayError;

/// Runs a single WebSocket connection until both directions are done.
///
/// The writer finishes, sending a close frame, once every handle to the
/// connection's [`Peer`] has been dropped, which happens when the session
/// handler returns and its guards detach the connection, or as soon as the
/// connection overflows its outbound queue of `queue_capacity` frames.
pub async fn run_connection(
    socket: WebSocket,
    registry: Arc<SessionRegistry>,
    queue_capacity: usize,
) {
    let (peer, outbox) = Peer::bounded(queue_capacity);
    let span = tracing::info_span!("connection", connection_id = %peer.id());

    async move {
        tracing::debug!("ws connection opened");
        let (ws_tx, ws_rx) = socket.split();
        let writer = tokio::spawn(write_frames(ws_tx, outbox).in_current_span());

        match run_session(registry, peer, text_frames(ws_rx)).await {
            Ok(()) => tracing::debug!("session handler finished"),
            Err(
                err @ (GatewayError::SessionNotFound
                | GatewayError::ConnectionClosed
                | GatewayError::QueueFull),
            ) => {
                tracing::debug!(%err, "session handler ended");
            }
            Err(err) => tracing::warn!(%err, "session handler failed"),
        }

        if let Err(err) = writer.await {
            tracing::warn!(%err, "ws writer task failed");
        }
        tracing::debug!("ws connection closed");
    }
    .instrument(span)
    .await;
}

/// Forwards queued frames to the socket, then closes it.
async fn write_frames(mut ws_tx: SplitSink<WebSocket, Message>, mut outbox: Outbox) {
    while let Some(frame) = outbox.recv().await {
        if ws_tx.send(Message::text(frame.to_string())).await.is_err() {
            tracing::debug!("ws send failed; dropping outbound queue");
            return;
        }
    }
    if outbox.overflowed() {
        tracing::warn!("client stopped reading; closing connection");
    }
    let _ = ws_tx.send(Message::Close(None)).await;
}

/// Incoming text frames, ending at the first close frame, read error, or
/// end of stream. Binary and control frames are skipped.
fn text_frames(ws_rx: SplitStream<WebSocket>) -> impl Stream<Item = String> + Unpin + Send {
    ws_rx
        .take_while(|msg| future::ready(matches!(msg, Ok(m) if !matches!(m, Message::Close(_)))))
        .filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(text.as_str().to_owned()),
                _ => None,
            })
        })
}
