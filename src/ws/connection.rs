//! Per-connection reader and writer.
//!
//! Each accepted socket is split in two. The writer drains the client's
//! outbound queue onto the socket and keeps the peer alive with pings; the
//! reader forwards inbound frames to the hub. When either one stops, the
//! other is aborted and the client is unregistered. Unregistering is
//! idempotent, so it is harmless when the hub already evicted the client.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::time::{Instant, timeout};

use super::messages::{Route, route};
use crate::config::ServerConfig;
use crate::hub::{ClientHandle, Hub, OutboundReceiver, PairId};

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// The peer sent a close frame or the stream ended.
    ClosedByPeer,
    /// Nothing was received within the read timeout.
    ReadTimeout,
    /// The transport reported a read error.
    ReadError,
    /// A frame could not be written within the write timeout.
    WriteTimeout,
    /// The transport reported a write error.
    WriteError,
    /// The hub closed the outbound queue.
    Evicted,
    /// A pump task panicked or was cancelled.
    Aborted,
}

impl Disconnect {
    /// Short label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClosedByPeer => "closed_by_peer",
            Self::ReadTimeout => "read_timeout",
            Self::ReadError => "read_error",
            Self::WriteTimeout => "write_timeout",
            Self::WriteError => "write_error",
            Self::Evicted => "evicted",
            Self::Aborted => "aborted",
        }
    }
}

/// Registers a new client for `socket` and serves it until it disconnects.
pub async fn run_connection(
    socket: WebSocket,
    hub: Hub,
    pair: Option<PairId>,
    config: Arc<ServerConfig>,
) {
    let (handle, outbound) = ClientHandle::new(pair.clone(), config.outbound_capacity);
    let client_id = handle.id();
    hub.register(handle).await;

    let (ws_tx, ws_rx) = socket.split();
    let mut write_task = tokio::spawn(write_pump(
        ws_tx,
        outbound,
        config.write_timeout,
        config.ping_interval,
    ));
    let mut read_task = tokio::spawn(read_pump(ws_rx, hub.clone(), pair, config.read_timeout));

    let finished = tokio::select! {
        result = &mut write_task => {
            read_task.abort();
            result
        }
        result = &mut read_task => {
            write_task.abort();
            result
        }
    };
    let reason = finished.unwrap_or(Disconnect::Aborted);

    hub.unregister(client_id).await;
    tracing::info!(client_id = %client_id, reason = reason.as_str(), "ws connection closed");
}

/// Drains the outbound queue onto the socket and sends periodic pings.
async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: OutboundReceiver,
    write_timeout: Duration,
    ping_interval: Duration,
) -> Disconnect {
    let mut ping = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
    loop {
        tokio::select! {
            next = outbound.recv() => {
                let Some(payload) = next else {
                    let _ = timeout(write_timeout, sink.send(Message::Close(None))).await;
                    return Disconnect::Evicted;
                };
                if let Err(reason) = send_frame(&mut sink, to_frame(payload), write_timeout).await {
                    return reason;
                }
            }
            _ = ping.tick() => {
                if let Err(reason) = send_frame(&mut sink, Message::Ping(Bytes::new()), write_timeout).await {
                    return reason;
                }
            }
        }
    }
}

/// Forwards inbound frames to the hub until the peer goes away or idles out.
///
/// Every received frame, pongs included, resets the read deadline.
async fn read_pump(
    mut stream: SplitStream<WebSocket>,
    hub: Hub,
    pair: Option<PairId>,
    read_timeout: Duration,
) -> Disconnect {
    loop {
        let frame = match timeout(read_timeout, stream.next()).await {
            Err(_) => return Disconnect::ReadTimeout,
            Ok(None) => return Disconnect::ClosedByPeer,
            Ok(Some(Err(err))) => {
                tracing::debug!(error = %err, "ws read error");
                return Disconnect::ReadError;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        let payload = match frame {
            Message::Text(text) => Bytes::copy_from_slice(text.as_str().as_bytes()),
            Message::Binary(data) => data,
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => return Disconnect::ClosedByPeer,
        };
        tracing::debug!(bytes = payload.len(), "ws message received");

        match route(&payload, pair.as_ref()) {
            Route::All => hub.broadcast(payload).await,
            Route::Pair(target) => hub.broadcast_to_pair(target, payload).await,
            Route::Drop => tracing::debug!("pair message without a target group dropped"),
        }
    }
}

async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: Message,
    write_timeout: Duration,
) -> Result<(), Disconnect> {
    match timeout(write_timeout, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => {
            tracing::debug!(error = %err, "ws write error");
            Err(Disconnect::WriteError)
        }
        Err(_) => Err(Disconnect::WriteTimeout),
    }
}

/// Text frame for UTF-8 payloads, binary otherwise.
fn to_frame(payload: Bytes) -> Message {
    match std::str::from_utf8(&payload) {
        Ok(text) => Message::text(text),
        Err(_) => Message::Binary(payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_payload_becomes_text_frame() {
        let frame = to_frame(Bytes::from_static(b"hello"));
        assert!(matches!(frame, Message::Text(ref t) if t.as_str() == "hello"));
    }

    #[test]
    fn non_utf8_payload_becomes_binary_frame() {
        let frame = to_frame(Bytes::from_static(&[0xff, 0xfe]));
        assert!(matches!(frame, Message::Binary(ref b) if b.as_ref() == [0xff, 0xfe]));
    }

    #[test]
    fn disconnect_labels_are_distinct() {
        let all = [
            Disconnect::ClosedByPeer,
            Disconnect::ReadTimeout,
            Disconnect::ReadError,
            Disconnect::WriteTimeout,
            Disconnect::WriteError,
            Disconnect::Evicted,
            Disconnect::Aborted,
        ];
        let labels: std::collections::HashSet<_> = all.iter().map(|d| d.as_str()).collect();
        assert_eq!(labels.len(), all.len());
    }
}
