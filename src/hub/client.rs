//! Client handles: the Hub-visible half of a connection.
//!
//! A [`ClientHandle`] is created by whoever accepts a connection, together
//! with the matching [`OutboundReceiver`]. The handle is moved into the Hub on
//! registration; the receiver stays with the connection's writer task, which
//! drains it onto the transport.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

use super::ClientId;

/// Name of a pair group.
///
/// Never empty: an empty identifier means "no group" and is represented as
/// `None` by [`PairId::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairId(String);

impl PairId {
    /// Parses a raw pair identifier. Returns `None` for the empty string.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            None
        } else {
            Some(Self(raw.to_owned()))
        }
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a handle's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    /// Accepting deliveries.
    Open,
    /// Picked for eviction; no further deliveries are attempted.
    Closing,
    /// The outbound queue has been closed.
    Closed,
}

/// Why a non-blocking delivery did not go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The outbound queue is at capacity: the consumer is too slow.
    #[error("outbound queue full")]
    Full,
    /// The queue is closed, or its reader has gone away.
    #[error("outbound queue closed")]
    Closed,
}

/// The Hub-owned record for one connection.
///
/// Holds the sending half of the bounded outbound queue. Closing the queue
/// moves the sender out of the handle and drops it, so a handle can be closed
/// at most once.
#[derive(Debug)]
pub struct ClientHandle {
    id: ClientId,
    pair: Option<PairId>,
    outbound: Option<mpsc::Sender<Bytes>>,
    status: ClientStatus,
}

impl ClientHandle {
    /// Creates a handle and the receiver its writer task will drain.
    ///
    /// `capacity` is the maximum number of undelivered payloads; a capacity of
    /// zero is raised to one.
    #[must_use]
    pub fn new(pair: Option<PairId>, capacity: usize) -> (Self, OutboundReceiver) {
        let id = ClientId::new();
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id,
            pair,
            outbound: Some(tx),
            status: ClientStatus::Open,
        };
        (handle, OutboundReceiver { id, rx })
    }

    /// Returns the client's identity.
    #[must_use]
    pub const fn id(&self) -> ClientId {
        self.id
    }

    /// Returns the pair group this client belongs to, if any.
    #[must_use]
    pub const fn pair(&self) -> Option<&PairId> {
        self.pair.as_ref()
    }

    /// Returns the current queue status.
    #[must_use]
    pub const fn status(&self) -> ClientStatus {
        self.status
    }

    /// Enqueues `payload` without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Full`] when the queue is at capacity and
    /// [`DeliveryError::Closed`] when the handle is no longer open or the
    /// reader has been dropped.
    pub fn try_deliver(&self, payload: Bytes) -> Result<(), DeliveryError> {
        if self.status != ClientStatus::Open {
            return Err(DeliveryError::Closed);
        }
        let Some(tx) = self.outbound.as_ref() else {
            return Err(DeliveryError::Closed);
        };
        tx.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Marks an open handle for eviction.
    pub fn mark_closing(&mut self) {
        if self.status == ClientStatus::Open {
            self.status = ClientStatus::Closing;
        }
    }

    /// Closes the outbound queue.
    ///
    /// Returns `true` if this call closed it, `false` if it was already closed.
    pub fn close(&mut self) -> bool {
        self.status = ClientStatus::Closed;
        self.outbound.take().is_some()
    }
}

/// Receiving half of a client's outbound queue.
///
/// Owned by the single writer task of the connection. [`recv`](Self::recv)
/// yields `None` once the Hub has closed the queue and every queued payload
/// has been drained.
#[derive(Debug)]
pub struct OutboundReceiver {
    id: ClientId,
    rx: mpsc::Receiver<Bytes>,
}

impl OutboundReceiver {
    /// Returns the id of the client this queue belongs to.
    #[must_use]
    pub const fn client_id(&self) -> ClientId {
        self.id
    }

    /// Waits for the next payload. `None` means the Hub closed the queue.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Takes the next payload without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`TryRecvError::Empty`] when nothing is queued and
    /// [`TryRecvError::Disconnected`] when the queue is closed and drained.
    pub fn try_recv(&mut self) -> Result<Bytes, TryRecvError> {
        self.rx.try_recv()
    }
}
