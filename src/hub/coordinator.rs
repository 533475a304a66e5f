//! The Hub coordinator: one task that owns the [`Registry`].
//!
//! Producers hold a cloneable [`Hub`] and submit [`HubCommand`]s over a
//! bounded `mpsc` channel. The [`Coordinator`] receives them one at a time and
//! runs each to completion, so a fan-out and the evictions it triggers are a
//! single step that no registration can interleave with.
//!
//! Register, unregister, broadcast and pair broadcast share one FIFO queue,
//! so requests submitted by the same task are applied in submission order.

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::registry::FanOut;
use super::{ClientHandle, ClientId, PairId, Registry, RegistrySnapshot};

/// A request for the coordinator.
#[derive(Debug)]
pub enum HubCommand {
    /// Add a client to the registry.
    Register(ClientHandle),
    /// Remove a client and close its queue. Unknown ids are ignored.
    Unregister(ClientId),
    /// Deliver a payload to every client.
    Broadcast(Bytes),
    /// Deliver a payload to the members of one pair group.
    PairBroadcast {
        /// Target group.
        pair: PairId,
        /// Opaque payload.
        payload: Bytes,
    },
    /// Report the current client and group counts.
    Snapshot(oneshot::Sender<RegistrySnapshot>),
    /// Close every client and stop the coordinator.
    Shutdown,
}

/// Cloneable handle for submitting requests to the coordinator.
///
/// None of the methods fail. If the coordinator has stopped, the request is
/// dropped and a warning is logged.
#[derive(Debug, Clone)]
pub struct Hub {
    commands: mpsc::Sender<HubCommand>,
}

impl Hub {
    /// Creates a hub handle and the coordinator that serves it.
    ///
    /// `capacity` bounds the number of queued requests; producers wait for
    /// room when it is reached. Zero is raised to one.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, Coordinator) {
        let (commands, rx) = mpsc::channel(capacity.max(1));
        (
            Self { commands },
            Coordinator {
                registry: Registry::new(),
                commands: rx,
            },
        )
    }

    /// Creates a hub and spawns its coordinator on the current runtime.
    ///
    /// The coordinator stops once every `Hub` clone has been dropped.
    #[must_use]
    pub fn spawn(capacity: usize) -> (Self, JoinHandle<()>) {
        let (hub, coordinator) = Self::channel(capacity);
        (hub, tokio::spawn(coordinator.run()))
    }

    /// Registers a client. Must happen before its connection starts reading
    /// or writing.
    pub async fn register(&self, handle: ClientHandle) {
        self.submit(HubCommand::Register(handle)).await;
    }

    /// Unregisters a client. Safe to call more than once.
    pub async fn unregister(&self, id: ClientId) {
        self.submit(HubCommand::Unregister(id)).await;
    }

    /// Delivers `payload` to every registered client, evicting slow ones.
    pub async fn broadcast(&self, payload: impl Into<Bytes>) {
        self.submit(HubCommand::Broadcast(payload.into())).await;
    }

    /// Delivers `payload` to the members of `pair`, evicting slow ones.
    /// Does nothing if the group does not exist.
    pub async fn broadcast_to_pair(&self, pair: PairId, payload: impl Into<Bytes>) {
        self.submit(HubCommand::PairBroadcast {
            pair,
            payload: payload.into(),
        })
        .await;
    }

    /// Returns the current registry counts, or `None` if the coordinator has
    /// stopped.
    pub async fn snapshot(&self) -> Option<RegistrySnapshot> {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(HubCommand::Snapshot(tx)).await.is_err() {
            return None;
        }
        rx.await.ok()
    }

    /// Asks the coordinator to close every client and stop. Requests queued
    /// behind this one are dropped.
    pub async fn shutdown(&self) {
        self.submit(HubCommand::Shutdown).await;
    }

    /// Returns `true` while the coordinator is accepting requests.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    async fn submit(&self, command: HubCommand) {
        if let Err(err) = self.commands.send(command).await {
            tracing::warn!(command = ?err.0, "hub stopped; request dropped");
        }
    }
}

/// The task body that owns the [`Registry`].
#[derive(Debug)]
pub struct Coordinator {
    registry: Registry,
    commands: mpsc::Receiver<HubCommand>,
}

impl Coordinator {
    /// Processes requests until [`Hub::shutdown`] is called or every [`Hub`]
    /// handle is dropped, then closes all remaining clients.
    pub async fn run(mut self) {
        tracing::debug!("hub started");
        while let Some(command) = self.commands.recv().await {
            if matches!(command, HubCommand::Shutdown) {
                break;
            }
            self.apply(command);
        }
        self.commands.close();
        let closed = self.registry.close_all();
        tracing::info!(closed, "hub stopped");
    }

    fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register(handle) => self.register(handle),
            HubCommand::Unregister(id) => self.unregister(id),
            HubCommand::Broadcast(payload) => {
                let outcome = self.registry.broadcast(&payload);
                log_fan_out(None, &outcome, payload.len());
            }
            HubCommand::PairBroadcast { pair, payload } => {
                match self.registry.broadcast_to_pair(&pair, &payload) {
                    Some(outcome) => log_fan_out(Some(&pair), &outcome, payload.len()),
                    None => tracing::debug!(%pair, "pair broadcast to unknown group dropped"),
                }
            }
            HubCommand::Snapshot(reply) => {
                let _ = reply.send(self.registry.snapshot());
            }
            HubCommand::Shutdown => {}
        }
    }

    fn register(&mut self, handle: ClientHandle) {
        let id = handle.id();
        let pair = handle.pair().map(ToString::to_string);
        if self.registry.register(handle) {
            tracing::info!(
                client_id = %id,
                pair = pair.as_deref().unwrap_or(""),
                clients = self.registry.len(),
                "client registered"
            );
        } else {
            tracing::warn!(client_id = %id, "duplicate registration ignored");
        }
    }

    fn unregister(&mut self, id: ClientId) {
        if self.registry.unregister(id) {
            tracing::info!(client_id = %id, clients = self.registry.len(), "client unregistered");
        } else {
            tracing::debug!(client_id = %id, "unregister for unknown client ignored");
        }
    }
}

fn log_fan_out(pair: Option<&PairId>, outcome: &FanOut, bytes: usize) {
    for (id, reason) in &outcome.evicted {
        tracing::warn!(client_id = %id, %reason, "evicted client");
    }
    tracing::debug!(
        pair = pair.map_or("", PairId::as_str),
        delivered = outcome.delivered,
        evicted = outcome.evicted.len(),
        bytes,
        "fan-out complete"
    );
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::hub::OutboundReceiver;

    fn pair(raw: &str) -> PairId {
        let Some(pair) = PairId::parse(raw) else {
            panic!("pair id must not be empty");
        };
        pair
    }

    async fn connect(hub: &Hub, group: Option<&str>, capacity: usize) -> (ClientId, OutboundReceiver) {
        let (handle, rx) = ClientHandle::new(group.map(pair), capacity);
        let id = handle.id();
        hub.register(handle).await;
        (id, rx)
    }

    async fn snapshot(hub: &Hub) -> RegistrySnapshot {
        let Some(snapshot) = hub.snapshot().await else {
            panic!("hub should be running");
        };
        snapshot
    }

    #[tokio::test]
    async fn pair_scenario_through_the_hub() {
        let (hub, _task) = Hub::spawn(16);
        let (a, mut rx_a) = connect(&hub, Some("x"), 8).await;
        let (b, mut rx_b) = connect(&hub, Some("x"), 8).await;
        let (_c, mut rx_c) = connect(&hub, None, 8).await;

        hub.broadcast_to_pair(pair("x"), "hello").await;
        hub.broadcast("hi-all").await;
        let _ = snapshot(&hub).await;

        assert_eq!(rx_a.try_recv().ok(), Some(Bytes::from_static(b"hello")));
        assert_eq!(rx_b.try_recv().ok(), Some(Bytes::from_static(b"hello")));
        assert_eq!(rx_c.try_recv().ok(), Some(Bytes::from_static(b"hi-all")));
        assert_eq!(rx_a.try_recv().ok(), Some(Bytes::from_static(b"hi-all")));
        assert_eq!(rx_b.try_recv().ok(), Some(Bytes::from_static(b"hi-all")));

        hub.unregister(b).await;
        let snap = snapshot(&hub).await;
        assert_eq!(snap.clients, 2);
        assert_eq!(snap.pairs.get("x"), Some(&1));

        hub.unregister(a).await;
        let snap = snapshot(&hub).await;
        assert_eq!(snap.clients, 1);
        assert!(snap.pairs.is_empty());

        assert_eq!(rx_a.recv().await, None);
        assert_eq!(rx_b.recv().await, None);
    }

    #[tokio::test]
    async fn double_unregister_is_harmless() {
        let (hub, _task) = Hub::spawn(16);
        let (id, mut rx) = connect(&hub, Some("x"), 4).await;
        hub.unregister(id).await;
        hub.unregister(id).await;
        assert_eq!(snapshot(&hub).await, RegistrySnapshot::default());
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn saturated_client_is_evicted_while_others_receive() {
        let (hub, _task) = Hub::spawn(16);
        let (_slow, mut slow_rx) = connect(&hub, None, 1).await;
        let (_fast, mut fast_rx) = connect(&hub, None, 8).await;

        hub.broadcast("fill").await;
        hub.broadcast("overflow").await;
        assert_eq!(snapshot(&hub).await.clients, 1);

        assert_eq!(fast_rx.recv().await, Some(Bytes::from_static(b"fill")));
        assert_eq!(fast_rx.recv().await, Some(Bytes::from_static(b"overflow")));
        assert_eq!(slow_rx.recv().await, Some(Bytes::from_static(b"fill")));
        assert_eq!(slow_rx.recv().await, None);
    }

    #[tokio::test]
    async fn unknown_group_leaves_registry_alone() {
        let (hub, _task) = Hub::spawn(16);
        let (_id, mut rx) = connect(&hub, Some("x"), 4).await;
        let before = snapshot(&hub).await;
        hub.broadcast_to_pair(pair("nonexistent"), "m").await;
        assert_eq!(snapshot(&hub).await, before);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropping_every_hub_closes_clients() {
        let (hub, task) = Hub::spawn(16);
        let (_id, mut rx) = connect(&hub, Some("x"), 4).await;
        let other = hub.clone();
        drop(hub);
        assert!(other.is_running());
        drop(other);

        tokio_test::assert_ok!(task.await);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn shutdown_closes_clients_and_stops() {
        let (hub, task) = Hub::spawn(16);
        let (_id, mut rx) = connect(&hub, None, 4).await;
        hub.broadcast("before").await;
        hub.shutdown().await;

        tokio_test::assert_ok!(task.await);
        assert!(!hub.is_running());
        assert_eq!(rx.recv().await, Some(Bytes::from_static(b"before")));
        assert_eq!(rx.recv().await, None);
        assert!(hub.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn stopped_hub_answers_none() {
        let (hub, coordinator) = Hub::channel(4);
        drop(coordinator);
        assert!(!hub.is_running());
        assert!(hub.snapshot().await.is_none());
        hub.broadcast("dropped").await;
    }
}
