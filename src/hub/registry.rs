//! Client registry with pair-group indexing.
//!
//! [`Registry`] is plain, synchronous state. It is owned outright by the
//! coordinator task (see [`super::Hub`]), which is what serializes access;
//! nothing here locks.
//!
//! # Invariants
//!
//! - every id in a pair group is also in the client map;
//! - a pair group exists iff it has at least one member;
//! - a client sits in at most one group, the one named by its own pair id;
//! - a handle is closed exactly once, when it leaves the client map.

use std::collections::{BTreeMap, HashMap, HashSet};

use bytes::Bytes;
use serde::Serialize;

use super::{ClientHandle, ClientId, DeliveryError, PairId};

/// Outcome of one fan-out.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FanOut {
    /// Number of queues the payload was appended to.
    pub delivered: usize,
    /// Clients evicted during this fan-out, with the reason.
    pub evicted: Vec<(ClientId, DeliveryError)>,
}

/// Point-in-time view of the registry.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrySnapshot {
    /// Number of registered clients.
    pub clients: usize,
    /// Member count per pair group.
    pub pairs: BTreeMap<String, usize>,
}

/// All registered clients, indexed by id and by pair group.
#[derive(Debug, Default)]
pub struct Registry {
    clients: HashMap<ClientId, ClientHandle>,
    pairs: HashMap<PairId, HashSet<ClientId>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a client, and its pair group membership if it has one.
    ///
    /// Returns `false` if a client with the same id is already registered;
    /// the registered one is kept and `handle` is discarded.
    pub fn register(&mut self, handle: ClientHandle) -> bool {
        let id = handle.id();
        if self.clients.contains_key(&id) {
            return false;
        }
        if let Some(pair) = handle.pair() {
            self.pairs.entry(pair.clone()).or_default().insert(id);
        }
        self.clients.insert(id, handle);
        true
    }

    /// Removes a client from every index and closes its queue.
    ///
    /// Returns `false` if the client was not registered.
    pub fn unregister(&mut self, id: ClientId) -> bool {
        self.remove(id).is_some()
    }

    /// Offers `payload` to every client without waiting.
    ///
    /// Clients whose queue is full or closed are evicted before returning.
    pub fn broadcast(&mut self, payload: &Bytes) -> FanOut {
        let mut outcome = FanOut::default();
        for (id, handle) in &mut self.clients {
            deliver_or_mark(*id, handle, payload, &mut outcome);
        }
        self.evict(&outcome);
        outcome
    }

    /// Offers `payload` to the members of `pair` without waiting.
    ///
    /// Returns `None` if no such group exists. Evicted members leave both
    /// the client map and the group.
    pub fn broadcast_to_pair(&mut self, pair: &PairId, payload: &Bytes) -> Option<FanOut> {
        let members = self.pairs.get(pair)?;
        let mut outcome = FanOut::default();
        for id in members {
            if let Some(handle) = self.clients.get_mut(id) {
                deliver_or_mark(*id, handle, payload, &mut outcome);
            }
        }
        self.evict(&outcome);
        Some(outcome)
    }

    /// Closes and removes every client. Returns how many were removed.
    pub fn close_all(&mut self) -> usize {
        let count = self.clients.len();
        for handle in self.clients.values_mut() {
            handle.close();
        }
        self.clients.clear();
        self.pairs.clear();
        count
    }

    /// Returns the number of registered clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns `true` if no client is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.contains_key(&id)
    }

    /// Returns the number of members of `pair`, or `None` if the group does
    /// not exist.
    #[must_use]
    pub fn pair_len(&self, pair: &PairId) -> Option<usize> {
        self.pairs.get(pair).map(HashSet::len)
    }

    /// Returns `true` if `id` is a member of `pair`.
    #[must_use]
    pub fn is_member(&self, pair: &PairId, id: ClientId) -> bool {
        self.pairs
            .get(pair)
            .is_some_and(|members| members.contains(&id))
    }

    /// Captures client and group counts.
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            clients: self.clients.len(),
            pairs: self
                .pairs
                .iter()
                .map(|(pair, members)| (pair.to_string(), members.len()))
                .collect(),
        }
    }

    fn evict(&mut self, outcome: &FanOut) {
        for (id, _) in &outcome.evicted {
            self.remove(*id);
        }
    }

    fn remove(&mut self, id: ClientId) -> Option<ClientHandle> {
        let mut handle = self.clients.remove(&id)?;
        if let Some(pair) = handle.pair()
            && let Some(members) = self.pairs.get_mut(pair)
        {
            members.remove(&id);
            if members.is_empty() {
                self.pairs.remove(pair);
            }
        }
        handle.close();
        Some(handle)
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        for (pair, members) in &self.pairs {
            assert!(!members.is_empty(), "empty group {pair} left behind");
            for id in members {
                let handle = self.clients.get(id);
                assert!(handle.is_some(), "group {pair} holds unregistered {id}");
                assert_eq!(handle.and_then(ClientHandle::pair), Some(pair));
            }
        }
        for (id, handle) in &self.clients {
            if let Some(pair) = handle.pair() {
                assert!(self.is_member(pair, *id), "{id} missing from group {pair}");
            }
        }
    }
}

fn deliver_or_mark(id: ClientId, handle: &mut ClientHandle, payload: &Bytes, outcome: &mut FanOut) {
    match handle.try_deliver(payload.clone()) {
        Ok(()) => outcome.delivered += 1,
        Err(reason) => {
            handle.mark_closing();
            outcome.evicted.push((id, reason));
        }
    }
}
