//! Hub layer: client handles, the registry, and the coordinator task.
//!
//! The [`Hub`] is the single authority over which clients are connected and
//! which pair group each belongs to. Producers never touch the [`Registry`]
//! directly; they send requests through a cloneable [`Hub`] handle and the
//! coordinator applies them one at a time.

pub mod client;
pub mod client_id;
pub mod coordinator;
pub mod registry;

pub use client::{ClientHandle, ClientStatus, DeliveryError, OutboundReceiver, PairId};
pub use client_id::ClientId;
pub use coordinator::{Coordinator, Hub, HubCommand};
pub use registry::{FanOut, Registry, RegistrySnapshot};
