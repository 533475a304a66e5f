//! WebSocket layer: upgrade handling, connection pumps, inbound routing.
//!
//! The endpoint at `/ws?pair=<id>` turns each accepted socket into a
//! [`crate::hub::ClientHandle`], registers it with the hub, and then runs a
//! reader and a writer for it until either side gives up.

pub mod connection;
pub mod handler;
pub mod messages;
