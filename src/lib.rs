//! # pairhub
//!
//! Real-time WebSocket fan-out hub.
//!
//! Clients connect to `/ws`, optionally naming a pair group
//! (`/ws?pair=<id>`). Messages are delivered either to every connected
//! client or only to the members of one pair group. Delivery never waits on a
//! slow client: if its outbound queue is full, the client is disconnected.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket, HTTP)
//!     │
//!     ├── WS Handler + reader/writer pumps (ws/)
//!     ├── REST Handlers (api/)
//!     │
//!     ├── Hub handle ──mpsc──► Coordinator task (hub/)
//!     │                            │
//!     │                            └── Registry: clients + pair groups
//!     │
//!     └── per-client outbound queues (bounded mpsc)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod error;
pub mod hub;
pub mod ws;
