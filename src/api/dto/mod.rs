//! Request and response DTOs for the REST API.

pub mod broadcast_dto;
pub mod stats_dto;

pub use broadcast_dto::{BroadcastAccepted, BroadcastRequest};
pub use stats_dto::StatsResponse;
