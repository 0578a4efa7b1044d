//! radiko: commercial stations, token-authenticated per listener area.

mod auth;
mod client;
mod models;

pub use auth::{AuthKeyExtractor, parse_area_id, partial_key};
pub use client::{DEFAULT_BASE_URL, RadikoClient};
pub use models::{RadikoStationInfo, StreamUrl};

/// Title radiko uses for slots with no broadcast.
pub const OFF_AIR_MARKER: &str = "放送休止";
