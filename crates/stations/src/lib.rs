//! Clients for the Japanese internet radio providers recorded by `radio-srec`.
//!
//! Each provider module knows how to fetch a station's program schedule, how
//! to build the RTMP connection string for a station and, where the provider
//! requires it, how to mint an authentication token.
//!
//! - [`radiko`]: commercial stations, token-authenticated, area-restricted.
//! - [`radiru`]: NHK channels, no credentials.

pub mod client;
pub mod error;
pub mod program;
pub mod radiko;
pub mod radiru;
pub mod time;

pub use client::{create_client_builder, default_client};
pub use error::StationError;
pub use program::Program;
