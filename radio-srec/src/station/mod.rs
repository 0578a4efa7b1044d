//! Stations: a schedule plus a way to reach the live stream.
//!
//! Each provider implements [`StreamSource`]. The recording loop only talks
//! to this trait, so it knows nothing about tokens, XML or areas.

mod cursor;
pub mod radiko;
pub mod radiru;

use async_trait::async_trait;
use stations_parser::{Program, StationError};

use crate::credentials::{CredentialError, RefreshOutcome};

pub use cursor::{CursorConfig, CursorError, ProgramCursor, ScheduleFeed};

#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Human-readable station name, used in file names and logs.
    fn display_name(&self) -> &str;

    /// The next program that has not ended yet.
    async fn next_program(&mut self) -> Result<Program, CursorError>;

    /// Connection string for the transport. Resolved at connect time because
    /// it may embed a credential that changes after a refresh.
    async fn stream_locator(&mut self) -> Result<String, StationError>;

    /// Ask for a credential refresh after a failed connection.
    async fn refresh(&self) -> Result<RefreshOutcome, CredentialError>;

    /// Title substring that marks a placeholder slot with nothing on air.
    fn off_air_marker(&self) -> Option<&str> {
        None
    }
}
