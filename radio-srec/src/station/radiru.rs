//! NHK radiru channels. No credentials are involved.

use std::sync::Arc;

use async_trait::async_trait;
use stations_parser::radiru::{OFF_AIR_MARKER, RadiruChannel, RadiruClient};
use stations_parser::{Program, StationError};

use super::{CursorConfig, CursorError, ProgramCursor, ScheduleFeed, StreamSource};
use crate::credentials::{CredentialError, RefreshOutcome};
use crate::utils::clock::Clock;

pub struct RadiruScheduleFeed {
    client: Arc<RadiruClient>,
    channel: RadiruChannel,
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl ScheduleFeed for RadiruScheduleFeed {
    async fn fetch_schedule(&self) -> Result<Vec<Program>, StationError> {
        self.client.programs(self.channel, self.clock.now()).await
    }
}

pub struct RadiruStation {
    channel: RadiruChannel,
    locator: String,
    cursor: ProgramCursor<RadiruScheduleFeed>,
}

impl RadiruStation {
    /// `stream_url` is the channel's entry in the area configuration.
    pub fn new(
        channel: RadiruChannel,
        stream_url: &str,
        client: Arc<RadiruClient>,
        clock: Arc<dyn Clock>,
        cursor_config: CursorConfig,
    ) -> Self {
        let locator = client.build_locator(stream_url);
        let feed = RadiruScheduleFeed {
            client,
            channel,
            clock: clock.clone(),
        };
        Self {
            channel,
            locator,
            cursor: ProgramCursor::new(channel.display_name(), feed, clock, cursor_config),
        }
    }
}

#[async_trait]
impl StreamSource for RadiruStation {
    fn display_name(&self) -> &str {
        self.channel.display_name()
    }

    async fn next_program(&mut self) -> Result<Program, CursorError> {
        self.cursor.next_program().await
    }

    async fn stream_locator(&mut self) -> Result<String, StationError> {
        Ok(self.locator.clone())
    }

    async fn refresh(&self) -> Result<RefreshOutcome, CredentialError> {
        Ok(RefreshOutcome::NotRequired)
    }

    fn off_air_marker(&self) -> Option<&str> {
        Some(OFF_AIR_MARKER)
    }
}
