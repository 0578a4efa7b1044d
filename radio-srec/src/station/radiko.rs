//! radiko stations.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use stations_parser::radiko::{AuthKeyExtractor, OFF_AIR_MARKER, RadikoClient, StreamUrl};
use stations_parser::{Program, StationError};
use tracing::{debug, info};

use super::{CursorConfig, CursorError, ProgramCursor, ScheduleFeed, StreamSource};
use crate::credentials::{
    CredentialError, CredentialRefreshCoordinator, CredentialRefresher, RefreshOutcome,
};
use crate::utils::clock::Clock;

/// Runs the radiko authorization workflow on behalf of the coordinator.
pub struct RadikoAuthorizer {
    client: Arc<RadikoClient>,
    extractor: AuthKeyExtractor,
}

impl RadikoAuthorizer {
    pub fn new(
        client: Arc<RadikoClient>,
        swfextract: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            extractor: AuthKeyExtractor::new(swfextract, work_dir),
        }
    }
}

#[async_trait]
impl CredentialRefresher for RadikoAuthorizer {
    async fn refresh(&self) -> Result<(), CredentialError> {
        let previous = self.client.auth_token();
        self.client.authorize(&self.extractor).await?;
        debug!(
            token_changed = previous != self.client.auth_token(),
            area = ?self.client.area_id(),
            "radiko authorization complete"
        );
        Ok(())
    }
}

/// Today's program list of one radiko station.
pub struct RadikoScheduleFeed {
    client: Arc<RadikoClient>,
    station_id: String,
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl ScheduleFeed for RadikoScheduleFeed {
    async fn fetch_schedule(&self) -> Result<Vec<Program>, StationError> {
        let info = self.client.station(&self.station_id, self.clock.now()).await?;
        Ok(info.programs)
    }
}

pub struct RadikoStation {
    id: String,
    name: String,
    client: Arc<RadikoClient>,
    coordinator: Arc<CredentialRefreshCoordinator>,
    cursor: ProgramCursor<RadikoScheduleFeed>,
    stream_urls: Option<Vec<StreamUrl>>,
}

impl RadikoStation {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        client: Arc<RadikoClient>,
        coordinator: Arc<CredentialRefreshCoordinator>,
        clock: Arc<dyn Clock>,
        cursor_config: CursorConfig,
    ) -> Self {
        let id = id.into();
        let name = name.into();
        let feed = RadikoScheduleFeed {
            client: client.clone(),
            station_id: id.clone(),
            clock: clock.clone(),
        };
        Self {
            cursor: ProgramCursor::new(name.clone(), feed, clock, cursor_config),
            id,
            name,
            client,
            coordinator,
            stream_urls: None,
        }
    }

    /// Start from a program list that was already fetched, e.g. while
    /// enumerating the area's stations.
    pub fn with_schedule(mut self, programs: Vec<Program>) -> Self {
        self.cursor = self.cursor.with_schedule(programs);
        self
    }
}

#[async_trait]
impl StreamSource for RadikoStation {
    fn display_name(&self) -> &str {
        &self.name
    }

    async fn next_program(&mut self) -> Result<Program, CursorError> {
        self.cursor.next_program().await
    }

    async fn stream_locator(&mut self) -> Result<String, StationError> {
        if self.stream_urls.is_none() {
            let urls = self.client.stream_urls(&self.id).await?;
            info!(station = %self.name, count = urls.len(), "Resolved stream urls");
            self.stream_urls = Some(urls);
        }
        self.client
            .build_locator(self.stream_urls.as_deref().unwrap_or_default())
    }

    async fn refresh(&self) -> Result<RefreshOutcome, CredentialError> {
        self.coordinator.request_refresh().await
    }

    fn off_air_marker(&self) -> Option<&str> {
        Some(OFF_AIR_MARKER)
    }
}
