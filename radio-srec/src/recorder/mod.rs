//! Program recording: the per-program state machine and its I/O seams.

mod rtmpdump;
mod session;
mod sink;
mod transport;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::station::StreamSource;

pub use rtmpdump::RtmpdumpConnector;
pub use session::{
    AbortReason, RecordingContext, RecordingSession, RetryState, SessionConfig, SessionOutcome,
    SessionState,
};
pub use sink::{FileSinkFactory, OutputSink, SinkFactory};
pub use transport::{TransportConnector, TransportError, TransportStream};

/// A station together with everything needed to record it.
pub struct Recorder {
    station: Box<dyn StreamSource>,
    ctx: Arc<RecordingContext>,
}

impl Recorder {
    pub fn new(station: Box<dyn StreamSource>, ctx: Arc<RecordingContext>) -> Self {
        Self { station, ctx }
    }

    pub fn station_name(&self) -> &str {
        self.station.display_name()
    }

    /// Record the station's next program from start to finish.
    pub async fn record_next(&mut self, cancel: &CancellationToken) -> SessionOutcome {
        RecordingSession::new(self.station.as_mut(), &self.ctx, cancel)
            .run()
            .await
    }
}
