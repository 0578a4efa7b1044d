//! Start-up wiring: providers, stations and their recorders.

use std::path::Path;
use std::sync::Arc;

use stations_parser::radiko::RadikoClient;
use stations_parser::radiru::{RadiruChannel, RadiruClient};
use stations_parser::time::radiko_broadcast_date;
use tracing::{error, info};

use crate::config::RecorderConfig;
use crate::credentials::{CredentialRefreshCoordinator, CredentialRefresher};
use crate::recorder::{FileSinkFactory, Recorder, RecordingContext, RtmpdumpConnector};
use crate::station::StreamSource;
use crate::station::radiko::{RadikoAuthorizer, RadikoStation};
use crate::station::radiru::RadiruStation;
use crate::utils::clock::Clock;
use crate::utils::http_client::build_stations_client;
use crate::{Error, Result};

/// Authorize with radiko and list the stations of the detected area.
///
/// A provider that cannot be reached is skipped with an error log, so one
/// broken provider never keeps the other from recording.
pub async fn radiko_stations(
    http: reqwest::Client,
    config: &RecorderConfig,
    clock: Arc<dyn Clock>,
) -> Vec<Box<dyn StreamSource>> {
    let client = Arc::new(RadikoClient::new(http));
    let authorizer = Arc::new(RadikoAuthorizer::new(
        client.clone(),
        &config.swfextract_path,
        &config.work_dir,
    ));

    if let Err(e) = authorizer.refresh().await {
        error!(provider = "radiko", error = %e, "Initial authorization failed, radiko disabled");
        return Vec::new();
    }

    let coordinator = Arc::new(CredentialRefreshCoordinator::new(
        "radiko",
        authorizer,
        clock.clone(),
        config.coordinator_config(),
    ));
    coordinator.mark_refreshed().await;

    let stations = match client.stations(radiko_broadcast_date(clock.now())).await {
        Ok(stations) => stations,
        Err(e) => {
            error!(provider = "radiko", error = %e, "Station list unavailable, radiko disabled");
            return Vec::new();
        }
    };

    info!(
        provider = "radiko",
        area = ?client.area_id(),
        stations = stations.len(),
        "Provider ready"
    );

    stations
        .into_iter()
        .map(|info| {
            let station = RadikoStation::new(
                info.id,
                info.name,
                client.clone(),
                coordinator.clone(),
                clock.clone(),
                config.cursor_config(),
            )
            .with_schedule(info.programs);
            Box::new(station) as Box<dyn StreamSource>
        })
        .collect()
}

/// The three NHK channels of the configured area.
pub async fn radiru_stations(
    http: reqwest::Client,
    config: &RecorderConfig,
    clock: Arc<dyn Clock>,
) -> Vec<Box<dyn StreamSource>> {
    let client = Arc::new(RadiruClient::new(http));

    let area = match client.area_config(&config.radiru_area_key).await {
        Ok(area) => area,
        Err(e) => {
            error!(
                provider = "radiru",
                area_key = %config.radiru_area_key,
                error = %e,
                "Area configuration unavailable, radiru disabled"
            );
            return Vec::new();
        }
    };

    info!(provider = "radiru", area_key = %area.area_key, "Provider ready");

    RadiruChannel::ALL
        .into_iter()
        .map(|channel| {
            let station = RadiruStation::new(
                channel,
                area.stream_url(channel),
                client.clone(),
                clock.clone(),
                config.cursor_config(),
            );
            Box::new(station) as Box<dyn StreamSource>
        })
        .collect()
}

/// One recorder per station of every enabled provider, all writing into
/// `output_dir`.
pub async fn build_recorders(
    config: &RecorderConfig,
    output_dir: &Path,
    clock: Arc<dyn Clock>,
) -> Result<Vec<Recorder>> {
    let http = build_stations_client(config.http_proxy.as_deref(), config.http_timeout())?;

    let ctx = Arc::new(RecordingContext {
        transport: Arc::new(RtmpdumpConnector::new(
            &config.rtmpdump_path,
            config.connect_timeout(),
        )),
        sinks: Arc::new(FileSinkFactory::new(
            output_dir,
            config.file_extension.clone(),
            config.time_zone()?,
        )),
        clock: clock.clone(),
        config: config.session_config(),
    });

    let mut stations = Vec::new();
    if config.enable_radiko {
        stations.extend(radiko_stations(http.clone(), config, clock.clone()).await);
    }
    if config.enable_radiru {
        stations.extend(radiru_stations(http, config, clock).await);
    }

    if stations.is_empty() {
        return Err(Error::Other("no station available to record".to_string()));
    }

    Ok(stations
        .into_iter()
        .map(|station| Recorder::new(station, ctx.clone()))
        .collect())
}
