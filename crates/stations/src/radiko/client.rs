use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use reqwest::Client;
use reqwest::header::HeaderMap;
use tracing::{debug, info};

use super::auth::{
    AuthKeyExtractor, HEADER_APP, HEADER_APP_VERSION, HEADER_AUTH_TOKEN, HEADER_DEVICE,
    HEADER_KEY_LENGTH, HEADER_KEY_OFFSET, HEADER_PARTIAL_KEY, HEADER_USER, PLAYER_URL,
    parse_area_id, partial_key,
};
use super::models::{RadikoStationInfo, StreamUrl, parse_program_document, parse_stream_urls};
use crate::StationError;
use crate::client::send_text;
use crate::time::radiko_broadcast_date;

pub const DEFAULT_BASE_URL: &str = "http://radiko.jp";

/// Token and area obtained from the last successful authorization.
#[derive(Debug, Clone, Default)]
struct AuthSession {
    token: Option<String>,
    area_id: Option<String>,
}

/// radiko API client shared by every radiko station.
///
/// The auth session sits behind a lock so that a token renewed by one station
/// is immediately visible to the others.
pub struct RadikoClient {
    http: Client,
    base_url: String,
    player_url: String,
    session: RwLock<AuthSession>,
}

impl RadikoClient {
    pub fn new(http: Client) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            player_url: PLAYER_URL.to_string(),
            session: RwLock::new(AuthSession::default()),
        }
    }

    pub fn auth_token(&self) -> Option<String> {
        self.session.read().token.clone()
    }

    pub fn area_id(&self) -> Option<String> {
        self.session.read().area_id.clone()
    }

    /// Reuse a token and area obtained earlier, skipping the handshake.
    pub fn restore_session(&self, token: impl Into<String>, area_id: impl Into<String>) {
        *self.session.write() = AuthSession {
            token: Some(token.into()),
            area_id: Some(area_id.into()),
        };
    }

    /// Run the full authorization handshake and store the new session.
    pub async fn authorize(&self, extractor: &AuthKeyExtractor) -> Result<(), StationError> {
        let key = extractor.extract(&self.http, &self.player_url).await?;

        let auth1 = self
            .http
            .post(format!("{}/v2/api/auth1_fms", self.base_url))
            .header("pragma", "no-cache")
            .header(HEADER_APP.0, HEADER_APP.1)
            .header(HEADER_APP_VERSION.0, HEADER_APP_VERSION.1)
            .header(HEADER_USER.0, HEADER_USER.1)
            .header(HEADER_DEVICE.0, HEADER_DEVICE.1)
            .body("\r\n")
            .send()
            .await?;

        if !auth1.status().is_success() {
            return Err(StationError::Status {
                url: auth1.url().to_string(),
                status: auth1.status().as_u16(),
            });
        }

        let headers = auth1.headers();
        let token = header_str(headers, HEADER_AUTH_TOKEN)?;
        let offset = header_usize(headers, HEADER_KEY_OFFSET)?;
        let length = header_usize(headers, HEADER_KEY_LENGTH)?;
        let partial = partial_key(&key, offset, length)?;
        debug!(offset, length, "auth1 accepted");

        let body = send_text(
            self.http
                .post(format!("{}/v2/api/auth2_fms", self.base_url))
                .header("pragma", "no-cache")
                .header(HEADER_APP.0, HEADER_APP.1)
                .header(HEADER_APP_VERSION.0, HEADER_APP_VERSION.1)
                .header(HEADER_USER.0, HEADER_USER.1)
                .header(HEADER_DEVICE.0, HEADER_DEVICE.1)
                .header(HEADER_AUTH_TOKEN, &token)
                .header(HEADER_PARTIAL_KEY, &partial)
                .body("\r\n"),
        )
        .await?;
        let area_id = parse_area_id(&body)?;

        info!(area = %area_id, "radiko authorization complete");
        *self.session.write() = AuthSession {
            token: Some(token),
            area_id: Some(area_id),
        };
        Ok(())
    }

    /// All stations of the authorized area with their programs for `date`.
    pub async fn stations(&self, date: NaiveDate) -> Result<Vec<RadikoStationInfo>, StationError> {
        let area = self.area_id().ok_or(StationError::NotAuthorized)?;
        let url = format!(
            "{}/v3/program/date/{}/{}.xml",
            self.base_url,
            date.format("%Y%m%d"),
            area
        );
        let xml = send_text(self.http.get(&url)).await?;
        parse_program_document(&xml)
    }

    /// One station's programs for the broadcast day containing `now`.
    pub async fn station(
        &self,
        station_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RadikoStationInfo, StationError> {
        self.stations(radiko_broadcast_date(now))
            .await?
            .into_iter()
            .find(|s| s.id == station_id)
            .ok_or_else(|| StationError::StationNotFound(station_id.to_string()))
    }

    pub async fn stream_urls(&self, station_id: &str) -> Result<Vec<StreamUrl>, StationError> {
        let url = format!(
            "{}/v2/station/stream_multi/{}.xml",
            self.base_url, station_id
        );
        let xml = send_text(self.http.get(&url)).await?;
        let urls = parse_stream_urls(&xml)?;
        if urls.is_empty() {
            return Err(StationError::NoStreamUrls(station_id.to_string()));
        }
        Ok(urls)
    }

    /// librtmp connection string for one of `urls`, using the current token.
    pub fn build_locator(&self, urls: &[StreamUrl]) -> Result<String, StationError> {
        let token = self.auth_token().ok_or(StationError::NotAuthorized)?;
        if urls.is_empty() {
            return Err(StationError::NoStreamUrls(String::new()));
        }
        let stream = &urls[(rand::random::<u64>() % urls.len() as u64) as usize];
        Ok(locator(&stream.url, &self.player_url, &token))
    }
}

fn locator(stream_url: &str, player_url: &str, token: &str) -> String {
    format!(
        "{stream_url} swfUrl={player_url} swfVfy=1 conn=S: conn=S: conn=S: conn=S:{token} live=1 timeout=10"
    )
}

fn header_str(headers: &HeaderMap, name: &str) -> Result<String, StationError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| StationError::Auth(format!("missing {name} header")))
}

fn header_usize(headers: &HeaderMap, name: &str) -> Result<usize, StationError> {
    header_str(headers, name)?
        .trim()
        .parse()
        .map_err(|_| StationError::Auth(format!("invalid {name} header")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_format() {
        let s = locator("rtmpe://host/TBS/_definst_/simul-stream.stream", PLAYER_URL, "tok");
        assert_eq!(
            s,
            "rtmpe://host/TBS/_definst_/simul-stream.stream swfUrl=http://radiko.jp/apps/js/flash/myplayer-release.swf swfVfy=1 conn=S: conn=S: conn=S: conn=S:tok live=1 timeout=10"
        );
    }

    #[test]
    fn test_locator_requires_token() {
        let client = RadikoClient::new(Client::new());
        let urls = vec![StreamUrl {
            url: "rtmpe://host/a".to_string(),
            areafree: false,
        }];
        assert!(matches!(
            client.build_locator(&urls),
            Err(StationError::NotAuthorized)
        ));
    }

    #[tokio::test]
    async fn test_stations_require_area() {
        let client = RadikoClient::new(Client::new());
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(matches!(
            client.stations(date).await,
            Err(StationError::NotAuthorized)
        ));
    }
}
