use std::time::Duration;

use reqwest::{Client, ClientBuilder, RequestBuilder};
use tracing::debug;

use crate::StationError;

pub(crate) const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client builder with the defaults every provider expects.
///
/// Callers may layer proxy or timeout settings on top before building.
pub fn create_client_builder(user_agent: Option<&str>) -> ClientBuilder {
    Client::builder()
        .user_agent(user_agent.unwrap_or(DEFAULT_UA))
        .timeout(DEFAULT_TIMEOUT)
}

/// A ready-to-use client with the default settings.
pub fn default_client() -> Result<Client, StationError> {
    Ok(create_client_builder(None).build()?)
}

/// Send a request and return the body, failing on non-success status codes.
pub(crate) async fn send_text(request: RequestBuilder) -> Result<String, StationError> {
    let response = request.send().await?;
    let status = response.status();
    let url = response.url().to_string();

    if !status.is_success() {
        return Err(StationError::Status {
            url,
            status: status.as_u16(),
        });
    }

    let body = response.text().await?;
    debug!(%url, bytes = body.len(), "Fetched document");
    Ok(body)
}
