use std::time::Duration;

use crate::{Error, Result};

/// Apply the configured proxy to an existing `reqwest::ClientBuilder`.
///
/// - `None` => reqwest defaults (system/env proxy settings)
/// - `Some("")` or `Some("none")` => disable all proxies
/// - `Some(url)` => route every request through `url`; an invalid URL is a
///   configuration error
pub fn apply_proxy(
    builder: reqwest::ClientBuilder,
    proxy_url: Option<&str>,
) -> Result<reqwest::ClientBuilder> {
    let Some(url) = proxy_url.map(str::trim) else {
        return Ok(builder);
    };

    if url.is_empty() || url.eq_ignore_ascii_case("none") {
        return Ok(builder.no_proxy());
    }

    reqwest::Proxy::all(url)
        .map(|proxy| builder.proxy(proxy))
        .map_err(|e| Error::config(format!("invalid proxy URL {url:?}: {e}")))
}

/// Build the client shared by every provider, starting from
/// `stations-parser`'s defaults.
pub fn build_stations_client(
    proxy_url: Option<&str>,
    request_timeout: Duration,
) -> Result<reqwest::Client> {
    let mut builder = stations_parser::create_client_builder(None);

    if request_timeout > Duration::ZERO {
        builder = builder.timeout(request_timeout);
    }

    builder = apply_proxy(builder, proxy_url)?;

    builder
        .build()
        .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))
}
