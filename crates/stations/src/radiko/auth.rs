//! radiko token minting.
//!
//! The player SWF embeds a key image as binary tag 12. `auth1_fms` hands out
//! a token plus an offset/length into that image; the base64 of that slice is
//! the partial key that `auth2_fms` exchanges for an activated token and the
//! listener's area.

use std::path::PathBuf;
use std::process::Stdio;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use process_utils::{find_executable, tokio_command};
use reqwest::Client;
use tracing::{debug, info};

use crate::StationError;

pub(crate) const PLAYER_URL: &str = "http://radiko.jp/apps/js/flash/myplayer-release.swf";

const PLAYER_FILE: &str = "myplayer.swf";
const AUTH_KEY_FILE: &str = "authkey.png";
const AUTH_KEY_TAG: &str = "12";

pub(crate) const HEADER_APP: (&str, &str) = ("X-Radiko-App", "pc_ts");
pub(crate) const HEADER_APP_VERSION: (&str, &str) = ("X-Radiko-App-Version", "4.0.0");
pub(crate) const HEADER_USER: (&str, &str) = ("X-Radiko-User", "test-stream");
pub(crate) const HEADER_DEVICE: (&str, &str) = ("X-Radiko-Device", "pc");

pub(crate) const HEADER_AUTH_TOKEN: &str = "X-Radiko-AuthToken";
pub(crate) const HEADER_KEY_OFFSET: &str = "X-Radiko-KeyOffset";
pub(crate) const HEADER_KEY_LENGTH: &str = "X-Radiko-KeyLength";
pub(crate) const HEADER_PARTIAL_KEY: &str = "X-Radiko-PartialKey";

/// Extracts the auth key image from the radiko player with `swfextract`.
#[derive(Debug, Clone)]
pub struct AuthKeyExtractor {
    swfextract: PathBuf,
    work_dir: PathBuf,
}

impl AuthKeyExtractor {
    pub fn new(swfextract: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            swfextract: swfextract.into(),
            work_dir: work_dir.into(),
        }
    }

    /// Download the player and extract the key image bytes.
    pub async fn extract(&self, http: &Client, player_url: &str) -> Result<Vec<u8>, StationError> {
        let tool = find_executable(&self.swfextract).ok_or_else(|| {
            StationError::ToolUnavailable(self.swfextract.display().to_string())
        })?;

        tokio::fs::create_dir_all(&self.work_dir).await?;
        let swf_path = self.work_dir.join(PLAYER_FILE);
        let key_path = self.work_dir.join(AUTH_KEY_FILE);

        let response = http.get(player_url).send().await?;
        if !response.status().is_success() {
            return Err(StationError::Status {
                url: player_url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let swf = response.bytes().await?;
        tokio::fs::write(&swf_path, &swf).await?;
        debug!(path = %swf_path.display(), bytes = swf.len(), "Downloaded radiko player");

        let status = tokio_command(&tool)
            .arg("-b")
            .arg(AUTH_KEY_TAG)
            .arg(&swf_path)
            .arg("-o")
            .arg(&key_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            return Err(StationError::ToolFailed {
                tool: tool.display().to_string(),
                code: status.code(),
            });
        }

        let key = tokio::fs::read(&key_path).await?;
        info!(bytes = key.len(), "Extracted radiko auth key");
        Ok(key)
    }
}

/// Base64 of `key[offset..offset + length]`.
pub fn partial_key(key: &[u8], offset: usize, length: usize) -> Result<String, StationError> {
    let end = offset
        .checked_add(length)
        .filter(|end| *end <= key.len())
        .ok_or_else(|| {
            StationError::Auth(format!(
                "key slice {offset}+{length} out of range for {} byte key",
                key.len()
            ))
        })?;
    Ok(STANDARD.encode(&key[offset..end]))
}

/// Area id from the `auth2_fms` body, e.g. `JP13,東京都,tokyo Japan` → `JP13`.
pub fn parse_area_id(body: &str) -> Result<String, StationError> {
    body.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.split(',').next())
        .map(|area| area.trim().to_string())
        .filter(|area| area.starts_with("JP"))
        .ok_or_else(|| StationError::Auth(format!("unexpected auth2 response: {body:?}")))
}
