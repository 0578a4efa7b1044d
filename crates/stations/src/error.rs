use thiserror::Error;

#[derive(Debug, Error)]
pub enum StationError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::DeError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid time {value:?}: expected {format}")]
    InvalidTime { value: String, format: &'static str },
    #[error("authorization failed: {0}")]
    Auth(String),
    #[error("required tool not found: {0}")]
    ToolUnavailable(String),
    #[error("{tool} exited with status {code:?}")]
    ToolFailed { tool: String, code: Option<i32> },
    #[error("unknown area key: {0}")]
    UnknownArea(String),
    #[error("station not found: {0}")]
    StationNotFound(String),
    #[error("no stream urls for station {0}")]
    NoStreamUrls(String),
    #[error("not authorized")]
    NotAuthorized,
}

impl StationError {
    /// Whether retrying the same request later can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Io(_) | Self::NoStreamUrls(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
