//! Recorder configuration.
//!
//! Every setting has a default and can be overridden with an environment
//! variable named `RADIO_SREC_<FIELD>` (e.g. `RADIO_SREC_MAX_ATTEMPTS=6`).
//! A `.env` file in the working directory is read first.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;

use crate::credentials::CoordinatorConfig;
use crate::recorder::SessionConfig;
use crate::scheduler::SupervisorConfig;
use crate::station::CursorConfig;
use crate::{Error, Result};

/// Prefix of every configuration environment variable.
pub const ENV_PREFIX: &str = "RADIO_SREC_";

#[derive(Debug, Clone, PartialEq)]
pub struct RecorderConfig {
    /// A credential refreshed less than this many seconds ago is reused.
    pub staleness_window_secs: u64,
    /// Connect attempts per program before it is abandoned.
    pub max_attempts: u32,
    pub retry_backoff_secs: u64,
    /// Delay between starting consecutive station workers.
    pub stagger_delay_secs: u64,
    /// Pause before a station whose schedule is unavailable tries again.
    pub degraded_retry_delay_secs: u64,
    pub read_chunk_size: usize,
    /// Time allowed for a transport to deliver its first bytes.
    pub connect_timeout_secs: u64,
    pub max_fetch_attempts: u32,
    pub fetch_retry_delay_secs: u64,
    /// Refetches in a row that may yield no upcoming program.
    pub max_empty_refetches: u32,
    /// Consecutive refresh failures after which failures are logged as errors.
    pub refresh_escalation_threshold: u32,
    /// Stop each recording after this many seconds. Debugging aid.
    pub debug_record_limit_secs: Option<u64>,
    pub file_extension: String,
    /// IANA zone used to render program start times in file names.
    pub timezone: String,
    pub log_dir: PathBuf,
    /// Overrides the console/file log filter, e.g. `radio_srec=debug`.
    pub log_filter: Option<String>,
    /// Scratch space for the radiko player and extracted key.
    pub work_dir: PathBuf,
    pub rtmpdump_path: String,
    pub swfextract_path: String,
    pub radiru_area_key: String,
    pub http_timeout_secs: u64,
    /// Unset uses the system proxy settings; `none` disables proxies.
    pub http_proxy: Option<String>,
    pub enable_radiko: bool,
    pub enable_radiru: bool,
}

/// Longest accepted `debug_record_limit_secs`: one day.
pub const MAX_DEBUG_RECORD_LIMIT_SECS: u64 = 24 * 60 * 60;

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            staleness_window_secs: 600,
            max_attempts: 4,
            retry_backoff_secs: 10,
            stagger_delay_secs: 3,
            degraded_retry_delay_secs: 60,
            read_chunk_size: 1024,
            connect_timeout_secs: 30,
            max_fetch_attempts: 3,
            fetch_retry_delay_secs: 30,
            max_empty_refetches: 3,
            refresh_escalation_threshold: 3,
            debug_record_limit_secs: None,
            file_extension: "flv".to_string(),
            timezone: "Asia/Tokyo".to_string(),
            log_dir: PathBuf::from("logs"),
            log_filter: None,
            work_dir: std::env::temp_dir().join("radio-srec"),
            rtmpdump_path: "rtmpdump".to_string(),
            swfextract_path: "swfextract".to_string(),
            radiru_area_key: stations_parser::radiru::DEFAULT_AREA_KEY.to_string(),
            http_timeout_secs: 30,
            http_proxy: None,
            enable_radiko: true,
            enable_radiru: true,
        }
    }
}

impl RecorderConfig {
    /// Load `.env` (if present), then apply `RADIO_SREC_*` overrides on top
    /// of the defaults.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |field: &str| {
            lookup(&format!("{ENV_PREFIX}{}", field.to_ascii_uppercase()))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        override_parsed(&var, "staleness_window_secs", &mut config.staleness_window_secs)?;
        override_parsed(&var, "max_attempts", &mut config.max_attempts)?;
        override_parsed(&var, "retry_backoff_secs", &mut config.retry_backoff_secs)?;
        override_parsed(&var, "stagger_delay_secs", &mut config.stagger_delay_secs)?;
        override_parsed(
            &var,
            "degraded_retry_delay_secs",
            &mut config.degraded_retry_delay_secs,
        )?;
        override_parsed(&var, "read_chunk_size", &mut config.read_chunk_size)?;
        override_parsed(&var, "connect_timeout_secs", &mut config.connect_timeout_secs)?;
        override_parsed(&var, "max_fetch_attempts", &mut config.max_fetch_attempts)?;
        override_parsed(&var, "fetch_retry_delay_secs", &mut config.fetch_retry_delay_secs)?;
        override_parsed(&var, "max_empty_refetches", &mut config.max_empty_refetches)?;
        override_parsed(
            &var,
            "refresh_escalation_threshold",
            &mut config.refresh_escalation_threshold,
        )?;
        if let Some(value) = var("debug_record_limit_secs") {
            config.debug_record_limit_secs = Some(parse_value("debug_record_limit_secs", &value)?);
        }
        override_parsed(&var, "file_extension", &mut config.file_extension)?;
        override_parsed(&var, "timezone", &mut config.timezone)?;
        override_parsed(&var, "log_dir", &mut config.log_dir)?;
        config.log_filter = var("log_filter").or(config.log_filter);
        override_parsed(&var, "work_dir", &mut config.work_dir)?;
        override_parsed(&var, "rtmpdump_path", &mut config.rtmpdump_path)?;
        override_parsed(&var, "swfextract_path", &mut config.swfextract_path)?;
        override_parsed(&var, "radiru_area_key", &mut config.radiru_area_key)?;
        override_parsed(&var, "http_timeout_secs", &mut config.http_timeout_secs)?;
        config.http_proxy = var("http_proxy").or(config.http_proxy);
        override_flag(&var, "enable_radiko", &mut config.enable_radiko)?;
        override_flag(&var, "enable_radiru", &mut config.enable_radiru)?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the recorder cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::config("max_attempts must be at least 1"));
        }
        if self.max_fetch_attempts == 0 {
            return Err(Error::config("max_fetch_attempts must be at least 1"));
        }
        if self.read_chunk_size == 0 {
            return Err(Error::config("read_chunk_size must be greater than 0"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(Error::config("connect_timeout_secs must be greater than 0"));
        }
        if let Some(limit) = self.debug_record_limit_secs
            && !(1..=MAX_DEBUG_RECORD_LIMIT_SECS).contains(&limit)
        {
            return Err(Error::config(format!(
                "debug_record_limit_secs must be between 1 and {MAX_DEBUG_RECORD_LIMIT_SECS}"
            )));
        }
        if self.file_extension.trim_start_matches('.').is_empty() {
            return Err(Error::config("file_extension must not be empty"));
        }
        self.time_zone()?;
        Ok(())
    }

    pub fn time_zone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| Error::config(format!("invalid timezone {:?}: {}", self.timezone, e)))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            max_attempts: self.max_attempts,
            retry_backoff: Duration::from_secs(self.retry_backoff_secs),
            read_chunk_size: self.read_chunk_size,
            debug_record_limit: self.debug_record_limit_secs.map(Duration::from_secs),
        }
    }

    pub fn cursor_config(&self) -> CursorConfig {
        CursorConfig {
            max_fetch_attempts: self.max_fetch_attempts,
            fetch_retry_delay: Duration::from_secs(self.fetch_retry_delay_secs),
            max_empty_refetches: self.max_empty_refetches,
        }
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            staleness_window: Duration::from_secs(self.staleness_window_secs),
            escalation_threshold: self.refresh_escalation_threshold,
        }
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            stagger_delay: Duration::from_secs(self.stagger_delay_secs),
            degraded_retry_delay: Duration::from_secs(self.degraded_retry_delay_secs),
        }
    }
}

fn parse_value<T>(field: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| {
        Error::config(format!(
            "{ENV_PREFIX}{}={:?}: {}",
            field.to_ascii_uppercase(),
            value,
            e
        ))
    })
}

fn override_parsed<T, V>(var: &V, field: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    if let Some(value) = var(field) {
        *target = parse_value(field, &value)?;
    }
    Ok(())
}

fn override_flag<V>(var: &V, field: &str, target: &mut bool) -> Result<()>
where
    V: Fn(&str) -> Option<String>,
{
    let Some(value) = var(field) else {
        return Ok(());
    };
    *target = match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            return Err(Error::config(format!(
                "{ENV_PREFIX}{}={:?}: expected a boolean",
                field.to_ascii_uppercase(),
                value
            )));
        }
    };
    Ok(())
}
