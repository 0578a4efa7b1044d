//! Recording file names.
//!
//! Program titles come straight from provider schedules and routinely contain
//! `/`, `?` or full-width punctuation. Titles are sanitized so that a title
//! can never escape the output directory or produce a name that Windows,
//! Linux or macOS refuses, while Japanese text is kept as-is.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Characters that are invalid in Windows filenames (includes both path separators).
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Windows reserved filenames (case-insensitive)
const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Timestamp layout of the leading `[...]` block, e.g. `2024-0101-0500`.
pub const START_FORMAT: &str = "%Y-%m%d-%H%M";

/// Sanitize a string for use in filenames across all platforms.
///
/// Control characters and [`INVALID_CHARS`] become `_` (runs collapse to
/// one), leading/trailing spaces and dots are trimmed, Windows reserved names
/// are prefixed with `_`, and an empty result becomes `unnamed`.
///
/// ```
/// use radio_srec::utils::filename::sanitize_filename;
///
/// assert_eq!(sanitize_filename("AC/DC特集"), "AC_DC特集");
/// assert_eq!(sanitize_filename(""), "unnamed");
/// ```
pub fn sanitize_filename(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut last_was_replacement = false;

    for c in input.chars() {
        if c.is_control() || INVALID_CHARS.contains(&c) {
            if !last_was_replacement {
                result.push('_');
                last_was_replacement = true;
            }
        } else {
            result.push(c);
            last_was_replacement = false;
        }
    }

    let trimmed = result.trim_matches(|c| c == ' ' || c == '.');
    if trimmed.is_empty() {
        return "unnamed".to_string();
    }

    let upper = trimmed.to_uppercase();
    for reserved in WINDOWS_RESERVED_NAMES {
        if upper == *reserved || upper.starts_with(&format!("{}.", reserved)) {
            return format!("_{}", trimmed);
        }
    }

    trimmed.to_string()
}

/// `[<start>][<station>]<title>.<ext>`, with the start rendered in `tz`.
pub fn recording_filename(
    start: DateTime<Utc>,
    station: &str,
    title: &str,
    tz: Tz,
    extension: &str,
) -> String {
    format!(
        "[{}][{}]{}.{}",
        start.with_timezone(&tz).format(START_FORMAT),
        sanitize_filename(station),
        sanitize_filename(title),
        extension.trim_start_matches('.')
    )
}
