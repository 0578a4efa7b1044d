//! Broadcast-time helpers. Both providers publish schedules in Japan time.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Asia::Tokyo;

use crate::StationError;

/// radiko schedule timestamps, e.g. `20240101050000`.
pub const RADIKO_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// NHK schedule timestamps, e.g. `2024-01-01 05:00:00`.
pub const RADIRU_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The hour at which a radiko broadcast day begins.
const RADIKO_DAY_START_HOUR: u32 = 5;

/// Parse a local Japan timestamp into UTC.
pub fn parse_jst(value: &str, format: &'static str) -> Result<DateTime<Utc>, StationError> {
    let invalid = || StationError::InvalidTime {
        value: value.to_string(),
        format,
    };

    let naive = NaiveDateTime::parse_from_str(value.trim(), format).map_err(|_| invalid())?;
    Tokyo
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(invalid)
}

/// Calendar date in Japan at `now`.
pub fn jst_date(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&Tokyo).date_naive()
}

/// The radiko broadcast day containing `now`.
///
/// radiko days run from 05:00 to 29:00 JST, so early-morning hours belong to
/// the previous calendar date.
pub fn radiko_broadcast_date(now: DateTime<Utc>) -> NaiveDate {
    let local = now.with_timezone(&Tokyo);
    if local.hour() < RADIKO_DAY_START_HOUR {
        (local - Duration::days(1)).date_naive()
    } else {
        local.date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_radiko_time() {
        let t = parse_jst("20240101050000", RADIKO_TIME_FORMAT).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2023, 12, 31, 20, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_radiru_time() {
        let t = parse_jst("2024-01-01 09:00:00", RADIRU_TIME_FORMAT).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_jst("yesterday", RADIKO_TIME_FORMAT),
            Err(StationError::InvalidTime { .. })
        ));
    }

    #[test]
    fn test_radiko_day_starts_at_five() {
        // 04:30 JST on Jan 2 belongs to the Jan 1 broadcast day.
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 19, 30, 0).unwrap();
        assert_eq!(
            radiko_broadcast_date(early),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert_eq!(jst_date(early), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());

        // 05:00 JST on Jan 2.
        let morning = Utc.with_ymd_and_hms(2024, 1, 1, 20, 0, 0).unwrap();
        assert_eq!(
            radiko_broadcast_date(morning),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
        );
    }
}
