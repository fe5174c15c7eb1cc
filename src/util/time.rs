use anyhow::{bail, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};

/// `"12h"`, `"2d"`, `"1w"`: a span back from now.
fn parse_relative(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let unit = s.chars().last()?;
    let n = s[..s.len() - unit.len_utf8()].parse::<i64>().ok().filter(|n| *n > 0)?;
    let span = match unit {
        'h' => Duration::hours(n),
        'd' => Duration::days(n),
        'w' => Duration::weeks(n),
        _ => return None,
    };
    Some(now - span)
}

// Parse a window string like "2d", "YYYY-MM-DD", or RFC3339 into a UTC timestamp.
pub fn parse_window_str(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Some(ts) = parse_relative(s, now) {
        return Some(ts);
    }
    if let Ok(nd) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return nd.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

// Helper for Option<String> inputs used by CLI flags like --since
pub fn parse_since_opt(since: &Option<String>) -> Result<Option<DateTime<Utc>>> {
    let Some(s) = since.as_ref() else { return Ok(None) };
    match parse_window_str(s, Utc::now()) {
        Some(ts) => Ok(Some(ts)),
        None => bail!("cannot parse --since '{s}' (expected 12h, 2d, 1w, YYYY-MM-DD or RFC3339)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn relative_windows() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        assert_eq!(parse_window_str("2d", now), Some(Utc.with_ymd_and_hms(2025, 3, 8, 12, 0, 0).unwrap()));
        assert_eq!(parse_window_str("6h", now), Some(Utc.with_ymd_and_hms(2025, 3, 10, 6, 0, 0).unwrap()));
        assert_eq!(parse_window_str("1w", now), Some(Utc.with_ymd_and_hms(2025, 3, 3, 12, 0, 0).unwrap()));
        assert_eq!(parse_window_str("0d", now), None);
        assert_eq!(parse_window_str("3m", now), None);
    }

    #[test]
    fn absolute_dates() {
        let now = Utc::now();
        assert_eq!(parse_window_str("2025-01-31", now), Some(Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap()));
        assert_eq!(
            parse_window_str("2025-01-31T10:00:00+02:00", now),
            Some(Utc.with_ymd_and_hms(2025, 1, 31, 8, 0, 0).unwrap())
        );
    }

    #[test]
    fn since_flag_rejects_garbage() {
        assert!(parse_since_opt(&None).unwrap().is_none());
        assert!(parse_since_opt(&Some("yesterday".into())).is_err());
        assert!(parse_since_opt(&Some("1d".into())).unwrap().is_some());
    }
}
