// src/timeline/clock.rs
//! Loose timestamp parsing and the UTC to local civil time conversion.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};

pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DEFAULT_LOCAL_OFFSET_HOURS: i32 = 3;

const NAIVE_DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

/// Parse the timestamp shapes seen in tracking histories and exports.
///
/// Values with an explicit offset (RFC 3339 / RFC 2822) are honoured; naive
/// values are taken as UTC; a bare date means midnight UTC. Returns `None`
/// for anything else.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let without_zulu = s.strip_suffix('Z').unwrap_or(s);
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(without_zulu, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
        }
    }
    None
}

/// Sort key for events: unparseable timestamps count as the epoch.
pub fn timestamp_or_epoch(raw: &str) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Converts UTC source timestamps to local civil time at a fixed offset.
///
/// There is no daylight-saving handling; swapping this type for a
/// zone-aware one does not affect callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTimeConverter {
    offset: FixedOffset,
}

impl Default for LocalTimeConverter {
    fn default() -> Self {
        Self::riyadh()
    }
}

impl LocalTimeConverter {
    /// Fixed UTC+3.
    pub fn riyadh() -> Self {
        Self::from_hours(DEFAULT_LOCAL_OFFSET_HOURS)
    }

    /// Out-of-range offsets (beyond +/-23h) fall back to UTC+3.
    pub fn from_hours(hours: i32) -> Self {
        let offset = FixedOffset::east_opt(hours * 3600)
            .or_else(|| FixedOffset::east_opt(DEFAULT_LOCAL_OFFSET_HOURS * 3600))
            .unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    pub fn offset_hours(&self) -> i32 {
        self.offset.local_minus_utc() / 3600
    }

    /// Render `raw` as local `YYYY-MM-DD HH:MM:SS`.
    ///
    /// Empty input gives an empty string; input that cannot be parsed is
    /// returned unchanged.
    pub fn convert(&self, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }
        match parse_timestamp(raw) {
            Some(dt) => dt.with_timezone(&self.offset).format(CANONICAL_FORMAT).to_string(),
            None => raw.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_common_shapes() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01T09:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T09:30:00.000Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 09:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T12:30:00+03:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 09:30"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-03-01").map(|d| d.hour()),
            Some(0)
        );
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_unparseable_sorts_as_epoch() {
        assert_eq!(timestamp_or_epoch("garbage"), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_convert_adds_three_hours() {
        let conv = LocalTimeConverter::riyadh();
        assert_eq!(conv.convert("2024-03-01T22:15:00Z"), "2024-03-02 01:15:00");
        assert_eq!(conv.convert("2024-03-01 09:00:00"), "2024-03-01 12:00:00");
        assert_eq!(conv.offset_hours(), 3);
    }

    #[test]
    fn test_convert_never_fails() {
        let conv = LocalTimeConverter::default();
        assert_eq!(conv.convert(""), "");
        assert_eq!(conv.convert("not a date"), "not a date");
    }

    #[test]
    fn test_custom_offset() {
        let conv = LocalTimeConverter::from_hours(0);
        assert_eq!(conv.convert("2024-03-01T09:00:00Z"), "2024-03-01 09:00:00");
        assert_eq!(LocalTimeConverter::from_hours(99).offset_hours(), 3);
    }
}
