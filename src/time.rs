use chrono::{DateTime, Duration, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> EngineResult<Self> {
        if end <= start {
            return Err(EngineError::InvalidTimeRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// The `hours` ending at `end`.
    pub fn trailing_hours(end: DateTime<Utc>, hours: i64) -> EngineResult<Self> {
        if hours <= 0 {
            return Err(EngineError::invalid_config(
                "window_hours",
                format!("must be positive, got {hours}"),
            ));
        }
        let start = Duration::try_hours(hours)
            .and_then(|span| end.checked_sub_signed(span))
            .ok_or_else(|| {
                EngineError::invalid_config("window_hours", format!("{hours} hours is out of range"))
            })?;
        Self::new(start, end)
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// Daily wall-clock interval, inclusive at both ends. A start after the end
/// wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OccupiedWindow {
    start: NaiveTime,
    end: NaiveTime,
    tz: Tz,
}

impl OccupiedWindow {
    pub fn new(start: NaiveTime, end: NaiveTime, tz: Tz) -> Self {
        Self { start, end, tz }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        let local = ts.with_timezone(&self.tz).time();
        if self.start <= self.end {
            local >= self.start && local <= self.end
        } else {
            local >= self.start || local <= self.end
        }
    }
}

pub fn parse_clock_time(field: &'static str, raw: &str) -> EngineResult<NaiveTime> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| EngineError::invalid_config(field, format!("expected HH:MM, got {raw:?}")))
}

pub fn parse_timezone(raw: &str) -> EngineResult<Tz> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Tz::UTC);
    }
    trimmed
        .parse::<Tz>()
        .map_err(|_| EngineError::invalid_config("comfort.timezone", format!("unknown timezone {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 24, h, m, 0)
            .single()
            .expect("valid utc")
    }

    #[test]
    fn rejects_inverted_range() {
        let err = TimeRange::new(utc(10, 0), utc(9, 0)).expect_err("inverted range");
        assert!(matches!(err, EngineError::InvalidTimeRange { .. }));
        assert!(TimeRange::new(utc(9, 0), utc(9, 0)).is_err());
    }

    #[test]
    fn trailing_hours_rejects_unrepresentable_windows() {
        let err = TimeRange::trailing_hours(utc(12, 0), i64::MAX / 1000).expect_err("too long");
        assert!(matches!(err, EngineError::InvalidConfig { .. }));
        assert!(TimeRange::trailing_hours(utc(12, 0), 24 * 365 * 400_000).is_err());
        let range = TimeRange::trailing_hours(utc(12, 0), 2).expect("two hours");
        assert_eq!(range.start, utc(10, 0));
        assert!(TimeRange::trailing_hours(utc(12, 0), 0).is_err());
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let window = OccupiedWindow::new(
            parse_clock_time("start", "07:00").expect("start"),
            parse_clock_time("end", "18:00").expect("end"),
            Tz::UTC,
        );
        assert!(window.contains(utc(7, 0)));
        assert!(window.contains(utc(18, 0)));
        assert!(!window.contains(utc(18, 1)));
        assert!(!window.contains(utc(6, 59)));
    }

    #[test]
    fn window_uses_local_clock() {
        let tz = parse_timezone("America/Denver").expect("tz");
        let window = OccupiedWindow::new(
            parse_clock_time("start", "07:00").expect("start"),
            parse_clock_time("end", "18:00").expect("end"),
            tz,
        );
        // 14:00 UTC is 07:00 MST in late November.
        assert!(window.contains(utc(14, 0)));
        assert!(!window.contains(utc(13, 59)));
    }

    #[test]
    fn overnight_window_wraps() {
        let window = OccupiedWindow::new(
            parse_clock_time("start", "22:00").expect("start"),
            parse_clock_time("end", "02:00").expect("end"),
            Tz::UTC,
        );
        assert!(window.contains(utc(23, 30)));
        assert!(window.contains(utc(1, 0)));
        assert!(!window.contains(utc(12, 0)));
    }

    #[test]
    fn clock_time_rejects_garbage() {
        assert!(parse_clock_time("start", "7am").is_err());
        assert!(parse_clock_time("start", "07:30:15").is_ok());
        assert!(parse_timezone("Mars/Olympus").is_err());
    }
}
