use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// Hour of the "morning" time-of-day a due date defaults to when the user
/// gives only a day.
pub const MORNING_HOUR: u32 = 8;

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Midnight at the start of `date`.
pub fn midnight_of(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Midnight at the start of the day after `date`.
pub fn next_midnight(date: NaiveDate) -> NaiveDateTime {
    midnight_of(date + Duration::days(1))
}

/// 08:00 on `date`.
pub fn morning_of(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(MORNING_HOUR, 0, 0).unwrap_or_else(|| midnight_of(date))
}

/// The `[due_min, due_max)` range used to filter remote task listings.
/// `min = None` means unbounded (fetch regardless of due date).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueWindow {
    pub min: Option<NaiveDateTime>,
    pub max: NaiveDateTime,
}

impl DueWindow {
    /// Window from midnight of `since` through tomorrow midnight.
    pub fn since_day(since: NaiveDate, today: NaiveDate) -> Self {
        Self {
            min: Some(midnight_of(since)),
            max: next_midnight(today),
        }
    }

    /// Unbounded lower edge, used when re-fetching all history.
    pub fn unbounded(today: NaiveDate) -> Self {
        Self {
            min: None,
            max: next_midnight(today),
        }
    }

    /// Trailing window of `days` days ending tomorrow midnight.
    pub fn trailing_days(days: i64, today: NaiveDate) -> Self {
        Self {
            min: Some(midnight_of(today - Duration::days(days))),
            max: next_midnight(today),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn midnight_and_morning() {
        let d = day(2026, 8, 6);
        assert_eq!(midnight_of(d).to_string(), "2026-08-06 00:00:00");
        assert_eq!(morning_of(d).to_string(), "2026-08-06 08:00:00");
        assert_eq!(next_midnight(d).to_string(), "2026-08-07 00:00:00");
    }

    #[test]
    fn window_since_day_spans_to_tomorrow() {
        let w = DueWindow::since_day(day(2026, 8, 4), day(2026, 8, 6));
        assert_eq!(w.min, Some(midnight_of(day(2026, 8, 4))));
        assert_eq!(w.max, midnight_of(day(2026, 8, 7)));
    }

    #[test]
    fn trailing_window_reaches_back() {
        let w = DueWindow::trailing_days(14, day(2026, 8, 6));
        assert_eq!(w.min, Some(midnight_of(day(2026, 7, 23))));
        assert_eq!(w.max, midnight_of(day(2026, 8, 7)));
    }
}
