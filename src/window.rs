// Picks the operating window to report for an attraction at a given instant

use chrono::{DateTime, NaiveDate, Utc};

use crate::schedule::DayWindow;

// Precedence: a window that contains `now` (so a park still running past midnight reports
// yesterday's window), then the window dated `today`, then the first window.
// The result never carries a date.
pub fn select_active(
    windows: &[DayWindow],
    now: DateTime<Utc>,
    today: NaiveDate,
) -> Option<DayWindow> {
    let mut todays_window = None;

    for window in windows {
        if window.contains(now) {
            return Some(window.clone().without_date());
        }
        if todays_window.is_none() && window.date == Some(today) {
            todays_window = Some(window);
        }
    }

    todays_window
        .or_else(|| windows.first())
        .map(|w| w.clone().without_date())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{localize, ScheduleType};
    use chrono::{Duration, NaiveTime};
    use chrono_tz::America::New_York;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn window(day: NaiveDate, open_h: u32, close_h: u32) -> DayWindow {
        let at = |d: NaiveDate, h: u32| {
            localize(New_York, d.and_time(NaiveTime::from_hms_opt(h, 0, 0).unwrap())).unwrap()
        };
        let opening_time = at(day, open_h);
        let closing_time = if close_h >= 24 {
            at(day + Duration::days(1), close_h - 24)
        } else {
            at(day, close_h)
        };
        DayWindow {
            date: Some(day),
            opening_time,
            closing_time,
            kind: ScheduleType::Operating,
            special: vec![],
        }
    }

    fn local(day: NaiveDate, h: u32) -> DateTime<Utc> {
        localize(New_York, day.and_time(NaiveTime::from_hms_opt(h, 0, 0).unwrap()))
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_spillover_beats_todays_window() {
        let yesterday = window(date(16), 20, 26);
        let today = window(date(17), 9, 18);
        let windows = vec![yesterday.clone(), today];

        let selected = select_active(&windows, local(date(17), 1), date(17)).unwrap();
        assert_eq!(selected.opening_time, yesterday.opening_time);
        assert_eq!(selected.closing_time, yesterday.closing_time);
        assert_eq!(selected.date, None);
    }

    #[test]
    fn test_todays_window_when_nothing_is_open() {
        let windows = vec![window(date(16), 9, 18), window(date(17), 9, 18), window(date(18), 9, 18)];

        // before opening
        let selected = select_active(&windows, local(date(17), 7), date(17)).unwrap();
        assert_eq!(selected.opening_time, windows[1].opening_time);

        // during opening hours the containing window is today's anyway
        let selected = select_active(&windows, local(date(17), 12), date(17)).unwrap();
        assert_eq!(selected.opening_time, windows[1].opening_time);
    }

    #[test]
    fn test_falls_back_to_first_window() {
        let windows = vec![window(date(20), 9, 18), window(date(21), 9, 18)];
        let selected = select_active(&windows, local(date(17), 12), date(17)).unwrap();
        assert_eq!(selected.opening_time, windows[0].opening_time);
        assert!(selected.date.is_none());
    }

    #[test]
    fn test_no_windows() {
        assert!(select_active(&[], local(date(17), 12), date(17)).is_none());
    }

    #[test]
    fn test_closing_instant_is_excluded() {
        let windows = vec![window(date(16), 20, 26), window(date(17), 2, 18)];
        // 02:00 is yesterday's closing instant and today's opening instant
        let selected = select_active(&windows, local(date(17), 2), date(17)).unwrap();
        assert_eq!(selected.opening_time, windows[1].opening_time);
    }
}
