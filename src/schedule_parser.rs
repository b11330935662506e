// Turns the operator's multi-day schedule payload into per-attraction, per-date windows

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ParkError, ParkResult};
use crate::schedule::{
    clean_entity_id, date_range, localize, DayWindow, ScheduleType, SpecialWindow,
};

const STANDARD_TYPES: [&str; 3] = ["Operating", "Closed", "Refurbishment"];

#[derive(Debug, Deserialize)]
struct RawSchedulePayload {
    activities: Vec<RawActivity>,
}

#[derive(Debug, Deserialize)]
struct RawActivity {
    id: String,
    #[serde(default)]
    schedule: Option<RawActivitySchedule>,
}

#[derive(Debug, Default, Deserialize)]
struct RawActivitySchedule {
    #[serde(default)]
    schedules: Vec<RawScheduleEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScheduleEntry {
    date: String,
    start_time: String,
    end_time: String,
    #[serde(rename = "type")]
    kind: String,
}

// Dates are inclusive on both ends
#[derive(Debug, Clone, Copy)]
pub struct ScheduleRange {
    pub tz: Tz,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ScheduleRange {
    fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

pub fn parse_schedule(
    venue_id: &str,
    payload: Value,
    range: ScheduleRange,
) -> ParkResult<HashMap<String, Vec<DayWindow>>> {
    let payload: RawSchedulePayload = serde_json::from_value(payload)
        .map_err(|e| ParkError::schedule_parse(venue_id, e.to_string()))?;

    let mut by_date: HashMap<String, BTreeMap<NaiveDate, DayWindow>> = HashMap::new();

    for activity in payload.activities {
        let id = clean_entity_id(&activity.id).to_string();
        if id.is_empty() {
            continue;
        }
        let entries = activity.schedule.unwrap_or_default().schedules;
        let days = by_date.entry(id.clone()).or_default();

        let mut special = vec![];
        for entry in entries {
            let date = parse_date(venue_id, &entry.date)?;
            if !range.contains(date) {
                continue;
            }

            if STANDARD_TYPES.contains(&entry.kind.as_str()) {
                let (opening_time, closing_time) = build_window(venue_id, range.tz, date, &entry)?;
                days.insert(
                    date,
                    DayWindow {
                        date: Some(date),
                        opening_time,
                        closing_time,
                        kind: ScheduleType::from_upstream(&entry.kind),
                        special: vec![],
                    },
                );
            } else {
                special.push((date, entry));
            }
        }

        // standard windows are all in place before specials attach to them
        for (date, entry) in special {
            match days.get_mut(&date) {
                Some(day) => {
                    let (opening_time, closing_time) =
                        build_window(venue_id, range.tz, date, &entry)?;
                    day.special.push(SpecialWindow {
                        kind: entry.kind,
                        opening_time,
                        closing_time,
                    });
                }
                None => debug!(
                    venue_id,
                    attraction_id = %id,
                    %date,
                    kind = %entry.kind,
                    "dropping special window with no standard window on that date"
                ),
            }
        }
    }

    let mut by_attraction = HashMap::with_capacity(by_date.len());
    for (id, mut days) in by_date {
        for date in date_range(range.start_date, range.end_date) {
            if days.contains_key(&date) {
                continue;
            }
            let closed = DayWindow::full_day(range.tz, date, ScheduleType::Closed).ok_or_else(
                || ParkError::schedule_parse(venue_id, format!("cannot place {} in venue zone", date)),
            )?;
            days.insert(date, closed);
        }
        by_attraction.insert(id, days.into_values().collect());
    }

    Ok(by_attraction)
}

fn parse_date(venue_id: &str, raw: &str) -> ParkResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| ParkError::schedule_parse(venue_id, format!("bad date {:?}: {}", raw, e)))
}

// "HH:MM[:SS]" with hours allowed past 23 ("26:00" is 02:00 the next day), up to 47.
// Returns the whole days carried and the remaining time of day.
const MAX_CLOCK_HOURS: u32 = 48;

fn parse_clock(raw: &str) -> Option<(i64, NaiveTime)> {
    let mut parts = raw.trim().split(':');
    let hours: u32 = parts.next()?.parse().ok()?;
    let minutes: u32 = parts.next()?.parse().ok()?;
    let seconds: u32 = match parts.next() {
        Some(s) => s.split('.').next()?.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() || hours >= MAX_CLOCK_HOURS {
        return None;
    }

    let time = NaiveTime::from_hms_opt(hours % 24, minutes, seconds)?;
    Some((i64::from(hours / 24), time))
}

fn local_instant(
    venue_id: &str,
    tz: Tz,
    date: NaiveDate,
    raw: &str,
) -> ParkResult<DateTime<FixedOffset>> {
    let (carry, time) = parse_clock(raw)
        .ok_or_else(|| ParkError::schedule_parse(venue_id, format!("bad time {:?}", raw)))?;
    let naive = date
        .checked_add_signed(Duration::days(carry))
        .ok_or_else(|| ParkError::schedule_parse(venue_id, format!("{} {} is out of range", date, raw)))?
        .and_time(time);
    localize(tz, naive).ok_or_else(|| {
        ParkError::schedule_parse(venue_id, format!("{} {} has no local instant", date, raw))
    })
}

// Closing before opening on the same nominal date means the window runs past midnight
fn build_window(
    venue_id: &str,
    tz: Tz,
    date: NaiveDate,
    entry: &RawScheduleEntry,
) -> ParkResult<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
    let opening = local_instant(venue_id, tz, date, &entry.start_time)?;
    let mut closing = local_instant(venue_id, tz, date, &entry.end_time)?;
    if closing < opening {
        let next_day = date.succ_opt().ok_or_else(|| {
            ParkError::schedule_parse(venue_id, format!("{} has no following day", date))
        })?;
        closing = local_instant(venue_id, tz, next_day, &entry.end_time)?;
    }
    Ok((opening, closing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn range() -> ScheduleRange {
        ScheduleRange {
            tz: New_York,
            start_date: date(2026, 10, 17),
            end_date: date(2026, 10, 20),
        }
    }

    fn entry(date: &str, start: &str, end: &str, kind: &str) -> Value {
        json!({"date": date, "startTime": start, "endTime": end, "type": kind})
    }

    #[test]
    fn test_gap_free_coverage() {
        let payload = json!({
            "activities": [
                {
                    "id": "80010190;entityType=Attraction",
                    "schedule": {"schedules": [
                        entry("2026-10-17", "09:00:00", "22:00:00", "Operating"),
                        entry("2026-10-19", "09:00:00", "21:00:00", "Operating"),
                    ]}
                },
                {"id": "80010208;entityType=Attraction"}
            ]
        });

        let parsed = parse_schedule("mk", payload, range()).unwrap();
        assert_eq!(parsed.len(), 2);

        for windows in parsed.values() {
            let dates: Vec<_> = windows.iter().map(|w| w.date.unwrap()).collect();
            assert_eq!(
                dates,
                vec![
                    date(2026, 10, 17),
                    date(2026, 10, 18),
                    date(2026, 10, 19),
                    date(2026, 10, 20)
                ]
            );
        }

        let space_mountain = &parsed["80010190"];
        assert_eq!(space_mountain[0].kind, ScheduleType::Operating);
        assert_eq!(space_mountain[1].kind, ScheduleType::Closed);
        assert_eq!(
            space_mountain[1].opening_time.to_rfc3339(),
            "2026-10-18T00:00:00-04:00"
        );
        assert_eq!(
            space_mountain[1].closing_time.to_rfc3339(),
            "2026-10-18T23:59:59-04:00"
        );
        assert!(parsed["80010208"]
            .iter()
            .all(|w| w.kind == ScheduleType::Closed));
    }

    #[test]
    fn test_overnight_window_closes_next_day() {
        let payload = json!({
            "activities": [{
                "id": "80010190",
                "schedule": {"schedules": [entry("2026-10-17", "22:00", "02:00", "Operating")]}
            }]
        });

        let parsed = parse_schedule("mk", payload, range()).unwrap();
        let window = &parsed["80010190"][0];
        assert_eq!(window.opening_time.to_rfc3339(), "2026-10-17T22:00:00-04:00");
        assert_eq!(window.closing_time.to_rfc3339(), "2026-10-18T02:00:00-04:00");
        assert!(window.closing_time > window.opening_time);
    }

    #[test]
    fn test_hours_past_midnight_notation() {
        let payload = json!({
            "activities": [{
                "id": "80010190",
                "schedule": {"schedules": [entry("2026-10-17", "20:00", "26:00", "Operating")]}
            }]
        });

        let parsed = parse_schedule("mk", payload, range()).unwrap();
        assert_eq!(
            parsed["80010190"][0].closing_time.to_rfc3339(),
            "2026-10-18T02:00:00-04:00"
        );
    }

    #[test]
    fn test_refurbishment_and_out_of_range_entries() {
        let payload = json!({
            "activities": [{
                "id": "80010190",
                "schedule": {"schedules": [
                    entry("2026-10-16", "09:00", "22:00", "Operating"),
                    entry("2026-10-17", "09:00", "22:00", "Refurbishment"),
                    entry("2026-10-25", "09:00", "22:00", "Operating"),
                ]}
            }]
        });

        let parsed = parse_schedule("mk", payload, range()).unwrap();
        let windows = &parsed["80010190"];
        assert_eq!(windows.len(), 4);
        assert_eq!(windows[0].date, Some(date(2026, 10, 17)));
        assert_eq!(windows[0].kind, ScheduleType::Closed);
        // refurbishment keeps its published times
        assert_eq!(windows[0].opening_time.to_rfc3339(), "2026-10-17T09:00:00-04:00");
    }

    #[test]
    fn test_special_windows_attach_to_their_day() {
        let payload = json!({
            "activities": [{
                "id": "80010190",
                "schedule": {"schedules": [
                    // listed before its standard window on purpose
                    entry("2026-10-17", "08:00", "09:00", "Extra Magic Hours"),
                    entry("2026-10-17", "09:00", "22:00", "Operating"),
                    entry("2026-10-18", "22:00", "23:59", "Special Ticketed Event"),
                ]}
            }]
        });

        let parsed = parse_schedule("mk", payload, range()).unwrap();
        let windows = &parsed["80010190"];

        assert_eq!(windows[0].special.len(), 1);
        assert_eq!(windows[0].special[0].kind, "Extra Magic Hours");
        assert_eq!(
            windows[0].special[0].opening_time.to_rfc3339(),
            "2026-10-17T08:00:00-04:00"
        );
        // no standard window on the 18th, so the special entry is dropped
        assert_eq!(windows[1].kind, ScheduleType::Closed);
        assert!(windows[1].special.is_empty());
    }

    #[test]
    fn test_missing_activities_is_parse_error() {
        let err = parse_schedule("mk", json!({"data": []}), range()).unwrap_err();
        match err {
            ParkError::ScheduleParse { venue_id, message } => {
                assert_eq!(venue_id, "mk");
                assert!(message.contains("activities"), "{message}");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_time_is_parse_error() {
        let payload = json!({
            "activities": [{
                "id": "80010190",
                "schedule": {"schedules": [entry("2026-10-17", "nine", "22:00", "Operating")]}
            }]
        });
        assert!(matches!(
            parse_schedule("mk", payload, range()),
            Err(ParkError::ScheduleParse { .. })
        ));
    }

    #[test]
    fn test_out_of_range_hours_are_parse_errors() {
        for end in ["4294967295:00", "48:00", "99:30:00"] {
            let payload = json!({
                "activities": [{
                    "id": "80010190",
                    "schedule": {"schedules": [entry("2026-10-17", "09:00", end, "Operating")]}
                }]
            });
            assert!(
                matches!(
                    parse_schedule("mk", payload, range()),
                    Err(ParkError::ScheduleParse { .. })
                ),
                "{end}"
            );
        }
    }

    #[test]
    fn test_unattached_special_is_dropped_before_its_times_are_read() {
        let payload = json!({
            "activities": [{
                "id": "80010190",
                "schedule": {"schedules": [
                    entry("2026-10-17", "09:00", "22:00", "Operating"),
                    entry("2026-10-19", "late", "???", "Extra Magic Hours")
                ]}
            }]
        });
        let parsed = parse_schedule("mk", payload, range()).unwrap();
        let windows = &parsed["80010190"];
        assert_eq!(windows.len(), 4);
        assert!(windows.iter().all(|w| w.special.is_empty()));
    }

    #[test]
    fn test_parse_clock() {
        assert_eq!(
            parse_clock("09:30"),
            Some((0, NaiveTime::from_hms_opt(9, 30, 0).unwrap()))
        );
        assert_eq!(
            parse_clock("25:15:30"),
            Some((1, NaiveTime::from_hms_opt(1, 15, 30).unwrap()))
        );
        assert_eq!(parse_clock("9"), None);
        assert_eq!(parse_clock("09:61"), None);
        assert_eq!(
            parse_clock("47:59"),
            Some((1, NaiveTime::from_hms_opt(23, 59, 0).unwrap()))
        );
        assert_eq!(parse_clock("48:00"), None);
    }
}
