// Operating-window types shared by the parser, the store and the wait-time assembler

use std::collections::HashMap;

use chrono::{
    DateTime, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Utc,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::config::VenueConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScheduleType {
    Operating,
    Closed,
}

impl ScheduleType {
    // Only "Operating" survives; Refurbishment and anything else reads as closed
    pub fn from_upstream(kind: &str) -> Self {
        if kind == "Operating" {
            ScheduleType::Operating
        } else {
            ScheduleType::Closed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialWindow {
    #[serde(rename = "type")]
    pub kind: String,
    pub opening_time: DateTime<FixedOffset>,
    pub closing_time: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayWindow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub opening_time: DateTime<FixedOffset>,
    pub closing_time: DateTime<FixedOffset>,
    #[serde(rename = "type")]
    pub kind: ScheduleType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub special: Vec<SpecialWindow>,
}

impl DayWindow {
    // Half-open: the closing instant itself is outside the window
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let opening = self.opening_time.with_timezone(&Utc);
        let closing = self.closing_time.with_timezone(&Utc);
        opening <= now && now < closing
    }

    // A window describing "now" carries no calendar date
    pub fn without_date(mut self) -> Self {
        self.date = None;
        self
    }

    // 00:00:00 to 23:59:59 local on `date`
    pub fn full_day(tz: Tz, date: NaiveDate, kind: ScheduleType) -> Option<Self> {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59)?;
        let opening = localize(tz, date.and_time(NaiveTime::MIN))?;
        let closing = localize(tz, date.and_time(end_of_day))?;

        Some(Self {
            date: Some(date),
            opening_time: opening,
            closing_time: closing,
            kind,
            special: vec![],
        })
    }

    pub fn format(&self, venue: &VenueConfig) -> FormattedWindow {
        let time_format = venue.display_time_format.as_str();
        FormattedWindow {
            date: self
                .date
                .map(|d| d.format(&venue.date_format).to_string()),
            opening_time: self.opening_time.format(time_format).to_string(),
            closing_time: self.closing_time.format(time_format).to_string(),
            kind: self.kind,
            special: self
                .special
                .iter()
                .map(|s| FormattedSpecialWindow {
                    kind: s.kind.clone(),
                    opening_time: s.opening_time.format(time_format).to_string(),
                    closing_time: s.closing_time.format(time_format).to_string(),
                })
                .collect(),
        }
    }
}

// String rendering of a DayWindow in the venue's display formats.
// Queries return DayWindow (RFC 3339 when serialized); `ParkClient::list_schedule_formatted` renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedWindow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub opening_time: String,
    pub closing_time: String,
    #[serde(rename = "type")]
    pub kind: ScheduleType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub special: Vec<FormattedSpecialWindow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedSpecialWindow {
    #[serde(rename = "type")]
    pub kind: String,
    pub opening_time: String,
    pub closing_time: String,
}

// One venue's calendar. Never mutated after construction; the store swaps whole snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct VenueSchedule {
    pub venue_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub expires_at: DateTime<Utc>,
    pub by_attraction: HashMap<String, Vec<DayWindow>>,
}

impl VenueSchedule {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn windows(&self, attraction_id: &str) -> Option<&[DayWindow]> {
        self.by_attraction
            .get(clean_entity_id(attraction_id))
            .map(|w| w.as_slice())
    }
}

// "80010190;entityType=Attraction" -> "80010190"
pub fn clean_entity_id(raw: &str) -> &str {
    raw.split(';').next().unwrap_or(raw).trim()
}

// Every date in [start, end], inclusive
pub fn date_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

// Fully closed calendar used when a venue or attraction has no published hours
pub fn closed_calendar(tz: Tz, start: NaiveDate, end: NaiveDate) -> Vec<DayWindow> {
    date_range(start, end)
        .filter_map(|date| DayWindow::full_day(tz, date, ScheduleType::Closed))
        .collect()
}

// Resolves a local wall-clock time in the venue zone. Ambiguous times (DST fall-back) take the
// earlier instant; times inside a spring-forward gap are pushed past the gap.
pub fn localize(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
    let resolved = match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => tz.from_local_datetime(&(naive + Duration::hours(1))).earliest()?,
    };
    Some(resolved.fixed_offset())
}

// Local calendar date of `now` in the venue zone
pub fn local_date(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_clean_entity_id() {
        assert_eq!(clean_entity_id("80010190;entityType=Attraction"), "80010190");
        assert_eq!(clean_entity_id("80010190"), "80010190");
        assert_eq!(clean_entity_id(""), "");
    }

    #[test]
    fn test_refurbishment_reads_as_closed() {
        assert_eq!(ScheduleType::from_upstream("Operating"), ScheduleType::Operating);
        assert_eq!(ScheduleType::from_upstream("Refurbishment"), ScheduleType::Closed);
        assert_eq!(ScheduleType::from_upstream("Closed"), ScheduleType::Closed);
    }

    #[test]
    fn test_full_day_window_in_venue_zone() {
        let window = DayWindow::full_day(New_York, date(2026, 10, 17), ScheduleType::Closed).unwrap();
        assert_eq!(window.opening_time.to_rfc3339(), "2026-10-17T00:00:00-04:00");
        assert_eq!(window.closing_time.to_rfc3339(), "2026-10-17T23:59:59-04:00");
        assert_eq!(window.date, Some(date(2026, 10, 17)));
    }

    #[test]
    fn test_contains_is_half_open() {
        let window = DayWindow::full_day(New_York, date(2026, 10, 17), ScheduleType::Operating).unwrap();
        let opening = window.opening_time.with_timezone(&Utc);
        let closing = window.closing_time.with_timezone(&Utc);

        assert!(window.contains(opening));
        assert!(window.contains(closing - Duration::seconds(1)));
        assert!(!window.contains(closing));
        assert!(!window.contains(opening - Duration::seconds(1)));
    }

    #[test]
    fn test_localize_handles_dst_transitions() {
        // 2026-03-08 02:30 does not exist in New York
        let gap = date(2026, 3, 8).and_hms_opt(2, 30, 0).unwrap();
        assert_eq!(
            localize(New_York, gap).unwrap().to_rfc3339(),
            "2026-03-08T03:30:00-04:00"
        );

        // 2026-11-01 01:30 happens twice; the earlier one is EDT
        let ambiguous = date(2026, 11, 1).and_hms_opt(1, 30, 0).unwrap();
        assert_eq!(
            localize(New_York, ambiguous).unwrap().to_rfc3339(),
            "2026-11-01T01:30:00-04:00"
        );
    }

    #[test]
    fn test_closed_calendar_covers_range() {
        let calendar = closed_calendar(New_York, date(2026, 10, 30), date(2026, 11, 2));
        let dates: Vec<_> = calendar.iter().filter_map(|w| w.date).collect();
        assert_eq!(
            dates,
            vec![
                date(2026, 10, 30),
                date(2026, 10, 31),
                date(2026, 11, 1),
                date(2026, 11, 2)
            ]
        );
        assert!(calendar.iter().all(|w| w.kind == ScheduleType::Closed));
    }

    #[test]
    fn test_format_uses_venue_formats() {
        let mut venue = VenueConfig::new("mk", "80007944", "80007798", "us", "America/New_York");
        venue.display_time_format = "%H:%M".to_string();
        venue.date_format = "%d/%m/%Y".to_string();

        let formatted = DayWindow::full_day(New_York, date(2026, 10, 17), ScheduleType::Closed)
            .unwrap()
            .format(&venue);
        assert_eq!(formatted.date.as_deref(), Some("17/10/2026"));
        assert_eq!(formatted.opening_time, "00:00");
        assert_eq!(formatted.closing_time, "23:59");

        let json = serde_json::to_value(&formatted).unwrap();
        assert_eq!(json["type"], "Closed");
        assert_eq!(json["openingTime"], "00:00");
        assert!(json.get("special").is_none());
    }

    #[test]
    fn test_windows_lookup_cleans_id() {
        let window = DayWindow::full_day(New_York, date(2026, 10, 17), ScheduleType::Closed).unwrap();
        let schedule = VenueSchedule {
            venue_id: "mk".to_string(),
            start_date: date(2026, 10, 17),
            end_date: date(2026, 10, 17),
            expires_at: Utc::now(),
            by_attraction: HashMap::from([("80010190".to_string(), vec![window])]),
        };

        assert_eq!(
            schedule
                .windows("80010190;entityType=Attraction")
                .map(|w| w.len()),
            Some(1)
        );
        assert!(schedule.windows("123").is_none());
    }
}
