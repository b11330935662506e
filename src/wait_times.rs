// Joins the live status feed with the cached venue schedule

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::VenueConfig;
use crate::error::{ParkError, ParkResult};
use crate::schedule::{clean_entity_id, DayWindow, ScheduleType, VenueSchedule};
use crate::window::select_active;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttractionStatus {
    Operating,
    Closed,
    Down,
}

impl AttractionStatus {
    // Anything outside the known vocabulary is reported as closed
    pub fn from_upstream(status: Option<&str>) -> Self {
        match status {
            Some("Operating") => AttractionStatus::Operating,
            Some("Down") => AttractionStatus::Down,
            _ => AttractionStatus::Closed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttractionRecord {
    pub id: String,
    pub name: String,
    pub wait_time_minutes: u32,
    pub active: bool,
    pub status: AttractionStatus,
    pub fast_pass_available: bool,
    pub schedule: Option<DayWindow>,
}

// Upstream live entry; every field is optional so one bad entry cannot sink the whole feed
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveEntry {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub wait_time: Option<LiveStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStatus {
    pub posted_wait_minutes: Option<f64>,
    pub status: Option<String>,
    pub fast_pass: Option<FastPassStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FastPassStatus {
    pub available: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct LivePayload {
    entries: Vec<LiveEntry>,
}

pub fn parse_live_entries(venue_id: &str, payload: Value) -> ParkResult<Vec<LiveEntry>> {
    serde_json::from_value::<LivePayload>(payload)
        .map(|p| p.entries)
        .map_err(|e| ParkError::live_data(venue_id, format!("unusable live payload: {}", e)))
}

pub fn assemble(
    entries: &[LiveEntry],
    schedule: &VenueSchedule,
    venue: &VenueConfig,
    tz: Tz,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> Vec<AttractionRecord> {
    let mut records = Vec::with_capacity(entries.len());

    for entry in entries {
        let (Some(raw_id), Some(name)) = (entry.id.as_deref(), entry.name.as_deref()) else {
            debug!(venue_id = %venue.venue_id, "skipping live entry without id or name");
            continue;
        };
        if !entry
            .kind
            .as_deref()
            .map_or(false, |k| venue.is_attraction_type(k))
        {
            continue;
        }

        let id = clean_entity_id(raw_id);
        let live = entry.wait_time.clone().unwrap_or_default();
        let active = live.status.as_deref() == Some("Operating");

        let schedule = match schedule.windows(id) {
            Some(windows) => select_active(windows, now, today),
            // no published hours: open all day exactly when currently running
            None => {
                let kind = if active {
                    ScheduleType::Operating
                } else {
                    ScheduleType::Closed
                };
                DayWindow::full_day(tz, today, kind).map(DayWindow::without_date)
            }
        };

        records.push(AttractionRecord {
            id: id.to_string(),
            name: name.to_string(),
            wait_time_minutes: live
                .posted_wait_minutes
                .map_or(0, |m| m.max(0.0).round() as u32),
            active,
            status: AttractionStatus::from_upstream(live.status.as_deref()),
            fast_pass_available: live.fast_pass.and_then(|f| f.available).unwrap_or(false),
            schedule,
        });
    }

    records
}
