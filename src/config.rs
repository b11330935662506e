// Client and per-venue configuration

use chrono::format::{Item, StrftimeItems};
use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{ParkError, ParkResult};

pub const MAX_DAYS_AHEAD: u32 = 366;
pub const MAX_SCHEDULE_TTL_HOURS: i64 = 24 * 7;

// Per-venue settings. Ids are the operator's numeric entity ids without any `;` suffix.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VenueConfig {
    pub venue_id: String,
    // entity id of the park itself; used for the wait-time URL and the park's own opening hours
    pub attraction_api_id: String,
    // entity id of the destination the park belongs to; schedules are requested per destination
    pub resort_id: String,
    pub region: String,
    pub time_zone: String,
    #[serde(default = "default_display_time_format")]
    pub display_time_format: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default = "default_max_days_ahead")]
    pub max_days_ahead: u32,
    #[serde(default = "default_attraction_types")]
    pub attraction_types: Vec<String>,
}

fn default_display_time_format() -> String {
    "%Y-%m-%dT%H:%M:%S%:z".to_string()
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_max_days_ahead() -> u32 {
    30
}

fn default_attraction_types() -> Vec<String> {
    vec!["Attraction".to_string()]
}

impl VenueConfig {
    pub fn new(
        venue_id: &str,
        attraction_api_id: &str,
        resort_id: &str,
        region: &str,
        time_zone: &str,
    ) -> Self {
        Self {
            venue_id: venue_id.to_string(),
            attraction_api_id: attraction_api_id.to_string(),
            resort_id: resort_id.to_string(),
            region: region.to_string(),
            time_zone: time_zone.to_string(),
            display_time_format: default_display_time_format(),
            date_format: default_date_format(),
            max_days_ahead: default_max_days_ahead(),
            attraction_types: default_attraction_types(),
        }
    }

    pub fn with_max_days_ahead(mut self, max_days_ahead: u32) -> Self {
        self.max_days_ahead = max_days_ahead;
        self
    }

    pub fn tz(&self) -> ParkResult<Tz> {
        self.time_zone.parse::<Tz>().map_err(|e| {
            ParkError::Configuration(format!(
                "venue {} has unknown time zone {:?}: {}",
                self.venue_id, self.time_zone, e
            ))
        })
    }

    // Last date of the schedule horizon starting at `today`, inclusive
    pub fn horizon_end(&self, today: NaiveDate) -> NaiveDate {
        today + Duration::days(i64::from(self.max_days_ahead.min(MAX_DAYS_AHEAD)))
    }

    pub fn is_attraction_type(&self, kind: &str) -> bool {
        self.attraction_types.iter().any(|t| t == kind)
    }

    // Checks everything a query needs up front and returns the parsed time zone
    pub fn validate(&self) -> ParkResult<Tz> {
        let required = [
            ("venue_id", &self.venue_id),
            ("attraction_api_id", &self.attraction_api_id),
            ("resort_id", &self.resort_id),
            ("region", &self.region),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ParkError::Configuration(format!(
                    "venue {:?} is missing required field {}",
                    self.venue_id, name
                )));
            }
        }

        if self.max_days_ahead > MAX_DAYS_AHEAD {
            return Err(ParkError::Configuration(format!(
                "venue {} max_days_ahead must be at most {}, got {}",
                self.venue_id, MAX_DAYS_AHEAD, self.max_days_ahead
            )));
        }

        for (name, format) in [
            ("display_time_format", &self.display_time_format),
            ("date_format", &self.date_format),
        ] {
            if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                return Err(ParkError::Configuration(format!(
                    "venue {} has invalid {}: {:?}",
                    self.venue_id, name, format
                )));
            }
        }

        self.tz()
    }
}

// Client-wide settings. Every field has a default so a config file only needs `venues`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub auth_url: String,
    pub client_id: String,
    pub app_id: String,
    pub schedule_ttl_hours: i64,
    pub request_timeout_ms: u64,
    pub venues: Vec<VenueConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.wdpro.disney.go.com".to_string(),
            auth_url: "https://authorization.go.com/token".to_string(),
            client_id: "WDPRO-MOBILE.MDX.WDW.ANDROID-PROD".to_string(),
            app_id: "WDW-MDX-ANDROID-3.4.1".to_string(),
            schedule_ttl_hours: 12,
            request_timeout_ms: 10_000,
            venues: vec![],
        }
    }
}

impl ClientConfig {
    pub fn from_json_str(raw: &str) -> ParkResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| ParkError::Configuration(format!("invalid client config: {}", e)))
    }

    pub fn with_venue(mut self, venue: VenueConfig) -> Self {
        self.venues.push(venue);
        self
    }

    pub fn venue(&self, venue_id: &str) -> ParkResult<&VenueConfig> {
        self.venues
            .iter()
            .find(|v| v.venue_id == venue_id)
            .ok_or_else(|| ParkError::Configuration(format!("unknown venue {:?}", venue_id)))
    }

    pub fn schedule_ttl(&self) -> ParkResult<Duration> {
        if !(1..=MAX_SCHEDULE_TTL_HOURS).contains(&self.schedule_ttl_hours) {
            return Err(ParkError::Configuration(format!(
                "schedule_ttl_hours must be between 1 and {}, got {}",
                MAX_SCHEDULE_TTL_HOURS, self.schedule_ttl_hours
            )));
        }
        Ok(Duration::hours(self.schedule_ttl_hours))
    }

    pub fn validate(&self) -> ParkResult<()> {
        if self.auth_url.trim().is_empty() || self.client_id.trim().is_empty() {
            return Err(ParkError::Configuration(
                "auth_url and client_id are required".to_string(),
            ));
        }
        self.schedule_ttl()?;
        for venue in &self.venues {
            venue.validate()?;
        }
        Ok(())
    }
}
