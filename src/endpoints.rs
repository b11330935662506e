// Builds the upstream requests for a venue.
// Operators with a different URL layout supply their own Endpoints at client construction.

use chrono::NaiveDate;

use crate::config::{ClientConfig, VenueConfig};
use crate::transport::HttpRequest;

pub trait Endpoints: Send + Sync + 'static {
    fn token_request(&self) -> HttpRequest;

    fn schedule_request(&self, venue: &VenueConfig, start: NaiveDate, end: NaiveDate)
        -> HttpRequest;

    fn wait_times_request(&self, venue: &VenueConfig) -> HttpRequest;
}

#[derive(Debug, Clone)]
pub struct DefaultEndpoints {
    api_base_url: String,
    auth_url: String,
    client_id: String,
}

impl DefaultEndpoints {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_url: config.auth_url.clone(),
            client_id: config.client_id.clone(),
        }
    }
}

impl Endpoints for DefaultEndpoints {
    fn token_request(&self) -> HttpRequest {
        HttpRequest::post_form(
            self.auth_url.clone(),
            vec![
                ("grant_type".to_string(), "assertion".to_string()),
                ("assertion_type".to_string(), "public".to_string()),
                ("client_id".to_string(), self.client_id.clone()),
            ],
        )
    }

    fn schedule_request(
        &self,
        venue: &VenueConfig,
        start: NaiveDate,
        end: NaiveDate,
    ) -> HttpRequest {
        HttpRequest::get(format!(
            "{}/mobile-service/public/ancestor-activities-schedules/{};entityType=destination",
            self.api_base_url, venue.resort_id
        ))
        .with_query("filters", "theme-park,Attraction")
        .with_query("startDate", start.format(&venue.date_format).to_string())
        .with_query("endDate", end.format(&venue.date_format).to_string())
        .with_query("region", venue.region.clone())
    }

    fn wait_times_request(&self, venue: &VenueConfig) -> HttpRequest {
        HttpRequest::get(format!(
            "{}/facility-service/theme-parks/{};destination={}/wait-times",
            self.api_base_url, venue.attraction_api_id, venue.resort_id
        ))
        .with_query("region", venue.region.clone())
    }
}
