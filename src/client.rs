// Park client: the query surface over the credential cache, schedule store and assembler

use std::{collections::HashMap, sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures::future::join_all;
use tracing::{debug, info};

use crate::config::{ClientConfig, VenueConfig};
use crate::credential::CredentialCache;
use crate::endpoints::{DefaultEndpoints, Endpoints};
use crate::error::{ParkError, ParkResult, TransportError};
use crate::schedule::{closed_calendar, local_date, DayWindow, FormattedWindow, VenueSchedule};
use crate::schedule_parser::{parse_schedule, ScheduleRange};
use crate::schedule_store::ScheduleStore;
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use crate::wait_times::{assemble, parse_live_entries, AttractionRecord};

struct Venue {
    config: VenueConfig,
    tz: Tz,
}

pub struct ParkClient {
    venues: HashMap<String, Venue>,
    venue_order: Vec<String>,
    transport: Arc<dyn Transport>,
    endpoints: Arc<dyn Endpoints>,
    credentials: Arc<CredentialCache>,
    schedules: Arc<ScheduleStore>,
}

impl ParkClient {
    // Validates every venue up front; caches are created fresh for this client
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> ParkResult<Self> {
        let endpoints: Arc<dyn Endpoints> = Arc::new(DefaultEndpoints::new(&config));
        Self::with_endpoints(config, transport, endpoints)
    }

    pub fn with_endpoints(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        endpoints: Arc<dyn Endpoints>,
    ) -> ParkResult<Self> {
        let credentials = Arc::new(CredentialCache::new(
            transport.clone(),
            endpoints.clone(),
            config.app_id.clone(),
        ));
        let schedules = Arc::new(ScheduleStore::new(config.schedule_ttl()?));
        Self::with_caches(config, transport, endpoints, credentials, schedules)
    }

    // Shares caches with other clients talking to the same operator account
    pub fn with_caches(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        endpoints: Arc<dyn Endpoints>,
        credentials: Arc<CredentialCache>,
        schedules: Arc<ScheduleStore>,
    ) -> ParkResult<Self> {
        config.validate()?;

        let mut venues = HashMap::with_capacity(config.venues.len());
        let mut venue_order = Vec::with_capacity(config.venues.len());
        for venue in config.venues {
            let tz = venue.validate()?;
            if venues.contains_key(&venue.venue_id) {
                return Err(ParkError::Configuration(format!(
                    "venue {} is configured twice",
                    venue.venue_id
                )));
            }
            venue_order.push(venue.venue_id.clone());
            venues.insert(venue.venue_id.clone(), Venue { config: venue, tz });
        }

        Ok(Self {
            venues,
            venue_order,
            transport,
            endpoints,
            credentials,
            schedules,
        })
    }

    // Production client over reqwest
    pub fn connect(config: ClientConfig) -> ParkResult<Self> {
        let transport = ReqwestTransport::new(StdDuration::from_millis(config.request_timeout_ms))
            .map_err(|e| ParkError::Configuration(format!("cannot build HTTP client: {}", e)))?;
        Self::new(config, Arc::new(transport))
    }

    pub fn credentials(&self) -> &Arc<CredentialCache> {
        &self.credentials
    }

    pub fn schedules(&self) -> &Arc<ScheduleStore> {
        &self.schedules
    }

    pub fn venue_ids(&self) -> &[String] {
        &self.venue_order
    }

    pub fn venue_config(&self, venue_id: &str) -> ParkResult<&VenueConfig> {
        self.venue(venue_id).map(|v| &v.config)
    }

    fn venue(&self, venue_id: &str) -> ParkResult<&Venue> {
        self.venues
            .get(venue_id)
            .ok_or_else(|| ParkError::Configuration(format!("unknown venue {:?}", venue_id)))
    }

    // Outer error: the credential step failed. Inner: the transport call itself.
    async fn send_authorized(
        &self,
        request: HttpRequest,
        now: DateTime<Utc>,
    ) -> ParkResult<Result<HttpResponse, TransportError>> {
        let request = self.credentials.authorize(request, now).await?;
        let response = self.transport.request(request).await;
        if let Ok(response) = &response {
            self.credentials.observe_response(response);
        }
        Ok(response)
    }

    async fn fetch_schedule(
        &self,
        venue: &Venue,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> ParkResult<VenueSchedule> {
        let venue_id = venue.config.venue_id.as_str();
        let today = local_date(venue.tz, now);
        let range = ScheduleRange {
            tz: venue.tz,
            start_date: today,
            end_date: venue.config.horizon_end(today),
        };
        debug!(venue_id, start = %range.start_date, end = %range.end_date, "fetching venue schedule");

        let request =
            self.endpoints
                .schedule_request(&venue.config, range.start_date, range.end_date);
        let payload = self
            .send_authorized(request, now)
            .await?
            .and_then(|response| response.json())
            .map_err(|source| ParkError::ScheduleFetch {
                venue_id: venue_id.to_string(),
                source,
            })?;

        Ok(VenueSchedule {
            venue_id: venue_id.to_string(),
            start_date: range.start_date,
            end_date: range.end_date,
            expires_at,
            by_attraction: parse_schedule(venue_id, payload, range)?,
        })
    }

    async fn ensure_schedule(
        &self,
        venue: &Venue,
        now: DateTime<Utc>,
    ) -> ParkResult<Arc<VenueSchedule>> {
        self.schedules
            .ensure_fresh(&venue.config.venue_id, now, |expires_at| {
                self.fetch_schedule(venue, now, expires_at)
            })
            .await
    }

    pub async fn get_wait_times(&self, venue_id: &str) -> ParkResult<Vec<AttractionRecord>> {
        self.get_wait_times_at(venue_id, Utc::now()).await
    }

    pub async fn get_wait_times_at(
        &self,
        venue_id: &str,
        now: DateTime<Utc>,
    ) -> ParkResult<Vec<AttractionRecord>> {
        let venue = self.venue(venue_id)?;
        let schedule = self.ensure_schedule(venue, now).await?;

        let request = self.endpoints.wait_times_request(&venue.config);
        let payload = self
            .send_authorized(request, now)
            .await?
            .and_then(|response| response.json())
            .map_err(|source| ParkError::LiveDataFetch {
                venue_id: venue_id.to_string(),
                message: "live status request failed".to_string(),
                source: Some(source),
            })?;
        let entries = parse_live_entries(venue_id, payload)?;

        let today = local_date(venue.tz, now);
        let records = assemble(&entries, &schedule, &venue.config, venue.tz, now, today);
        info!(venue_id, attractions = records.len(), "assembled wait times");
        Ok(records)
    }

    pub async fn list_schedule(
        &self,
        venue_id: &str,
        attraction_id: &str,
    ) -> ParkResult<Vec<DayWindow>> {
        self.list_schedule_at(venue_id, attraction_id, Utc::now())
            .await
    }

    pub async fn list_schedule_at(
        &self,
        venue_id: &str,
        attraction_id: &str,
        now: DateTime<Utc>,
    ) -> ParkResult<Vec<DayWindow>> {
        let venue = self.venue(venue_id)?;
        let schedule = self.ensure_schedule(venue, now).await?;

        if let Some(windows) = schedule.windows(attraction_id) {
            return Ok(windows.to_vec());
        }

        // no published hours: assume shut for the whole horizon
        let today = local_date(venue.tz, now);
        Ok(closed_calendar(venue.tz, today, venue.config.horizon_end(today)))
    }

    // Windows rendered with the venue's display and date formats
    pub async fn list_schedule_formatted(
        &self,
        venue_id: &str,
        attraction_id: &str,
    ) -> ParkResult<Vec<FormattedWindow>> {
        self.list_schedule_formatted_at(venue_id, attraction_id, Utc::now())
            .await
    }

    pub async fn list_schedule_formatted_at(
        &self,
        venue_id: &str,
        attraction_id: &str,
        now: DateTime<Utc>,
    ) -> ParkResult<Vec<FormattedWindow>> {
        let windows = self.list_schedule_at(venue_id, attraction_id, now).await?;
        let config = &self.venue(venue_id)?.config;
        Ok(windows.iter().map(|w| w.format(config)).collect())
    }

    // The park's own hours are the schedule of the park entity
    pub async fn get_opening_times(&self, venue_id: &str) -> ParkResult<Vec<DayWindow>> {
        self.get_opening_times_at(venue_id, Utc::now()).await
    }

    pub async fn get_opening_times_at(
        &self,
        venue_id: &str,
        now: DateTime<Utc>,
    ) -> ParkResult<Vec<DayWindow>> {
        let park_id = self.venue(venue_id)?.config.attraction_api_id.clone();
        self.list_schedule_at(venue_id, &park_id, now).await
    }

    // Queries every configured venue concurrently; one venue failing leaves the others intact
    pub async fn get_all_wait_times(&self) -> Vec<(String, ParkResult<Vec<AttractionRecord>>)> {
        self.get_all_wait_times_at(Utc::now()).await
    }

    pub async fn get_all_wait_times_at(
        &self,
        now: DateTime<Utc>,
    ) -> Vec<(String, ParkResult<Vec<AttractionRecord>>)> {
        let queries = self.venue_order.iter().map(|venue_id| async move {
            (venue_id.clone(), self.get_wait_times_at(venue_id, now).await)
        });
        join_all(queries).await
    }
}
