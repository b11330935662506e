// Per-venue schedule cache
// Entries are Arc snapshots swapped wholesale; a failed refresh leaves the old snapshot in place.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{info, warn};

use crate::error::ParkResult;
use crate::schedule::VenueSchedule;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScheduleStats {
    pub hit_count: usize,
    pub miss_count: usize,
    pub refresh_count: usize,
    pub failed_refresh_count: usize,
    pub venues_cached: usize,
}

pub struct ScheduleStore {
    entries: DashMap<String, Arc<VenueSchedule>>,
    refresh_gates: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    ttl: Duration,
    hit_count: AtomicUsize,
    miss_count: AtomicUsize,
    refresh_count: AtomicUsize,
    failed_refresh_count: AtomicUsize,
}

impl Default for ScheduleStore {
    fn default() -> Self {
        Self::new(Duration::hours(12))
    }
}

impl ScheduleStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            refresh_gates: DashMap::new(),
            ttl,
            hit_count: AtomicUsize::new(0),
            miss_count: AtomicUsize::new(0),
            refresh_count: AtomicUsize::new(0),
            failed_refresh_count: AtomicUsize::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // Latest snapshot for the venue, fresh or not
    pub fn snapshot(&self, venue_id: &str) -> Option<Arc<VenueSchedule>> {
        self.entries.get(venue_id).map(|e| e.value().clone())
    }

    fn fresh(&self, venue_id: &str, now: DateTime<Utc>) -> Option<Arc<VenueSchedule>> {
        self.snapshot(venue_id).filter(|s| s.is_fresh(now))
    }

    // Returns the cached schedule while it is unexpired, otherwise runs `refresh` and installs
    // its result. `refresh` receives the expiry to stamp on the new schedule.
    pub async fn ensure_fresh<F, Fut>(
        &self,
        venue_id: &str,
        now: DateTime<Utc>,
        refresh: F,
    ) -> ParkResult<Arc<VenueSchedule>>
    where
        F: FnOnce(DateTime<Utc>) -> Fut,
        Fut: Future<Output = ParkResult<VenueSchedule>>,
    {
        if let Some(schedule) = self.fresh(venue_id, now) {
            self.hit_count.fetch_add(1, Ordering::SeqCst);
            return Ok(schedule);
        }

        let gate = self
            .refresh_gates
            .entry(venue_id.to_string())
            .or_default()
            .value()
            .clone();
        let _gate = gate.lock().await;

        // a concurrent caller may have finished the refresh while we waited
        if let Some(schedule) = self.fresh(venue_id, now) {
            self.hit_count.fetch_add(1, Ordering::SeqCst);
            return Ok(schedule);
        }

        self.miss_count.fetch_add(1, Ordering::SeqCst);
        match refresh(now + self.ttl).await {
            Ok(schedule) => {
                self.refresh_count.fetch_add(1, Ordering::SeqCst);
                info!(
                    venue_id,
                    attractions = schedule.by_attraction.len(),
                    expires_at = %schedule.expires_at,
                    "installed venue schedule"
                );
                Ok(self.install(schedule))
            }
            Err(err) => {
                self.failed_refresh_count.fetch_add(1, Ordering::SeqCst);
                warn!(venue_id, error = %err, "schedule refresh failed, keeping previous snapshot");
                Err(err)
            }
        }
    }

    pub fn install(&self, schedule: VenueSchedule) -> Arc<VenueSchedule> {
        let schedule = Arc::new(schedule);
        self.entries
            .insert(schedule.venue_id.clone(), schedule.clone());
        schedule
    }

    pub fn invalidate(&self, venue_id: &str) -> bool {
        self.entries.remove(venue_id).is_some()
    }

    pub fn stats(&self) -> ScheduleStats {
        ScheduleStats {
            hit_count: self.hit_count.load(Ordering::SeqCst),
            miss_count: self.miss_count.load(Ordering::SeqCst),
            refresh_count: self.refresh_count.load(Ordering::SeqCst),
            failed_refresh_count: self.failed_refresh_count.load(Ordering::SeqCst),
            venues_cached: self.entries.len(),
        }
    }
}
