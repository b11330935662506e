// Theme-park wait times joined with the operator's published operating schedule

pub mod client;
pub mod config;
pub mod credential;
pub mod endpoints;
pub mod error;
pub mod schedule;
pub mod schedule_parser;
pub mod schedule_store;
pub mod transport;
pub mod wait_times;
pub mod window;

// Re-export key types for convenience
pub use client::ParkClient;
pub use config::{ClientConfig, VenueConfig};
pub use credential::{Credential, CredentialCache, CredentialStats};
pub use endpoints::{DefaultEndpoints, Endpoints};
pub use error::{ParkError, ParkResult, TransportError};
pub use schedule::{DayWindow, FormattedWindow, ScheduleType, SpecialWindow, VenueSchedule};
pub use schedule_store::{ScheduleStats, ScheduleStore};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use wait_times::{AttractionRecord, AttractionStatus};
pub use window::select_active;
