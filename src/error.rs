// Error types shared by the credential cache, schedule store and park client

use thiserror::Error;

// Failures raised by a Transport before the core looks at the payload
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {status_code} - {message}")]
    Status { status_code: u16, message: String },

    #[error("Malformed body: {0}")]
    MalformedBody(#[from] serde_json::Error),
}

impl TransportError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TransportError::Status { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ParkError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Credential error: {message}")]
    Credential {
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    #[error("Schedule fetch error for venue {venue_id}: {source}")]
    ScheduleFetch {
        venue_id: String,
        #[source]
        source: TransportError,
    },

    #[error("Schedule parse error for venue {venue_id}: {message}")]
    ScheduleParse { venue_id: String, message: String },

    #[error("Live data fetch error for venue {venue_id}: {message}")]
    LiveDataFetch {
        venue_id: String,
        message: String,
        #[source]
        source: Option<TransportError>,
    },
}

impl ParkError {
    pub(crate) fn credential(message: impl Into<String>) -> Self {
        ParkError::Credential {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn schedule_parse(venue_id: &str, message: impl Into<String>) -> Self {
        ParkError::ScheduleParse {
            venue_id: venue_id.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn live_data(venue_id: &str, message: impl Into<String>) -> Self {
        ParkError::LiveDataFetch {
            venue_id: venue_id.to_string(),
            message: message.into(),
            source: None,
        }
    }
}

pub type ParkResult<T> = Result<T, ParkError>;
