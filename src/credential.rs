// Bearer credential cache
// One credential per process (one operator account). Refreshed shortly before it expires and
// replaced wholesale, so a reader always sees a complete credential.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info};

use crate::endpoints::Endpoints;
use crate::error::{ParkError, ParkResult};
use crate::transport::{HttpRequest, HttpResponse, Transport};

// seconds shaved off the advertised lifetime
pub const EXPIRY_SKEW_SECS: i64 = 30;
// shortest lifetime we accept from the token endpoint, and the floor after the skew
pub const MIN_LIFETIME_SECS: i64 = 5;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub correlation_id: Option<String>,
}

impl Credential {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CredentialStats {
    pub token_fetches: usize,
    pub cache_hits: usize,
}

pub struct CredentialCache {
    transport: Arc<dyn Transport>,
    endpoints: Arc<dyn Endpoints>,
    app_id: String,
    current: RwLock<Option<Arc<Credential>>>,
    // held while a refresh is in flight so concurrent callers share it
    refresh_gate: tokio::sync::Mutex<()>,
    token_fetches: AtomicUsize,
    cache_hits: AtomicUsize,
}

impl CredentialCache {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: Arc<dyn Endpoints>,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            endpoints,
            app_id: app_id.into(),
            current: RwLock::new(None),
            refresh_gate: tokio::sync::Mutex::new(()),
            token_fetches: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
        }
    }

    pub fn current(&self) -> Option<Arc<Credential>> {
        self.current.read().clone()
    }

    fn valid_token(&self, now: DateTime<Utc>) -> Option<String> {
        self.current
            .read()
            .as_ref()
            .filter(|c| c.is_valid_at(now))
            .map(|c| c.token.clone())
    }

    pub async fn get_token(&self, now: DateTime<Utc>) -> ParkResult<String> {
        if let Some(token) = self.valid_token(now) {
            self.cache_hits.fetch_add(1, Ordering::SeqCst);
            return Ok(token);
        }

        let _gate = self.refresh_gate.lock().await;

        // another caller may have refreshed while we waited
        if let Some(token) = self.valid_token(now) {
            self.cache_hits.fetch_add(1, Ordering::SeqCst);
            return Ok(token);
        }

        let credential = self.fetch(now).await?;
        let token = credential.token.clone();
        info!(expires_at = %credential.expires_at, "refreshed access token");
        *self.current.write() = Some(Arc::new(credential));

        Ok(token)
    }

    async fn fetch(&self, now: DateTime<Utc>) -> ParkResult<Credential> {
        self.token_fetches.fetch_add(1, Ordering::SeqCst);

        let response = self
            .transport
            .request(self.endpoints.token_request())
            .await
            .map_err(|e| ParkError::Credential {
                message: "token request failed".to_string(),
                source: Some(e),
            })?;
        let body = response.json().map_err(|e| ParkError::Credential {
            message: "token response was not usable".to_string(),
            source: Some(e),
        })?;

        let token = body
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ParkError::credential("token response is missing access_token"))?;
        let expires_in = body
            .get("expires_in")
            .and_then(parse_seconds)
            .ok_or_else(|| {
                ParkError::credential("token response is missing or has an unreadable expires_in")
            })?;

        Ok(Credential {
            token: token.to_string(),
            expires_at: expiry_for(now, expires_in)?,
            correlation_id: None,
        })
    }

    // Attaches the bearer token and app id, refreshing the token first if needed
    pub async fn authorize(
        &self,
        request: HttpRequest,
        now: DateTime<Utc>,
    ) -> ParkResult<HttpRequest> {
        let token = self.get_token(now).await?;
        Ok(request
            .with_header("Authorization", format!("BEARER {}", token))
            .with_header("X-App-Id", self.app_id.clone()))
    }

    // Records the upstream correlation id for diagnostics. Never affects validity.
    pub fn observe_response(&self, response: &HttpResponse) {
        let Some(correlation_id) = response.header(CORRELATION_HEADER) else {
            return;
        };

        let mut current = self.current.write();
        let replacement = match current.as_ref() {
            Some(cred) if cred.correlation_id.as_deref() != Some(correlation_id) => {
                Arc::new(Credential {
                    correlation_id: Some(correlation_id.to_string()),
                    ..Credential::clone(cred)
                })
            }
            _ => return,
        };
        debug!(correlation_id, "recorded upstream correlation id");
        *current = Some(replacement);
    }

    pub fn invalidate(&self) {
        *self.current.write() = None;
    }

    pub fn stats(&self) -> CredentialStats {
        CredentialStats {
            token_fetches: self.token_fetches.load(Ordering::SeqCst),
            cache_hits: self.cache_hits.load(Ordering::SeqCst),
        }
    }
}

pub fn expiry_for(now: DateTime<Utc>, expires_in: i64) -> ParkResult<DateTime<Utc>> {
    if expires_in < MIN_LIFETIME_SECS {
        return Err(ParkError::credential(format!(
            "token endpoint reported an implausible expires_in of {}s",
            expires_in
        )));
    }

    let lifetime = (expires_in - EXPIRY_SKEW_SECS).max(MIN_LIFETIME_SECS);
    Duration::try_seconds(lifetime)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            ParkError::credential(format!(
                "token endpoint reported an implausible expires_in of {}s",
                expires_in
            ))
        })
}

fn parse_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
