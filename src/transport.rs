// HTTP transport collaborator
// The core only ever sees HttpRequest/HttpResponse; timeouts and user agents live here.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use rand::seq::SliceRandom;
use serde_json::Value;
use tracing::debug;

use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Form(Vec<(String, String)>),
    Json(Value),
}

impl Default for RequestBody {
    fn default() -> Self {
        RequestBody::Empty
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: vec![],
            query: vec![],
            body: RequestBody::Empty,
        }
    }

    pub fn post_form(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: vec![],
            query: vec![],
            body: RequestBody::Form(form),
        }
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    // keys are lower-cased
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(key.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|v| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    // Non-2xx and non-JSON bodies are both transport-level failures
    pub fn json(&self) -> Result<Value, TransportError> {
        if !self.is_success() {
            let message = String::from_utf8_lossy(&self.body).trim().to_string();
            return Err(TransportError::Status {
                status_code: self.status,
                message,
            });
        }

        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (Linux; Android 12; SM-G991B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 14; Pixel 8 Pro) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Mobile Safari/537.36",
];

// Production transport backed by reqwest. Each request goes out with a randomly chosen user agent.
pub struct ReqwestTransport {
    client: reqwest::Client,
    user_agents: Vec<String>,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            client,
            user_agents: USER_AGENTS.iter().map(|ua| ua.to_string()).collect(),
        })
    }

    pub fn with_user_agents(mut self, user_agents: Vec<String>) -> Self {
        if !user_agents.is_empty() {
            self.user_agents = user_agents;
        }
        self
    }

    fn pick_user_agent(&self) -> &str {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .map(|ua| ua.as_str())
            .unwrap_or(USER_AGENTS[0])
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = builder.header(reqwest::header::USER_AGENT, self.pick_user_agent());
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(form) => builder.form(form),
            RequestBody::Json(json) => builder.json(json),
        };

        debug!(url = %request.url, method = ?request.method, "sending upstream request");

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

// Scripted transport used by the tests and benchmarks
pub mod mock_transport {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone)]
    pub enum MockReply {
        Respond(HttpResponse),
        NetworkError(String),
    }

    struct Route {
        url_fragment: String,
        replies: VecDeque<MockReply>,
    }

    // Routes are matched by URL substring; the most recently registered match wins.
    // A route with several queued replies hands them out in order and then repeats the last one.
    pub struct MockTransport {
        routes: Mutex<Vec<Route>>,
        requests: Mutex<Vec<HttpRequest>>,
        request_count: AtomicUsize,
        delay_ms: AtomicUsize,
    }

    impl Default for MockTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self {
                routes: Mutex::new(Vec::new()),
                requests: Mutex::new(Vec::new()),
                request_count: AtomicUsize::new(0),
                delay_ms: AtomicUsize::new(0),
            }
        }

        pub fn set_delay(&self, delay_ms: usize) {
            self.delay_ms.store(delay_ms, Ordering::SeqCst);
        }

        pub fn add_reply(&self, url_fragment: &str, reply: MockReply) {
            let mut routes = self.routes.lock();
            if let Some(route) = routes.iter_mut().find(|r| r.url_fragment == url_fragment) {
                route.replies.push_back(reply);
            } else {
                routes.push(Route {
                    url_fragment: url_fragment.to_string(),
                    replies: VecDeque::from(vec![reply]),
                });
            }
        }

        pub fn add_json(&self, url_fragment: &str, status: u16, body: Value) {
            self.add_response(url_fragment, HttpResponse::new(status, body.to_string()));
        }

        pub fn add_response(&self, url_fragment: &str, response: HttpResponse) {
            self.add_reply(url_fragment, MockReply::Respond(response));
        }

        pub fn add_network_error(&self, url_fragment: &str, message: &str) {
            self.add_reply(url_fragment, MockReply::NetworkError(message.to_string()));
        }

        // Drop every queued reply for a fragment so a test can script a new outcome
        pub fn reset_route(&self, url_fragment: &str) {
            self.routes.lock().retain(|r| r.url_fragment != url_fragment);
        }

        pub fn request_count(&self) -> usize {
            self.request_count.load(Ordering::SeqCst)
        }

        pub fn requests_to(&self, url_fragment: &str) -> usize {
            self.requests
                .lock()
                .iter()
                .filter(|r| r.url.contains(url_fragment))
                .count()
        }

        pub fn recorded_requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().clone()
        }

        fn next_reply(&self, url: &str) -> Option<MockReply> {
            let mut routes = self.routes.lock();
            let route = routes
                .iter_mut()
                .rev()
                .find(|r| url.contains(&r.url_fragment))?;

            if route.replies.len() > 1 {
                route.replies.pop_front()
            } else {
                route.replies.front().cloned()
            }
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn request(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.request_count.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().push(request.clone());

            let delay = self.delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay as u64)).await;
            }

            match self.next_reply(&request.url) {
                Some(MockReply::Respond(response)) => Ok(response),
                Some(MockReply::NetworkError(message)) => Err(TransportError::Network(message)),
                None => Ok(HttpResponse::new(404, "no mock route")),
            }
        }
    }
}
