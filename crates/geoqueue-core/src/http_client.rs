use std::collections::{BTreeMap, VecDeque};
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;

/// Timeout applied when the caller does not override it.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

const USER_AGENT: &str = concat!("geoqueue/", env!("CARGO_PKG_VERSION"));

/// Query parameters that carry credentials and never appear in messages or logs.
const SECRET_QUERY_PARAMS: [&str; 4] = ["key", "access_key", "api_key", "apikey"];

/// Returns `url` with the values of credential query parameters masked.
pub fn redacted_url(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_owned();
    };

    let query = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((name, _)) if is_secret_param(name) => format!("{name}=REDACTED"),
            _ => pair.to_owned(),
        })
        .collect::<Vec<_>>()
        .join("&");

    format!("{base}?{query}")
}

fn is_secret_param(name: &str) -> bool {
    SECRET_QUERY_PARAMS
        .iter()
        .any(|secret| secret.eq_ignore_ascii_case(name))
}

/// Minimal HTTP method set needed by provider adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// HTTP request envelope used by adapter transport calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Appends a percent-encoded query parameter to the URL.
    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        self.url.push(separator);
        self.url.push_str(&urlencoding::encode(name));
        self.url.push('=');
        self.url.push_str(&urlencoding::encode(value));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Response that reached the client, whatever its status.
///
/// The body is read eagerly by the transport; `json` and `text` consume the
/// response so each body is parsed at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    body: String,
}

impl HttpResponse {
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            body: body.into(),
        }
    }

    pub fn ok_json(body: impl Into<String>) -> Self {
        Self::new(200, "OK", body)
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        let status_text = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("Unknown");
        Self::new(status, status_text, body)
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    pub fn json<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    pub fn text(self) -> String {
        self.body
    }
}

/// Transport/status failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestErrorKind {
    Timeout,
    Network,
    /// Only produced above the transport, when a caller turns a non-2xx response into a failure.
    Status(u16),
}

/// Request-level failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestError {
    kind: RequestErrorKind,
    message: String,
}

impl RequestError {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: RequestErrorKind::Timeout,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: RequestErrorKind::Network,
            message: message.into(),
        }
    }

    pub fn status(response: &HttpResponse) -> Self {
        Self {
            kind: RequestErrorKind::Status(response.status),
            message: format!("upstream returned {} {}", response.status, response.status_text),
        }
    }

    pub const fn kind(&self) -> RequestErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        match self.kind {
            RequestErrorKind::Timeout | RequestErrorKind::Network => true,
            RequestErrorKind::Status(status) => status >= 500 && status < 600,
        }
    }
}

impl Display for RequestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RequestError {}

pub type RequestFuture<'a> =
    Pin<Box<dyn Future<Output = Result<HttpResponse, RequestError>> + Send + 'a>>;

/// Single outbound request with a timeout; no retry policy.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(&'a self, request: HttpRequest) -> RequestFuture<'a>;
}

/// Production HTTP client using reqwest for real API calls.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: Arc::new(
                reqwest::Client::builder()
                    .user_agent(USER_AGENT)
                    .build()
                    .unwrap_or_else(|_| reqwest::Client::new()),
            ),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, RequestError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;
        let status = response.status();
        let body = response.text().await.map_err(classify_reqwest_error)?;

        Ok(HttpResponse::new(
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown"),
            body,
        ))
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> RequestFuture<'a> {
        Box::pin(async move {
            let timeout = Duration::from_millis(request.timeout_ms);
            let url = redacted_url(&request.url);

            // Dropping the send future on expiry aborts the in-flight request.
            match tokio::time::timeout(timeout, self.send(request)).await {
                Ok(result) => result,
                Err(_) => Err(RequestError::timeout(format!(
                    "request to {url} timed out after {}ms",
                    timeout.as_millis()
                ))),
            }
        })
    }
}

fn classify_reqwest_error(error: reqwest::Error) -> RequestError {
    // reqwest's Display appends the full URL, query string included.
    let error = error.without_url();
    if error.is_timeout() {
        RequestError::timeout(format!("request timeout: {error}"))
    } else if error.is_connect() {
        RequestError::network(format!("connection failed: {error}"))
    } else {
        RequestError::network(format!("request failed: {error}"))
    }
}

type Reply = Result<HttpResponse, RequestError>;

#[derive(Debug)]
struct ReplayRoute {
    prefix: String,
    replies: VecDeque<Reply>,
}

/// Offline transport that answers from canned replies keyed by URL prefix.
///
/// Each route plays its replies in order and keeps repeating the last one.
/// Every request is recorded, matched or not.
#[derive(Debug, Default)]
pub struct ReplayHttpClient {
    routes: Mutex<Vec<ReplayRoute>>,
    requests: Mutex<Vec<HttpRequest>>,
    latency: Option<Duration>,
}

impl ReplayHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn route(self, prefix: impl Into<String>, response: HttpResponse) -> Self {
        self.route_sequence(prefix, vec![Ok(response)])
    }

    pub fn route_json(self, prefix: impl Into<String>, body: impl Into<String>) -> Self {
        self.route(prefix, HttpResponse::ok_json(body))
    }

    pub fn route_failure(self, prefix: impl Into<String>, error: RequestError) -> Self {
        self.route_sequence(prefix, vec![Err(error)])
    }

    pub fn route_sequence(self, prefix: impl Into<String>, replies: Vec<Reply>) -> Self {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ReplayRoute {
                prefix: prefix.into(),
                replies: replies.into(),
            });
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn requests_to(&self, prefix: &str) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|request| request.url.starts_with(prefix))
            .count()
    }

    fn next_reply(&self, url: &str) -> Reply {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        let route = routes
            .iter_mut()
            .filter(|route| url.starts_with(route.prefix.as_str()))
            .max_by_key(|route| route.prefix.len());

        let Some(route) = route else {
            return Err(RequestError::network(format!(
                "no replay route for {}",
                redacted_url(url)
            )));
        };

        if route.replies.len() > 1 {
            if let Some(reply) = route.replies.pop_front() {
                return reply;
            }
        }

        route
            .replies
            .front()
            .cloned()
            .unwrap_or_else(|| {
                Err(RequestError::network(format!(
                    "replay route for {} is empty",
                    redacted_url(url)
                )))
            })
    }
}

impl HttpClient for ReplayHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> RequestFuture<'a> {
        let reply = self.next_reply(&request.url);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        let latency = self.latency;

        Box::pin(async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            reply
        })
    }
}
