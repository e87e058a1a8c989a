//! HTTP transport abstraction
//!
//! Every network call in the crate goes through [`Transport`], so the
//! pipeline can run against [`ReqwestTransport`] in production and
//! [`MockTransport`] in tests.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, instrument};
use wombo_core::{DreamError, Result};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// A single outgoing request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in headers {
            self.headers
                .push((name.as_ref().to_string(), value.as_ref().to_string()));
        }
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `value` as the JSON body
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(self.header("content-type", "application/json").body(body))
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Body as UTF-8 text, for assertions and logs
    pub fn body_text(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).to_string())
    }

    /// First header value with the given (case-insensitive) name
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and raw body of a completed request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// Short body excerpt for error messages
    pub fn snippet(&self) -> String {
        self.text().chars().take(200).collect()
    }
}

/// Trait for executing HTTP requests (allows mocking in tests)
///
/// Implementations must be safe to share between concurrent operations.
/// Transport failures and per-call timeouts map to [`DreamError::Network`];
/// non-2xx statuses are returned as ordinary responses.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    async fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse> {
        self.execute(
            HttpRequest::get(url)
                .headers(headers.iter().copied())
                .timeout(timeout),
        )
        .await
    }

    async fn post(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: Vec<u8>,
        timeout: Duration,
    ) -> Result<HttpResponse> {
        self.execute(
            HttpRequest::post(url)
                .headers(headers.iter().copied())
                .body(body)
                .timeout(timeout),
        )
        .await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).execute(request).await
    }
}

/// Real transport over a pooled reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DreamError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Wrap an already configured client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                DreamError::Network(format!(
                    "{} {} timed out after {:?}",
                    request.method, request.url, request.timeout
                ))
            } else {
                DreamError::Network(format!("{} {} failed: {}", request.method, request.url, e))
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| DreamError::Network(format!("Failed to read body of {}: {}", request.url, e)))?;

        debug!("{} {} -> {} ({} bytes)", request.method, request.url, status, body.len());

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

#[derive(Debug, Clone)]
enum MockOutcome {
    Response(HttpResponse),
    NetworkError(String),
}

#[derive(Debug, Clone)]
struct MockEntry {
    outcome: MockOutcome,
    delay: Duration,
}

#[derive(Debug, Default)]
struct MockState {
    responses: HashMap<String, VecDeque<MockEntry>>,
    requests: Vec<HttpRequest>,
    completed: Vec<String>,
}

/// Mock transport for testing
///
/// Responses are queued per `METHOD url` (query string excluded) and served
/// in order; the last queued response for a key repeats forever. Clones share
/// state, so a test can keep a handle for inspecting recorded requests.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(method: Method, url: &str) -> String {
        format!("{} {}", method, url)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(self, method: Method, url: &str, outcome: MockOutcome, delay: Duration) -> Self {
        self.lock()
            .responses
            .entry(Self::key(method, url))
            .or_default()
            .push_back(MockEntry { outcome, delay });
        self
    }

    pub fn with_response(self, method: Method, url: &str, response: HttpResponse) -> Self {
        self.push(method, url, MockOutcome::Response(response), Duration::ZERO)
    }

    /// Queue a 200 response with a text body
    pub fn with_text(self, method: Method, url: &str, body: &str) -> Self {
        self.with_response(method, url, HttpResponse::ok(body.as_bytes()))
    }

    /// Queue a 200 response with a JSON body
    pub fn with_json(self, method: Method, url: &str, body: &serde_json::Value) -> Self {
        self.with_response(method, url, HttpResponse::ok(body.to_string().into_bytes()))
    }

    /// Queue a response that only resolves after `delay`
    pub fn with_delayed_response(
        self,
        method: Method,
        url: &str,
        delay: Duration,
        response: HttpResponse,
    ) -> Self {
        self.push(method, url, MockOutcome::Response(response), delay)
    }

    /// Queue a transport-level failure
    pub fn with_network_error(self, method: Method, url: &str, message: &str) -> Self {
        self.push(
            method,
            url,
            MockOutcome::NetworkError(message.to_string()),
            Duration::ZERO,
        )
    }

    /// Every request seen so far, in dispatch order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.lock().requests.clone()
    }

    /// Requests sent to one `METHOD url`
    pub fn requests_to(&self, method: Method, url: &str) -> Vec<HttpRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.url == url)
            .cloned()
            .collect()
    }

    pub fn call_count(&self, method: Method, url: &str) -> usize {
        self.requests_to(method, url).len()
    }

    /// URLs in the order their responses resolved
    pub fn completion_order(&self) -> Vec<String> {
        self.lock().completed.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let key = Self::key(request.method, &request.url);
        let url = request.url.clone();

        let entry = {
            let mut state = self.lock();
            state.requests.push(request);
            let queue = state.responses.get_mut(&key);
            match queue {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        let entry =
            entry.ok_or_else(|| DreamError::Network(format!("No mock response for: {}", key)))?;

        if !entry.delay.is_zero() {
            tokio::time::sleep(entry.delay).await;
        }

        self.lock().completed.push(url);

        match entry.outcome {
            MockOutcome::Response(response) => Ok(response),
            MockOutcome::NetworkError(message) => Err(DreamError::Network(message)),
        }
    }
}
