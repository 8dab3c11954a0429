use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use reqwest::header::{
    ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue,
};
use tokio::time::timeout;

use crate::error::ValidationError;
use crate::planner::RequestPlan;
use crate::result::{ErrorKind, ResultError};

/// CSRF marker header expected by the target service
pub const REQUESTED_BY_HEADER: &str = "X-Requested-By";
pub const REQUESTED_BY_VALUE: &str = "validate-api";
pub const API_TOKEN_HEADER: &str = "X-API-Token";

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Token sent as the basic-auth user name
    pub access_token: String,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            access_token: String::new(),
            user_agent: format!("validate-api/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// What came back from the service
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    /// Time until the response head arrived
    pub elapsed: Duration,
    pub body: String,
}

/// Transport-level failure; the request produced no response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Timeout { seconds: u64 },
    Connect(String),
    Other(String),
}

impl From<TransportError> for ResultError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout { seconds } => ResultError::new(
                ErrorKind::Timeout,
                format!("Request timeout after {} seconds", seconds),
            ),
            TransportError::Connect(details) => ResultError::new(
                ErrorKind::ConnectionError,
                format!("Connection error: {}", details),
            ),
            TransportError::Other(details) => {
                ResultError::other(format!("Unexpected error: {}", details))
            }
        }
    }
}

/// Shared HTTP session against the target service.
///
/// The underlying `reqwest::Client` carries the session headers and its
/// connection pool; it is read-only after construction and safe to share
/// between workers.
pub struct ApiClient {
    client: Client,
    config: HttpClientConfig,
    session_headers: BTreeMap<String, String>,
}

impl ApiClient {
    /// Create a new client with the session headers installed
    pub fn new(config: HttpClientConfig) -> Result<Self, ValidationError> {
        let session_headers = session_headers(&config.access_token);

        let mut defaults = HeaderMap::new();
        for (name, value) in &session_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ValidationError::Config(format!("Invalid header {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                ValidationError::Config(format!("Invalid value for header {}: {}", name, e))
            })?;
            defaults.insert(name, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .default_headers(defaults)
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(ValidationError::from)?;

        Ok(Self {
            client,
            config,
            session_headers,
        })
    }

    /// Headers sent with every request, by name
    pub fn session_headers(&self) -> &BTreeMap<String, String> {
        &self.session_headers
    }

    /// Execute a plan once; no retries
    pub async fn send(&self, plan: &RequestPlan) -> Result<ApiResponse, TransportError> {
        let mut request = self
            .client
            .request(plan.method.into(), plan.url.as_str());

        let query = plan.query_pairs();
        if !query.is_empty() {
            request = request.query(&query);
        }
        for (name, value) in &plan.headers {
            if !self.session_headers.contains_key(name) {
                request = request.header(name.as_str(), value.as_str());
            }
        }
        if let Some(body) = &plan.body {
            request = request.json(body);
        }

        let seconds = self.config.timeout_seconds;
        let exchange = async {
            let start = Instant::now();
            let response = request.send().await?;
            let elapsed = start.elapsed();
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>(ApiResponse {
                status,
                elapsed,
                body,
            })
        };

        match timeout(Duration::from_secs(seconds), exchange).await {
            Err(_) => Err(TransportError::Timeout { seconds }),
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) if e.is_timeout() => Err(TransportError::Timeout { seconds }),
            Ok(Err(e)) if e.is_connect() => Err(TransportError::Connect(e.to_string())),
            Ok(Err(e)) => Err(TransportError::Other(e.to_string())),
        }
    }
}

/// Default headers for the session, keyed by header name
pub fn session_headers(access_token: &str) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert(ACCEPT.to_string(), "application/json".to_string());
    headers.insert(CONTENT_TYPE.to_string(), "application/json".to_string());
    headers.insert(REQUESTED_BY_HEADER.to_string(), REQUESTED_BY_VALUE.to_string());

    if !access_token.is_empty() {
        let credentials = STANDARD.encode(format!("{}:token", access_token));
        headers.insert(AUTHORIZATION.to_string(), format!("Basic {}", credentials));
        headers.insert(API_TOKEN_HEADER.to_string(), access_token.to_string());
    }

    headers
}
