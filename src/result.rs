//! Per-operation validation outcomes.
//!
//! A [`ValidationResult`] is produced exactly once per attempted or skipped
//! operation and is never mutated after the checker hands it back. Errors are
//! tagged with an [`ErrorKind`] where they are created so that the run summary
//! can tally them without inspecting message text.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// HTTP methods that are exercised from the contract's path items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    /// Parse a path-item key such as `get` or `POST`
    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "get" => Some(HttpMethod::Get),
            "post" => Some(HttpMethod::Post),
            "put" => Some(HttpMethod::Put),
            "delete" => Some(HttpMethod::Delete),
            "patch" => Some(HttpMethod::Patch),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }

    /// Lower-case key used inside contract path items
    pub fn key(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
            HttpMethod::Patch => "patch",
        }
    }

    /// Read-only fetches keep requests minimal by dropping optional inputs
    pub fn is_read_only(&self) -> bool {
        matches!(self, HttpMethod::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

/// Reporting category of a per-operation error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SchemaValidation,
    UnexpectedResponse,
    ConnectionError,
    Timeout,
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SchemaValidation => "schema_validation",
            ErrorKind::UnexpectedResponse => "unexpected_response",
            ErrorKind::ConnectionError => "connection_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Other => "other",
        }
    }

    /// Best-effort categorization of free-form error text.
    ///
    /// Markers are checked in a fixed priority order (schema, status,
    /// connection, timeout) and the first hit wins.
    pub fn classify(message: &str) -> Self {
        if message.contains("Schema validation") {
            ErrorKind::SchemaValidation
        } else if message.contains("response code") {
            ErrorKind::UnexpectedResponse
        } else if message.contains("Connection error") {
            ErrorKind::ConnectionError
        } else if message.to_lowercase().contains("timeout") {
            ErrorKind::Timeout
        } else {
            ErrorKind::Other
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single error recorded on a result, tagged at the point of creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ResultError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Build an error whose kind is inferred from its text
    pub fn classified(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: ErrorKind::classify(&message),
            message,
        }
    }

    pub fn schema(message: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::SchemaValidation,
            format!("Schema validation error: {}", message),
        )
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Other, message)
    }
}

impl fmt::Display for ResultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// The request as it was actually sent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestRecord {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub query: Map<String, Value>,
    pub body: Option<Value>,
}

/// Final classification of a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
}

/// Outcome of validating one contract operation
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub endpoint_id: usize,
    pub path: String,
    pub method: HttpMethod,
    pub outcome: Outcome,
    pub errors: Vec<ResultError>,
    pub warnings: Vec<String>,
    pub response_code: Option<u16>,
    pub response_time: Option<Duration>,
    pub request: Option<RequestRecord>,
    pub response_body: Option<String>,
    pub expected_response_schema: Option<Value>,
}

impl ValidationResult {
    /// Start a result for an operation that is about to be attempted
    pub fn attempt(endpoint_id: usize, path: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            endpoint_id,
            path: path.into(),
            method,
            outcome: Outcome::Failed,
            errors: Vec::new(),
            warnings: Vec::new(),
            response_code: None,
            response_time: None,
            request: None,
            response_body: None,
            expected_response_schema: None,
        }
    }

    /// A result for an operation that was never sent
    pub fn skipped(
        endpoint_id: usize,
        path: impl Into<String>,
        method: HttpMethod,
        reason: impl Into<String>,
    ) -> Self {
        let mut result = Self::attempt(endpoint_id, path, method);
        result.outcome = Outcome::Skipped;
        result.warnings.push(reason.into());
        result
    }

    /// Settle the outcome from the collected errors
    pub fn finish(mut self) -> Self {
        if self.outcome != Outcome::Skipped {
            self.outcome = if self.errors.is_empty() {
                Outcome::Passed
            } else {
                Outcome::Failed
            };
        }
        self
    }

    /// True when no errors were recorded (skips count as successful)
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_skipped(&self) -> bool {
        self.outcome == Outcome::Skipped
    }

    pub fn is_failure(&self) -> bool {
        !self.is_skipped() && !self.errors.is_empty()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }
}
