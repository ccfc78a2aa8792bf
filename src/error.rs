//! Error types for solidafy-helpdesk
//!
//! This module defines the error hierarchy for the entire tap.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Every error also maps onto an [`ErrorClass`], the coarse taxonomy the
//! transport, fan-out and orchestration layers use to decide whether to
//! retry, absorb or count a failure.

use thiserror::Error;

/// The main error type for solidafy-helpdesk
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// A non-success response from the API, already classified
    #[error("{message}")]
    Api {
        status: u16,
        kind: ApiErrorKind,
        message: String,
    },

    // ============================================================================
    // Pagination / Protocol Errors
    // ============================================================================
    #[error("Protocol violation: {message}")]
    ProtocolViolation { message: String },

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    // ============================================================================
    // Stream Errors
    // ============================================================================
    #[error("Record in stream '{stream}' has missing replication key '{key}'")]
    MissingReplicationKey { stream: String, key: String },

    #[error("Stream '{stream}' not found")]
    StreamNotFound { stream: String },

    #[error("Sub-resource of {parent} not found: {message}")]
    SubResourceNotFound { parent: String, message: String },

    #[error("Failed to transform record for stream '{stream}' at '{path}': {message}")]
    Transform {
        stream: String,
        path: String,
        message: String,
    },

    // ============================================================================
    // Template Errors
    // ============================================================================
    #[error("Undefined variable in template: {variable}")]
    UndefinedVariable { variable: String },

    // ============================================================================
    // State Errors
    // ============================================================================
    #[error("State error: {message}")]
    State { message: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

// ============================================================================
// API error kinds
// ============================================================================

/// Classification of an HTTP status returned by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    UnprocessableEntity,
    RateLimited,
    InternalServerError,
    NotImplemented,
    BadGateway,
    ServiceUnavailable,
    /// Any status without a dedicated kind
    Unknown,
}

impl ApiErrorKind {
    /// Map an HTTP status code to its kind
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            409 => Self::Conflict,
            422 => Self::UnprocessableEntity,
            429 => Self::RateLimited,
            500 => Self::InternalServerError,
            501 => Self::NotImplemented,
            502 => Self::BadGateway,
            503 => Self::ServiceUnavailable,
            _ => Self::Unknown,
        }
    }

    /// Human readable description used when the body carries none
    pub fn default_message(self) -> Option<&'static str> {
        let message = match self {
            Self::BadRequest => "A validation exception has occurred.",
            Self::Unauthorized => {
                "The access token provided is expired, revoked, malformed or invalid for other reasons."
            }
            Self::Forbidden => "You are missing the following required scopes: read",
            Self::NotFound => "The resource you have specified cannot be found.",
            Self::Conflict => {
                "The API request cannot be completed because the requested operation would conflict with an existing item."
            }
            Self::UnprocessableEntity => {
                "The request content itself is not processable by the server."
            }
            Self::RateLimited => {
                "The API rate limit for your organisation/application pairing has been exceeded."
            }
            Self::InternalServerError => {
                "The server encountered an unexpected condition which prevented it from fulfilling the request."
            }
            Self::NotImplemented => {
                "The server does not support the functionality required to fulfill the request."
            }
            Self::BadGateway => "Server received an invalid response.",
            Self::ServiceUnavailable => "API service is currently unavailable.",
            Self::Unknown => return None,
        };
        Some(message)
    }
}

// ============================================================================
// Error classes
// ============================================================================

/// Coarse failure taxonomy driving retry and propagation decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Timeout, reset, protocol-level transport failure
    NetworkTransient,
    /// HTTP 429
    RateLimited,
    /// HTTP 409
    WriteConflict,
    /// Fatal 4xx (400, 401, 404, 422 and unmapped client errors)
    ClientError,
    /// HTTP 403, kept apart so discovery can aggregate it
    PermissionDenied,
    /// 5xx
    ServerTransient,
    /// The API broke its own pagination contract
    ProtocolViolation,
    /// A 404 scoped to one parent's children
    SubResourceNotFound,
    /// Everything that is not an API failure
    Other,
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an API error from a status code and response body
    ///
    /// The message prefers the body's `error` field, then its `message`
    /// field, then the default text for the status.
    pub fn api(status: u16, body: &str) -> Self {
        let kind = ApiErrorKind::from_status(status);
        let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
        let detail = parsed
            .as_ref()
            .and_then(|json| {
                json.get("error")
                    .filter(|v| !v.is_null() && v.as_str() != Some(""))
                    .or_else(|| json.get("message").filter(|v| !v.is_null()))
            })
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .or_else(|| kind.default_message().map(ToString::to_string))
            .unwrap_or_else(|| match body_excerpt(body) {
                Some(excerpt) => format!("Unknown Error: {excerpt}"),
                None => "Unknown Error".to_string(),
            });

        Self::Api {
            status,
            kind,
            message: format!("HTTP-error-code: {status}, Error: {detail}"),
        }
    }

    /// Create a protocol violation error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create an undefined variable error
    pub fn undefined_var(variable: impl Into<String>) -> Self {
        Self::UndefinedVariable {
            variable: variable.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Create a stream not found error
    pub fn stream_not_found(stream: impl Into<String>) -> Self {
        Self::StreamNotFound {
            stream: stream.into(),
        }
    }

    /// Create a transform error
    pub fn transform(
        stream: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Transform {
            stream: stream.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Classify this error
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Network(_) => ErrorClass::NetworkTransient,
            Error::Api { status, kind, .. } => match kind {
                ApiErrorKind::RateLimited => ErrorClass::RateLimited,
                ApiErrorKind::Conflict => ErrorClass::WriteConflict,
                ApiErrorKind::Forbidden => ErrorClass::PermissionDenied,
                ApiErrorKind::BadRequest
                | ApiErrorKind::Unauthorized
                | ApiErrorKind::NotFound
                | ApiErrorKind::UnprocessableEntity => ErrorClass::ClientError,
                ApiErrorKind::InternalServerError
                | ApiErrorKind::NotImplemented
                | ApiErrorKind::BadGateway
                | ApiErrorKind::ServiceUnavailable => ErrorClass::ServerTransient,
                ApiErrorKind::Unknown if *status >= 500 => ErrorClass::ServerTransient,
                ApiErrorKind::Unknown if *status >= 400 => ErrorClass::ClientError,
                ApiErrorKind::Unknown => ErrorClass::Other,
            },
            Error::ProtocolViolation { .. } => ErrorClass::ProtocolViolation,
            Error::SubResourceNotFound { .. } => ErrorClass::SubResourceNotFound,
            _ => ErrorClass::Other,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::NetworkTransient
                | ErrorClass::RateLimited
                | ErrorClass::WriteConflict
                | ErrorClass::ServerTransient
        )
    }

    /// Check if this is a 404 from the API
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::Api {
                kind: ApiErrorKind::NotFound,
                ..
            }
        )
    }
}

/// Result type alias for solidafy-helpdesk
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

/// Longest raw body kept in an unknown API error
const BODY_EXCERPT_CHARS: usize = 200;

fn body_excerpt(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    let mut excerpt: String = body.chars().take(BODY_EXCERPT_CHARS).collect();
    if excerpt.len() < body.len() {
        excerpt.push_str("...");
    }
    Some(excerpt)
}
