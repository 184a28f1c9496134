//! Error taxonomy for the doorbells API client.
//!
//! # Design
//! A closed set of failure kinds. Server-reported failures are classified
//! from the `status` field embedded in the response body, not from the HTTP
//! status line. Transport failures stay distinct and are never recast as
//! API failures. Callers dispatch on `kind()` rather than on the variant
//! payloads.

use thiserror::Error;

/// Convenience alias for results produced by this crate.
pub type ApiResult<T> = Result<T, ApiError>;

/// Boxed cause carried by transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by `Session` operations and the layers beneath it.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected the request as malformed (embedded status 400).
    #[error("bad request: {}", display_message(.message))]
    BadRequest { message: Option<String> },

    /// Credentials or auth token were rejected (embedded status 401, or 400
    /// during `authorize`).
    #[error("authorization failed: {}", display_message(.message))]
    Unauthorized { message: Option<String> },

    /// The server reported that a looked-up resource does not exist.
    #[error("resource not found: {}", display_message(.message))]
    NotFound { message: Option<String> },

    /// The server failed internally (embedded status 500).
    #[error("internal server error: {}", display_message(.message))]
    InternalServer { message: Option<String> },

    /// Any other server-reported failure.
    #[error("api error (status {}): {}", display_status(.status), display_message(.message))]
    Api {
        status: Option<i64>,
        message: Option<String>,
    },

    /// Connecting, writing, or reading failed before a complete response
    /// was received.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: BoxError,
    },

    /// A response body did not match the requested shape.
    #[error("failed to decode {shape}: {source}")]
    Decode {
        shape: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A parameter value could not be encoded as UTF-8 text.
    #[error("failed to encode parameter `{field}`: {reason}")]
    Encoding { field: &'static str, reason: String },

    /// Base URL plus resource path did not form a valid URL.
    #[error("malformed request target `{target}`: {source}")]
    MalformedUrl {
        target: String,
        #[source]
        source: url::ParseError,
    },
}

/// Fieldless discriminant of `ApiError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    NotFound,
    InternalServer,
    Api,
    Transport,
    Decode,
    Encoding,
    MalformedUrl,
}

impl ApiError {
    /// Wrap a transport-layer failure.
    pub fn transport(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        ApiError::Transport {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Classify a server-reported failure by the status embedded in its body.
    pub fn from_status(status: i64, message: Option<String>) -> Self {
        match status {
            400 => ApiError::BadRequest { message },
            401 => ApiError::Unauthorized { message },
            500 => ApiError::InternalServer { message },
            other => ApiError::Api {
                status: Some(other),
                message,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::BadRequest { .. } => ErrorKind::BadRequest,
            ApiError::Unauthorized { .. } => ErrorKind::Unauthorized,
            ApiError::NotFound { .. } => ErrorKind::NotFound,
            ApiError::InternalServer { .. } => ErrorKind::InternalServer,
            ApiError::Api { .. } => ErrorKind::Api,
            ApiError::Transport { .. } => ErrorKind::Transport,
            ApiError::Decode { .. } => ErrorKind::Decode,
            ApiError::Encoding { .. } => ErrorKind::Encoding,
            ApiError::MalformedUrl { .. } => ErrorKind::MalformedUrl,
        }
    }

    /// The server-supplied message, if this failure carries one.
    pub fn message(&self) -> Option<&str> {
        match self {
            ApiError::BadRequest { message }
            | ApiError::Unauthorized { message }
            | ApiError::NotFound { message }
            | ApiError::InternalServer { message }
            | ApiError::Api { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// True for failures reported by the server rather than by the client
    /// or the network.
    pub fn is_api_failure(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::BadRequest
                | ErrorKind::Unauthorized
                | ErrorKind::NotFound
                | ErrorKind::InternalServer
                | ErrorKind::Api
        )
    }
}

fn display_message(message: &Option<String>) -> &str {
    message.as_deref().unwrap_or("no message")
}

fn display_status(status: &Option<i64>) -> String {
    status.map_or_else(|| "unknown".to_string(), |s| s.to_string())
}
