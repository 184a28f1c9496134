//! Response envelope and the JSON shapes decoded from it.
//!
//! A `JsonResponse` keeps the raw body; each `decode` call parses it afresh
//! against the requested shape, so one body may be read both as a
//! `StatusEnvelope` and as a payload shape.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::ApiError;
use crate::http::HttpResponse;
use crate::types::{Message, Tag};

/// HTTP status code paired with the raw response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonResponse {
    status: u16,
    body: String,
}

impl JsonResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Decode the body as `T`. Not cached.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|source| ApiError::Decode {
            shape: std::any::type_name::<T>(),
            source,
        })
    }

    /// Decode the body as the generic `{status, msg}` failure shape.
    pub fn status_envelope(&self) -> Result<StatusEnvelope, ApiError> {
        self.decode()
    }
}

impl From<HttpResponse> for JsonResponse {
    fn from(response: HttpResponse) -> Self {
        Self::new(response.status, response.body)
    }
}

/// Body of a successful `/auth` call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthData {
    pub token: String,
}

/// Server-reported status carried by every failure body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusEnvelope {
    pub status: i64,
    #[serde(rename = "msg", default)]
    pub message: Option<String>,
}

impl StatusEnvelope {
    /// Classify by the embedded status: 400, 401, 500 get their own kinds,
    /// everything else is a generic API failure.
    pub fn into_error(self) -> ApiError {
        ApiError::from_status(self.status, self.message)
    }
}

/// Body of `GET /messages`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageList {
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Body of `GET /tags`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TagList {
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub tags: Vec<Tag>,
}
