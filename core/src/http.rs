//! HTTP requests and responses as plain data, and the transport that moves
//! them over the network.
//!
//! # Design
//! The dispatcher builds `HttpRequest` values without touching the network
//! and hands them to a `Transport`. The default `UreqTransport` performs one
//! blocking round-trip per call; tests substitute an in-memory transport.
//! A transport returns every HTTP status as data and only fails when no
//! complete response was received.

use tracing::warn;

use crate::error::ApiError;

pub const MIME_JSON: &str = "application/json";
pub const MIME_FORM: &str = "application/x-www-form-urlencoded";

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// First header value whose name matches `name` case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Executes one HTTP request and returns the complete response.
///
/// Implementations must not interpret the status code, and must report
/// connection or stream failures as `ApiError::Transport`.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        (**self).execute(request)
    }
}

/// Blocking transport backed by ureq.
///
/// A fresh agent is built for every call, so no connection is ever reused.
/// The response body is read to the end before the connection is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct UreqTransport;

impl UreqTransport {
    pub fn new() -> Self {
        Self
    }

    fn agent() -> ureq::Agent {
        ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let agent = Self::agent();

        // ureq derives Content-Length from the sized body itself.
        let headers = request
            .headers
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case("content-length"));

        let result = match request.method {
            HttpMethod::Get => {
                let mut builder = agent.get(&request.url);
                for (k, v) in headers {
                    builder = builder.header(k.as_str(), v.as_str());
                }
                builder.call()
            }
            HttpMethod::Post => {
                let mut builder = agent.post(&request.url);
                for (k, v) in headers {
                    builder = builder.header(k.as_str(), v.as_str());
                }
                builder.send(request.body.as_deref().unwrap_or("").as_bytes())
            }
        };

        let mut response = result.map_err(|e| {
            warn!(method = request.method.as_str(), error = %e, "request failed");
            ApiError::transport(format!("{} request failed", request.method.as_str()), e)
        })?;

        let status = response.status().as_u16();
        let body = response.body_mut().read_to_string().map_err(|e| {
            warn!(status, error = %e, "failed to read response body");
            ApiError::transport("failed to read response body", e)
        })?;

        Ok(HttpResponse { status, body })
    }
}
