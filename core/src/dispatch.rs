//! Request dispatch: turns a resource path, query parameters and an optional
//! body into an `HttpRequest`, runs it through a `Transport`, and wraps the
//! result in a `JsonResponse`.
//!
//! # Design
//! `build_*` methods are pure and return the request as data; `send` does the
//! I/O. The dispatcher never looks at the status code. Authenticated calls
//! carry the token as the `auth_token` query parameter, appended after any
//! caller-supplied parameters.

use tracing::debug;

use crate::config::ClientConfig;
use crate::endpoint::{concat_query, Endpoints};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, Transport, UreqTransport, MIME_FORM, MIME_JSON};
use crate::params::Params;
use crate::response::JsonResponse;

/// Query parameter that carries the session token.
pub const AUTH_TOKEN_PARAM: &str = "auth_token";

/// Builds and executes requests against one base URL.
#[derive(Debug, Clone)]
pub struct Dispatcher<T = UreqTransport> {
    endpoints: Endpoints,
    transport: T,
}

impl Dispatcher<UreqTransport> {
    /// Dispatcher over the default blocking transport.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        Ok(Self::with_transport(
            Endpoints::from_config(config)?,
            UreqTransport::new(),
        ))
    }
}

impl<T: Transport> Dispatcher<T> {
    pub fn with_transport(endpoints: Endpoints, transport: T) -> Self {
        Self {
            endpoints,
            transport,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn build_get(&self, resource: &str, query: Option<Params>) -> Result<HttpRequest, ApiError> {
        let url = self.endpoints.endpoint(&concat_query(resource, query))?;
        Ok(HttpRequest {
            method: HttpMethod::Get,
            url: url.into(),
            headers: vec![("Accept".to_string(), MIME_JSON.to_string())],
            body: None,
        })
    }

    /// `body` is sent as UTF-8 text; pass `Params::finish()` output for a
    /// form body or any raw text.
    pub fn build_post(
        &self,
        resource: &str,
        query: Option<Params>,
        body: Option<String>,
    ) -> Result<HttpRequest, ApiError> {
        let url = self.endpoints.endpoint(&concat_query(resource, query))?;
        let body = body.unwrap_or_default();
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: url.into(),
            headers: vec![
                ("Accept".to_string(), MIME_JSON.to_string()),
                ("Content-Type".to_string(), MIME_FORM.to_string()),
                ("Content-Length".to_string(), body.len().to_string()),
            ],
            body: Some(body),
        })
    }

    /// Execute `request` and return its status and body, whatever the status.
    pub fn send(&self, request: &HttpRequest) -> Result<JsonResponse, ApiError> {
        debug!(
            method = request.method.as_str(),
            resource = resource_path(&request.url),
            "dispatching request"
        );
        let response = self.transport.execute(request)?;
        debug!(
            method = request.method.as_str(),
            resource = resource_path(&request.url),
            status = response.status,
            "received response"
        );
        Ok(response.into())
    }

    pub fn get(&self, resource: &str, query: Option<Params>) -> Result<JsonResponse, ApiError> {
        self.send(&self.build_get(resource, query)?)
    }

    pub fn get_authed(
        &self,
        resource: &str,
        token: &str,
        query: Option<Params>,
    ) -> Result<JsonResponse, ApiError> {
        self.get(resource, Some(with_token(query, token)))
    }

    pub fn post(
        &self,
        resource: &str,
        query: Option<Params>,
        body: Option<String>,
    ) -> Result<JsonResponse, ApiError> {
        self.send(&self.build_post(resource, query, body)?)
    }

    pub fn post_authed(
        &self,
        resource: &str,
        token: &str,
        query: Option<Params>,
        body: Option<String>,
    ) -> Result<JsonResponse, ApiError> {
        self.post(resource, Some(with_token(query, token)), body)
    }
}

/// Append `auth_token` to `query`, or make it the only parameter.
pub fn with_token(query: Option<Params>, token: &str) -> Params {
    match query {
        Some(params) => params.add_param(AUTH_TOKEN_PARAM, token),
        None => Params::start_with(AUTH_TOKEN_PARAM, token),
    }
}

/// The URL without its query string, so tokens stay out of the logs.
fn resource_path(url: &str) -> &str {
    url.split_once('?').map_or(url, |(path, _)| path)
}
