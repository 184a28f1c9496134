//! Endpoint resolution: base URL + resource path + optional query string.

use url::Url;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::params::Params;

/// Joins resource paths onto a fixed, pre-validated base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: String,
}

impl Endpoints {
    /// Validate `base_url` and strip any trailing `/`.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|source| ApiError::MalformedUrl {
            target: base_url.clone(),
            source,
        })?;
        Ok(Self { base_url })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::new(&config.base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Concatenate the base URL and `resource` (which may already carry a
    /// query string) and check the result is a valid URL.
    pub fn endpoint(&self, resource: &str) -> Result<Url, ApiError> {
        let target = format!("{}{resource}", self.base_url);
        Url::parse(&target).map_err(|source| ApiError::MalformedUrl { target, source })
    }
}

/// `resource` unchanged when `query` is absent or empty, otherwise
/// `resource?query`.
pub fn concat_query(resource: &str, query: Option<Params>) -> String {
    match query {
        Some(params) if !params.is_empty() => format!("{resource}?{}", params.finish()),
        _ => resource.to_string(),
    }
}
