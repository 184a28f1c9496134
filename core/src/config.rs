//! Client configuration.

use serde::Deserialize;

/// Base URL used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";

/// Environment variable that overrides the base URL.
pub const BASE_URL_ENV: &str = "DOORBELLS_API_URL";

/// Where the doorbells API lives. Resource paths such as `/auth` are
/// appended to `base_url` verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Read `DOORBELLS_API_URL`, falling back to the default base URL. A
    /// blank value counts as unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        lookup(BASE_URL_ENV)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .map(Self::new)
            .unwrap_or_default()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(default_base_url())
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
