//! Derives the API base path and endpoint URLs from the location the
//! dashboard is served from.

use url::Url;

use crate::error::ConfigError;

/// Base path used when the dashboard runs against a development proxy.
pub const DEV_API_BASE: &str = "/api/debug";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    Development,
    #[default]
    Production,
}

/// The pieces of the hosting page's URL that endpoint derivation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    pub secure: bool,
    /// Host including a non-default port, e.g. `example.com:8443`.
    pub host: String,
    pub path: String,
}

impl PageLocation {
    pub fn parse(raw: &str) -> Result<PageLocation, ConfigError> {
        let url = Url::parse(raw).map_err(|source| ConfigError::DashboardUrl {
            value: raw.to_string(),
            source,
        })?;
        Self::from_url(&url)
    }

    pub fn from_url(url: &Url) -> Result<PageLocation, ConfigError> {
        let secure = match url.scheme() {
            "https" => true,
            "http" => false,
            _ => return Err(ConfigError::UnsupportedScheme(url.to_string())),
        };
        let host = url
            .host_str()
            .ok_or_else(|| ConfigError::MissingHost(url.to_string()))?;
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        Ok(PageLocation {
            secure,
            host,
            path: url.path().to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPaths {
    location: PageLocation,
    mode: BuildMode,
}

impl ApiPaths {
    pub fn new(location: PageLocation, mode: BuildMode) -> Self {
        Self { location, mode }
    }

    pub fn location(&self) -> &PageLocation {
        &self.location
    }

    /// In production the API is rooted where the dashboard lives, minus a
    /// trailing `/index.html`, a trailing `/`, and a trailing `/ui` segment.
    pub fn base_path(&self) -> String {
        if self.mode == BuildMode::Development {
            return DEV_API_BASE.to_string();
        }

        let mut path = self.location.path.as_str();
        if let Some(stripped) = path.strip_suffix("/index.html") {
            path = stripped;
        }
        if let Some(stripped) = path.strip_suffix('/') {
            path = stripped;
        }
        if let Some(stripped) = path.strip_suffix("/ui") {
            path = stripped;
        }
        path.to_string()
    }

    pub fn api_url(&self, endpoint: &str) -> String {
        let scheme = if self.location.secure { "https" } else { "http" };
        format!(
            "{scheme}://{}{}{}",
            self.location.host,
            self.base_path(),
            normalize_endpoint(endpoint)
        )
    }

    pub fn websocket_url(&self, endpoint: &str) -> String {
        let scheme = if self.location.secure { "wss" } else { "ws" };
        format!(
            "{scheme}://{}{}{}",
            self.location.host,
            self.base_path(),
            normalize_endpoint(endpoint)
        )
    }
}

fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.starts_with('/') {
        endpoint.to_string()
    } else {
        format!("/{endpoint}")
    }
}
