//! Live endpoint addressing.
//!
//! The live endpoint lives on the same origin as the REST API. The API base
//! URL usually ends in `/api`; that segment is stripped and the WebSocket
//! path appended.

use std::fmt;
use thiserror::Error;
use url::Url;

/// Default WebSocket path on the API origin.
pub const DEFAULT_WEBSOCKET_PATH: &str = "/ws";

/// Endpoint derivation errors.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The base URL could not be parsed.
    #[error("Invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The base URL uses a scheme with no WebSocket equivalent.
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

/// Address of the live endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    /// Derive the endpoint from the REST API base URL.
    ///
    /// `https://host/api` with path `/ws` becomes `wss://host/ws`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or not http(s)/ws(s).
    pub fn from_api_base(api_base: &str, websocket_path: &str) -> Result<Self, EndpointError> {
        let mut url = Url::parse(api_base.trim()).map_err(|source| EndpointError::InvalidUrl {
            url: api_base.to_string(),
            source,
        })?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
        };
        if url.scheme() != scheme && url.set_scheme(scheme).is_err() {
            return Err(EndpointError::UnsupportedScheme(url.scheme().to_string()));
        }

        let base_path = url.path().trim_end_matches('/');
        let base_path = base_path.strip_suffix("/api").unwrap_or(base_path);
        let suffix = websocket_path.trim_matches('/');
        let path = if suffix.is_empty() {
            format!("{}/", base_path)
        } else {
            format!("{}/{}", base_path, suffix)
        };

        url.set_path(&path);
        url.set_query(None);
        url.set_fragment(None);

        Ok(Self { url })
    }

    /// Use a WebSocket URL as-is.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or not ws(s).
    pub fn parse(ws_url: &str) -> Result<Self, EndpointError> {
        let url = Url::parse(ws_url.trim()).map_err(|source| EndpointError::InvalidUrl {
            url: ws_url.to_string(),
            source,
        })?;
        match url.scheme() {
            "ws" | "wss" => Ok(Self { url }),
            other => Err(EndpointError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Get the endpoint URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Whether the endpoint uses TLS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "wss"
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}
