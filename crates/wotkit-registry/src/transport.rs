//! Registry transport.
//!
//! The synchronizer talks to the thing registry through the
//! [`RegistryTransport`] trait; [`HttpTransport`] is the HTTP implementation.
//! Tests substitute their own transport or point `HttpTransport` at a local
//! server.
//!
//! # Design
//!
//! - **One request, one call**: no retry, no connection state
//! - **Non-success is an error**: any non-2xx status becomes
//!   `Error::RegistryTransport` carrying the status
//! - **Bounded**: every request is subject to the configured timeout

use reqwest::Method;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace, warn};
use wotkit_core::constants::{DEFAULT_REGISTRY_BASE_URL, DEFAULT_REQUEST_TIMEOUT_MS};
use wotkit_core::{Error, GatewayConfig, Result};

/// HTTP method of a registry request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl RegistryMethod {
    fn as_reqwest(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Post => Method::POST,
            Self::Put => Method::PUT,
            Self::Delete => Method::DELETE,
        }
    }
}

impl std::fmt::Display for RegistryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        })
    }
}

/// A request relative to the registry base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryRequest {
    pub method: RegistryMethod,

    /// Path below the base URL, starting with `/`.
    pub path: String,

    /// JSON body, if any.
    pub body: Option<serde_json::Value>,
}

impl RegistryRequest {
    /// `GET path`.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: RegistryMethod::Get,
            path: path.into(),
            body: None,
        }
    }

    /// `POST path` with a JSON body.
    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: RegistryMethod::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    /// `PUT path` with a JSON body.
    pub fn put(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: RegistryMethod::Put,
            path: path.into(),
            body: Some(body),
        }
    }

    /// `DELETE path`.
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: RegistryMethod::Delete,
            path: path.into(),
            body: None,
        }
    }
}

/// A successful registry response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryResponse {
    pub status: u16,
    pub body: String,
}

impl RegistryResponse {
    /// Parse the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Sends requests to the thing registry.
pub trait RegistryTransport: Send + Sync + 'static {
    /// Perform one request.
    ///
    /// # Errors
    ///
    /// Returns `Error::RegistryTransport` if the request could not be
    /// delivered or the registry answered with a non-success status.
    fn send(&self, request: RegistryRequest) -> impl Future<Output = Result<RegistryResponse>> + Send;
}

/// Configuration for [`HttpTransport`].
///
/// # Example
///
/// ```
/// use wotkit_registry::HttpTransportConfig;
/// use std::time::Duration;
///
/// let config = HttpTransportConfig {
///     base_url: "http://10.0.0.5:9090/wpx".to_string(),
///     timeout: Duration::from_millis(5000),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTransportConfig {
    /// Registry base URL, e.g. `http://127.0.0.1:9090/wpx`.
    pub base_url: String,

    /// Timeout of each request.
    pub timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REGISTRY_BASE_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

impl From<&GatewayConfig> for HttpTransportConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            base_url: config.registry_base_url.clone(),
            timeout: config.request_timeout(),
        }
    }
}

/// HTTP registry transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for the registry at `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns `Error::RegistryTransport` if the HTTP client can not be built.
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Registry base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl RegistryTransport for HttpTransport {
    async fn send(&self, request: RegistryRequest) -> Result<RegistryResponse> {
        let url = self.url(&request.path);
        debug!(method = %request.method, url = %url, "Registry request");

        let mut builder = self.client.request(request.method.as_reqwest(), &url);
        if let Some(body) = &request.body {
            trace!(body = %body, "Registry request body");
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(method = %request.method, url = %url, error = %e, "Registry request failed");
            Error::transport(format!("{} {url}: {e}", request.method))
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            warn!(method = %request.method, url = %url, status = status.as_u16(), "Registry rejected request");
            return Err(Error::transport_status(
                status.as_u16(),
                format!("{} {url}: {body}", request.method),
            ));
        }

        trace!(status = status.as_u16(), body = %body, "Registry response");
        Ok(RegistryResponse {
            status: status.as_u16(),
            body,
        })
    }
}
