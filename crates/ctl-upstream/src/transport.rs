//! HTTP transport seam.
//!
//! The session manager only talks to the network through [`Transport`], so
//! tests can script responses without a server.

use std::time::Duration;

use async_trait::async_trait;
use ctl_core::HttpConfig;
use reqwest::header::SET_COOKIE;
use serde_json::Value;

use crate::error::{UpstreamError, UpstreamResult};

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET.
    Get,
    /// POST with a JSON body.
    Post,
}

/// A request to the upstream API.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    /// Method.
    pub method: Method,
    /// Absolute URL including the query.
    pub url: String,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// JSON body.
    pub body: Option<Value>,
}

impl UpstreamRequest {
    /// Creates a GET request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Creates a POST request with a JSON body.
    #[must_use]
    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Returns the first header with this name.
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A response from the upstream API.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw `Set-Cookie` header values.
    pub set_cookie: Vec<String>,
    /// Parsed JSON body; non-JSON error bodies are kept as a string.
    pub body: Value,
}

impl UpstreamResponse {
    /// Creates a response without cookies.
    #[must_use]
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            set_cookie: Vec::new(),
            body,
        }
    }

    /// Adds a `Set-Cookie` value.
    #[must_use]
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.set_cookie.push(cookie.into());
        self
    }

    /// Returns true for 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Returns true if the upstream rejected the credentials or session.
    #[must_use]
    pub const fn is_auth_rejection(&self) -> bool {
        self.status == 401 || self.status == 403
    }

    /// Converts a non-success status into an error.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::TransientAuth`] for 401/403 and
    /// [`UpstreamError::Http`] for any other non-success status.
    pub fn error_for_status(self) -> UpstreamResult<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let message = match &self.body {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if self.is_auth_rejection() {
            Err(UpstreamError::TransientAuth(format!("status {}", self.status)))
        } else {
            Err(UpstreamError::Http {
                status: self.status,
                message,
            })
        }
    }
}

/// Sends requests to the upstream API.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request.
    ///
    /// Non-success statuses are returned as responses, not errors.
    async fn send(&self, request: UpstreamRequest) -> UpstreamResult<UpstreamResponse>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &HttpConfig) -> UpstreamResult<Self> {
        Self::with_timeouts(config.request_timeout, config.connect_timeout)
    }

    /// Creates a transport with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeouts(request_timeout: Duration, connect_timeout: Duration) -> UpstreamResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: UpstreamRequest) -> UpstreamResult<UpstreamResponse> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let set_cookie = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(String::from)
            .collect();

        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(json) => json,
                Err(e) if (200..300).contains(&status) => {
                    return Err(UpstreamError::decode(format!("invalid JSON body: {e}")));
                }
                Err(_) => Value::String(text),
            }
        };

        tracing::trace!(url = %request.url, status, "Upstream response");
        Ok(UpstreamResponse {
            status,
            set_cookie,
            body,
        })
    }
}
