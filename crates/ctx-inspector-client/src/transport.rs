//! Request transport.
//!
//! The transport only moves bytes: it never interprets the body. Status
//! handling and decoding live in [`crate::client`].

use std::sync::Arc;

use async_trait::async_trait;
use ctx_inspector_core::{InspectorError, Result};
use serde_json::Value;

use crate::config::InspectorConfig;

/// HTTP method used by the backend API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// DELETE
    Delete,
}

impl Method {
    /// Upper-case method name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

/// Raw outcome of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// Whether the status is 2xx.
    pub success: bool,
    /// HTTP status code.
    pub status: u16,
    /// Body text, unparsed.
    pub body: String,
}

impl TransportResponse {
    /// Build a response, deriving `success` from the status.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            success: (200..300).contains(&status),
            status,
            body: body.into(),
        }
    }
}

/// Trait for backend communication.
///
/// This trait abstracts the HTTP layer, allowing scripted implementations in
/// tests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one request against `base_url` + `path`.
    ///
    /// # Errors
    ///
    /// Returns a network error if no response was received. Non-2xx statuses
    /// are not errors at this layer.
    async fn request(
        &self,
        base_url: &str,
        path: &str,
        method: Method,
        body: Option<&Value>,
    ) -> Result<TransportResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn request(
        &self,
        base_url: &str,
        path: &str,
        method: Method,
        body: Option<&Value>,
    ) -> Result<TransportResponse> {
        (**self).request(base_url, path, method, body).await
    }
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with the timeouts from `config`.
    ///
    /// # Errors
    ///
    /// Returns a network error if the HTTP client cannot be built.
    pub fn new(config: &InspectorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| InspectorError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Create a transport with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        base_url: &str,
        path: &str,
        method: Method,
        body: Option<&Value>,
    ) -> Result<TransportResponse> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), path);

        let mut request = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Delete => self.client.delete(&url),
        };
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            InspectorError::Network(format!("{} {path} failed: {e}", method.as_str()))
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            InspectorError::Network(format!("failed to read response body: {e}"))
        })?;

        Ok(TransportResponse::new(status, body))
    }
}
