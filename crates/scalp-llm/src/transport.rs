//! Outbound HTTP seam
//!
//! Every vendor call goes through [`Transport::send`]. Production code uses
//! [`HttpTransport`] (reqwest); tests substitute a mock and assert on the
//! exact request an adapter builds.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{LLMError, Result};

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// HTTP verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST with a JSON body
    Post,
}

/// A vendor request, fully described before it leaves the adapter
#[derive(Clone, PartialEq)]
pub struct HttpRequest {
    /// HTTP verb
    pub method: HttpMethod,
    /// Absolute URL without query string
    pub url: String,
    /// Query parameters, percent-encoded when sent
    pub query: Vec<(String, String)>,
    /// Header name/value pairs
    pub headers: Vec<(String, String)>,
    /// JSON body, for POST
    pub body: Option<Value>,
}

impl HttpRequest {
    /// Build a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Build a POST request with a JSON body
    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    /// Add a query parameter
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    #[cfg(test)]
    pub(crate) fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Look up a header value (case-insensitive name)
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// Header values carry API keys; only names are printed.
impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("query", &self.query)
            .field(
                "headers",
                &self.headers.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            )
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Sends a request and returns the decoded JSON body of a successful response
///
/// Non-success statuses must be mapped with [`LLMError::from_status`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one request/response exchange
    async fn send(&self, request: HttpRequest) -> Result<Value>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn build(&self, request: &HttpRequest) -> Result<reqwest::Request> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        Ok(builder.build()?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(method = ?request.method, url = %request.url))]
    async fn send(&self, request: HttpRequest) -> Result<Value> {
        let response = self.client.execute(self.build(&request)?).await?;

        // Handle errors
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            debug!("Vendor returned HTTP {}", status);
            return Err(LLMError::from_status(status.as_u16(), &error_text));
        }

        response.json::<Value>().await.map_err(|e| {
            LLMError::UnexpectedResponse(format!("Failed to parse response: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builders() {
        let request = HttpRequest::post("https://example.com/v1", json!({"a": 1}))
            .header("Authorization", "Bearer secret")
            .header("Content-Type", "application/json");

        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.header_value("authorization"), Some("Bearer secret"));
        assert_eq!(request.header_value("x-missing"), None);
        assert_eq!(request.body, Some(json!({"a": 1})));

        let get = HttpRequest::get("https://example.com/models");
        assert_eq!(get.method, HttpMethod::Get);
        assert!(get.body.is_none());
    }

    #[test]
    fn test_debug_redacts_header_values() {
        let request = HttpRequest::get("https://example.com").header("x-api-key", "sk-secret");
        let debug = format!("{request:?}");
        assert!(debug.contains("x-api-key"));
        assert!(!debug.contains("sk-secret"));
    }

    #[test]
    fn test_http_transport_creation() {
        let transport = HttpTransport::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(transport.is_ok());
    }

    #[test]
    fn test_query_parameters_are_percent_encoded() {
        let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
        let request = HttpRequest::get("https://example.com/v1beta/models")
            .query("pageSize", "1000")
            .query("pageToken", "Ab+c/d==");

        let built = transport.build(&request).unwrap();
        assert_eq!(
            built.url().as_str(),
            "https://example.com/v1beta/models?pageSize=1000&pageToken=Ab%2Bc%2Fd%3D%3D"
        );
        assert_eq!(request.query_value("pageToken"), Some("Ab+c/d=="));
    }

    #[test]
    fn test_build_without_query_keeps_url() {
        let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
        let request = HttpRequest::post("https://example.com/v1/messages", json!({"a": 1}))
            .header("x-api-key", "k");

        let built = transport.build(&request).unwrap();
        assert_eq!(built.url().as_str(), "https://example.com/v1/messages");
        assert_eq!(built.method(), reqwest::Method::POST);
        assert_eq!(built.headers()["x-api-key"], "k");
    }
}
