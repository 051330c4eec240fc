//! Transport layer for collector requests
//!
//! The controller only needs something that takes a [`Request`] and eventually
//! succeeds with a JSON value or fails. [`Transport`] is that seam;
//! [`HttpTransport`] is the reqwest implementation used by the binary:
//! - Relative request urls are resolved against a base url
//! - GET and DELETE send params as a query string
//! - POST and PUT send params as a form-encoded body
//! - Any non-2xx status counts as a failure
//!
//! The transport performs no retries of its own; failures go back to the
//! controller's backoff schedule.

use anyhow::{anyhow, Context, Result};
use futures::future::BoxFuture;
use reqwest::{Client, ClientBuilder};
use serde_json::Value;
use std::time::Duration;

use tracing::debug;

use crate::descriptor::Request;
use crate::options::Method;

/// Sends a request descriptor to the collector
pub trait Transport: Send + Sync {
    /// Performs one attempt
    ///
    /// Only success and failure are distinguished by the caller; the error is
    /// opaque.
    fn send(&self, request: Request) -> BoxFuture<'static, Result<Value>>;
}

/// HTTP client for a tracking collector
///
/// # Examples
///
/// ```
/// use pingback::http::HttpTransport;
/// use std::time::Duration;
///
/// # fn example() -> anyhow::Result<()> {
/// let transport = HttpTransport::new("https://collector.example.com", Duration::from_secs(5))?;
/// assert_eq!(transport.resolve("/event"), "https://collector.example.com/event");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Creates a transport with pooled connections
    ///
    /// # Arguments
    /// * `base_url` - Collector origin that relative request urls are resolved against
    /// * `timeout` - Per-request timeout
    ///
    /// # Returns
    /// * `Result<Self>` - A configured transport or error if the client could not be built
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("pingback/", env!("CARGO_PKG_VERSION")))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Absolute url for a request url
    ///
    /// Urls that already carry a scheme are used as they are.
    pub fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if url.starts_with('/') {
            format!("{}{}", self.base_url, url)
        } else {
            format!("{}/{}", self.base_url, url)
        }
    }

    async fn dispatch(client: Client, url: String, request: Request) -> Result<Value> {
        let form: Vec<(String, String)> = request
            .params
            .iter()
            .map(|(key, value)| (key.clone(), value.to_string()))
            .collect();

        let builder = match request.method {
            Method::Get => client.get(&url),
            Method::Post => client.post(&url),
            Method::Put => client.put(&url),
            Method::Delete => client.delete(&url),
        };
        let builder = if request.method.uses_query() {
            builder.query(&form)
        } else {
            builder.form(&form)
        };

        debug!("Dispatching {} {}", request.method, url);
        let response = builder
            .send()
            .await
            .with_context(|| format!("Failed to send {} request to {}", request.method, url))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            return Err(anyhow!("{} {} failed with status: {}", request.method, url, status));
        }

        Ok(parse_body(&body))
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: Request) -> BoxFuture<'static, Result<Value>> {
        let client = self.client.clone();
        let url = self.resolve(&request.url);
        Box::pin(Self::dispatch(client, url, request))
    }
}

/// Interprets a collector response body
///
/// Empty bodies become `{}` and non-JSON bodies are wrapped as `{"body": ...}`
/// so continuations always see a JSON value.
pub fn parse_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(body).unwrap_or_else(|_| serde_json::json!({ "body": body }))
}
