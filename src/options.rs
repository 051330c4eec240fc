//! Request options shared by controller instances and individual sends
//!
//! A controller is created from an [`InstanceConfig`], a baseline that lives as
//! long as the controller. Each `send()` may pass [`SendOverrides`] with the
//! same shape; overrides only apply to the chain they start and are forgotten
//! once that chain finishes or is cleared.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::retry::BackoffPolicy;

/// HTTP method of a request descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// True for methods whose params travel in the query string
    pub fn uses_query(&self) -> bool {
        matches!(self, Method::Get | Method::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            other => Err(format!("Unsupported request method: {}", other)),
        }
    }
}

/// Scalar value of a request parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(x) => write!(f, "{}", x),
            ParamValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

/// Request parameters keyed by name
pub type Params = BTreeMap<String, ParamValue>;

/// Decision taken by the application after a successful transport call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Dispatch the same request again after exactly this wait
    Retry(Duration),
    /// End the chain successfully
    Finish,
    /// Keep the chain open without a timer; the application will call
    /// `retry()` or `finish()` on the controller later
    Pending,
}

/// Application callback deciding how a chain continues after a success
pub type ContinueFn = Arc<dyn Fn(&Value) -> Continuation + Send + Sync>;

/// Wraps a closure as a [`ContinueFn`]
pub fn continue_with<F>(f: F) -> ContinueFn
where
    F: Fn(&Value) -> Continuation + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Continuation that polls while the collector asks for it
///
/// When the response carries a non-negative integer under `field`, the
/// request is retried after that many milliseconds; otherwise the chain
/// finishes.
///
/// # Examples
///
/// ```
/// use pingback::options::{follow_wait_hint, Continuation};
/// use serde_json::json;
/// use std::time::Duration;
///
/// let cont = follow_wait_hint("ask_in");
/// assert_eq!(cont(&json!({"ask_in": 500})), Continuation::Retry(Duration::from_millis(500)));
/// assert_eq!(cont(&json!({})), Continuation::Finish);
/// ```
pub fn follow_wait_hint(field: impl Into<String>) -> ContinueFn {
    let field = field.into();
    Arc::new(move |response: &Value| {
        match response.get(field.as_str()).and_then(Value::as_u64) {
            Some(ms) => Continuation::Retry(Duration::from_millis(ms)),
            None => Continuation::Finish,
        }
    })
}

/// Partial request description
///
/// Used both as the baseline of a controller (inside [`InstanceConfig`]) and
/// as per-send overrides. Every field is optional; the descriptor builder
/// resolves missing values.
#[derive(Clone, Default)]
pub struct RequestOptions {
    pub url: Option<String>,
    pub method: Option<Method>,
    pub params: Params,
    pub wait: Option<Duration>,
    pub continuation: Option<ContinueFn>,
}

/// Per-call overrides passed to `send()`
pub type SendOverrides = RequestOptions;

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params.extend(params);
        self
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = Some(wait);
        self
    }

    pub fn with_continuation(mut self, continuation: ContinueFn) -> Self {
        self.continuation = Some(continuation);
        self
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("params", &self.params)
            .field("wait", &self.wait)
            .field("continuation", &self.continuation.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Immutable baseline of a request controller
///
/// # Examples
///
/// ```
/// use pingback::options::{InstanceConfig, RequestOptions};
///
/// let config = InstanceConfig::new(
///     RequestOptions::new().with_url("/session").with_param("app_token", "abc"),
/// )
/// .with_max_failures(20);
///
/// assert_eq!(config.defaults.url.as_deref(), Some("/session"));
/// assert_eq!(config.backoff.max_failures, Some(20));
/// ```
#[derive(Debug, Clone, Default)]
pub struct InstanceConfig {
    /// Values used whenever a send does not override them
    pub defaults: RequestOptions,

    /// Schedule applied after transport failures
    pub backoff: BackoffPolicy,
}

impl InstanceConfig {
    pub fn new(defaults: RequestOptions) -> Self {
        Self {
            defaults,
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.backoff = self.backoff.with_max_failures(max_failures);
        self
    }
}
