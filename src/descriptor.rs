//! Request descriptor builder
//!
//! Merges a controller's baseline options with the overrides of a single
//! `send()` into the effective values one chain runs with. Scalars (url,
//! method, wait, continuation) resolve override first, then instance, then a
//! hard default. Params are a shallow union where the override wins per key,
//! on top of the injected `createdAt` timestamp.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::error::{ControllerError, Result};
use crate::options::{Continuation, ContinueFn, Method, ParamValue, Params, RequestOptions};

/// Wait before the first attempt when nothing else is configured
pub const DEFAULT_WAIT: Duration = Duration::from_millis(150);

/// Param key carrying the chain creation timestamp
pub const CREATED_AT_PARAM: &str = "createdAt";

/// What the transport receives for every attempt of a chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub url: String,
    pub method: Method,
    pub params: Params,
}

/// Effective values of one chain
#[derive(Clone)]
pub struct Descriptor {
    pub request: Request,
    /// Wait before the first attempt
    pub wait: Duration,
    pub continuation: ContinueFn,
    /// Timestamp captured when the descriptor was built
    pub created_at: i64,
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("request", &self.request)
            .field("wait", &self.wait)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Default continuation: finish as soon as the transport succeeds
pub fn finish_immediately() -> ContinueFn {
    Arc::new(|_| Continuation::Finish)
}

/// Builds the effective descriptor for one chain
///
/// The url is resolved before anything else. A blank url counts as absent, so
/// a blank override falls back to the instance url. When neither side has one
/// the clock is not consulted and [`ControllerError::MissingUrl`] is returned.
///
/// # Arguments
/// * `instance` - Baseline options of the controller
/// * `overrides` - Options passed to this particular send
/// * `clock` - Source of the `createdAt` timestamp, queried once
///
/// # Returns
/// * `Result<Descriptor>` - The merged descriptor or a configuration error
///
/// # Examples
///
/// ```
/// use pingback::clock::SystemClock;
/// use pingback::descriptor::build;
/// use pingback::options::{Method, RequestOptions};
///
/// let instance = RequestOptions::new().with_url("/e").with_param("a", 1);
/// let overrides = RequestOptions::new().with_method(Method::Post).with_param("b", "x");
///
/// let descriptor = build(&instance, &overrides, &SystemClock).unwrap();
/// assert_eq!(descriptor.request.url, "/e");
/// assert_eq!(descriptor.request.method, Method::Post);
/// assert_eq!(descriptor.request.params.len(), 3); // a, b and createdAt
/// ```
pub fn build(
    instance: &RequestOptions,
    overrides: &RequestOptions,
    clock: &dyn Clock,
) -> Result<Descriptor> {
    let url = present(&overrides.url)
        .or_else(|| present(&instance.url))
        .cloned()
        .ok_or(ControllerError::MissingUrl)?;

    let method = overrides.method.or(instance.method).unwrap_or_default();
    let wait = overrides.wait.or(instance.wait).unwrap_or(DEFAULT_WAIT);
    let continuation = overrides
        .continuation
        .clone()
        .or_else(|| instance.continuation.clone())
        .unwrap_or_else(finish_immediately);

    let created_at = clock.timestamp_ms();

    let mut params = Params::new();
    params.insert(CREATED_AT_PARAM.to_string(), ParamValue::Int(created_at));
    params.extend(instance.params.clone());
    params.extend(overrides.params.clone());

    Ok(Descriptor {
        request: Request { url, method, params },
        wait,
        continuation,
        created_at,
    })
}

fn present(url: &Option<String>) -> Option<&String> {
    url.as_ref().filter(|url| !url.trim().is_empty())
}
