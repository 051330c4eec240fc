//! Event tracking requests
//!
//! Turns the parameters of a tracked event into overrides for a controller
//! pointed at the collector's event endpoint. Revenue is only reported together
//! with a currency and never when negative; callback and partner params travel
//! as JSON objects encoded into a single param each, merged over the
//! caller-owned [`GlobalParams`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::error;

use crate::error::{ControllerError, Result};
use crate::options::{Method, RequestOptions, SendOverrides};

/// Collector path for event tracking
pub const EVENT_PATH: &str = "/event";

/// Callback and partner params attached to every tracked event
///
/// Kept in memory only. A key set on the event itself wins over the same
/// global key.
///
/// # Examples
///
/// ```
/// use pingback::event::GlobalParams;
///
/// let mut globals = GlobalParams::default();
/// globals.add_callback_params([("user", "u1"), ("plan", "basic")]);
/// globals.remove_callback_param("plan");
///
/// assert_eq!(globals.callback().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalParams {
    callback: BTreeMap<String, String>,
    partner: BTreeMap<String, String>,
}

impl GlobalParams {
    /// Adds callback params, replacing existing keys
    pub fn add_callback_params<K, V>(&mut self, params: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        extend_pairs(&mut self.callback, params);
    }

    /// Adds partner params, replacing existing keys
    pub fn add_partner_params<K, V>(&mut self, params: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        extend_pairs(&mut self.partner, params);
    }

    /// Returns false when the key was not set
    pub fn remove_callback_param(&mut self, key: &str) -> bool {
        self.callback.remove(key).is_some()
    }

    /// Returns false when the key was not set
    pub fn remove_partner_param(&mut self, key: &str) -> bool {
        self.partner.remove(key).is_some()
    }

    pub fn clear_callback_params(&mut self) {
        self.callback.clear();
    }

    pub fn clear_partner_params(&mut self) {
        self.partner.clear();
    }

    pub fn callback(&self) -> &BTreeMap<String, String> {
        &self.callback
    }

    pub fn partner(&self) -> &BTreeMap<String, String> {
        &self.partner
    }
}

fn extend_pairs<K, V>(map: &mut BTreeMap<String, String>, pairs: impl IntoIterator<Item = (K, V)>)
where
    K: Into<String>,
    V: Into<String>,
{
    map.extend(pairs.into_iter().map(|(key, value)| (key.into(), value.into())));
}

/// Parameters of one tracked event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventParams {
    pub event_token: String,
    pub revenue: Option<f64>,
    pub currency: Option<String>,
    pub deduplication_id: Option<String>,
    pub callback_params: Vec<(String, String)>,
    pub partner_params: Vec<(String, String)>,
}

impl EventParams {
    pub fn new(event_token: impl Into<String>) -> Self {
        Self {
            event_token: event_token.into(),
            ..Self::default()
        }
    }

    pub fn with_revenue(mut self, revenue: f64, currency: impl Into<String>) -> Self {
        self.revenue = Some(revenue);
        self.currency = Some(currency.into());
        self
    }

    pub fn with_callback_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.callback_params.push((key.into(), value.into()));
        self
    }

    pub fn with_partner_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.partner_params.push((key.into(), value.into()));
        self
    }

    /// Builds the overrides that deliver this event
    ///
    /// Param keys are camelCase like the injected `createdAt`.
    ///
    /// # Arguments
    /// * `globals` - Callback and partner params shared by every event
    ///
    /// # Returns
    /// * `Result<SendOverrides>` - `POST /event` overrides, or
    ///   [`ControllerError::MissingEventToken`] when the token is empty
    ///
    /// # Examples
    ///
    /// ```
    /// use pingback::event::{EventParams, GlobalParams};
    /// use pingback::options::ParamValue;
    ///
    /// let overrides = EventParams::new("abc123")
    ///     .with_revenue(12.5, "EUR")
    ///     .into_overrides(&GlobalParams::default())
    ///     .unwrap();
    ///
    /// assert_eq!(overrides.url.as_deref(), Some("/event"));
    /// assert_eq!(overrides.params["revenue"], ParamValue::Str("12.50000".into()));
    /// ```
    pub fn into_overrides(self, globals: &GlobalParams) -> Result<SendOverrides> {
        if self.event_token.trim().is_empty() {
            let err = ControllerError::MissingEventToken;
            error!("{}", err);
            return Err(err);
        }

        let mut overrides = RequestOptions::new()
            .with_url(EVENT_PATH)
            .with_method(Method::Post)
            .with_param("eventToken", self.event_token);

        if let (Some(revenue), Some(currency)) = (self.revenue, self.currency) {
            if revenue >= 0.0 && !currency.is_empty() {
                overrides = overrides
                    .with_param("revenue", format!("{:.5}", revenue))
                    .with_param("currency", currency);
            }
        }

        if let Some(id) = self.deduplication_id.filter(|id| !id.is_empty()) {
            overrides = overrides.with_param("deduplicationId", id);
        }

        if let Some(encoded) = encode_merged(&globals.callback, self.callback_params) {
            overrides = overrides.with_param("callbackParams", encoded);
        }
        if let Some(encoded) = encode_merged(&globals.partner, self.partner_params) {
            overrides = overrides.with_param("partnerParams", encoded);
        }

        Ok(overrides)
    }
}

// Event pairs go over the globals, later pairs win on duplicate keys
fn encode_merged(globals: &BTreeMap<String, String>, pairs: Vec<(String, String)>) -> Option<String> {
    let mut map = globals.clone();
    map.extend(pairs);
    if map.is_empty() {
        return None;
    }
    serde_json::to_string(&map).ok()
}
