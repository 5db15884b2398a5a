//! Gateway configuration.
//!
//! [`GatewayConfig`] is read from a camelCase JSON document. Every field has a
//! default, so an empty object `{}` is a valid (if anonymous) configuration:
//!
//! ```json
//! {
//!   "thingId": "pi-gateway-01",
//!   "reportingIntervalMs": 1000,
//!   "historyCapacity": 10,
//!   "registryBaseUrl": "http://129.254.81.55:9090/wpx",
//!   "unknownModelPolicy": "generic",
//!   "retriggerPolicy": "replace"
//! }
//! ```

use crate::constants::{
    DEFAULT_ACCESS_BASE_PATH, DEFAULT_ACCESS_PORT, DEFAULT_FILTER_MAX, DEFAULT_FILTER_MIN,
    DEFAULT_HISTORY_CAPACITY, DEFAULT_OPERATION_PREFIX, DEFAULT_REGISTRY_BASE_URL,
    DEFAULT_REGISTRY_COLLECTION, DEFAULT_REPORTING_INTERVAL_MS, DEFAULT_REQUEST_TIMEOUT_MS,
};
use crate::error::{Error, Result};
use crate::types::GatewayMetadata;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// What the capability mapper does with a URL that matches no known model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownModelPolicy {
    /// Fail sensor creation with `Error::UnknownModel`.
    Reject,
    /// Accept the sensor with category `Unknown` and no attributes.
    #[default]
    Generic,
    /// Accept the sensor with an empty descriptor.
    Empty,
}

/// What the actuator controller does when a command targets an address whose
/// previous command is still waiting for its timed clear.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetriggerPolicy {
    /// Wait until the pending clear fires, then issue the new command.
    Queue,
    /// Cancel the pending timer, clear and release now, then issue the new command.
    #[default]
    Replace,
    /// Fail the new command with `Error::ActuatorBusy`.
    Reject,
}

/// Inclusive numeric range used by the default range filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeConfig {
    pub min: f64,
    pub max: f64,
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            min: DEFAULT_FILTER_MIN,
            max: DEFAULT_FILTER_MAX,
        }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayConfig {
    /// Identity of this gateway in the thing registry.
    pub thing_id: String,

    /// Default sampling interval when the driver recommends none.
    pub reporting_interval_ms: u64,

    /// Number of `(time, value)` pairs kept per sensor.
    pub history_capacity: usize,

    /// Base URL of the thing registry.
    pub registry_base_url: String,

    /// Registry collection holding thing documents.
    pub registry_collection: String,

    /// Prefix of advertised operation URIs.
    pub operation_prefix: String,

    /// Host advertised in the thing access address.
    pub access_host: String,

    /// Port advertised in the thing access address.
    pub access_port: u16,

    /// Base path advertised in the thing access address.
    pub access_base_path: String,

    /// Timeout of registry HTTP calls.
    pub request_timeout_ms: u64,

    /// Capability mapper policy for unrecognized models.
    pub unknown_model_policy: UnknownModelPolicy,

    /// Actuator controller policy for re-triggered addresses.
    pub retrigger_policy: RetriggerPolicy,

    /// Range accepted by the default pipeline filter.
    pub filter: RangeConfig,

    /// Addressing URLs of sensors to create at startup.
    pub sensors: Vec<String>,

    /// Metadata published when registering the thing.
    pub metadata: GatewayMetadata,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            thing_id: "wotkit-gateway".to_string(),
            reporting_interval_ms: DEFAULT_REPORTING_INTERVAL_MS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            registry_base_url: DEFAULT_REGISTRY_BASE_URL.to_string(),
            registry_collection: DEFAULT_REGISTRY_COLLECTION.to_string(),
            operation_prefix: DEFAULT_OPERATION_PREFIX.to_string(),
            access_host: "127.0.0.1".to_string(),
            access_port: DEFAULT_ACCESS_PORT,
            access_base_path: DEFAULT_ACCESS_BASE_PATH.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            unknown_model_policy: UnknownModelPolicy::default(),
            retrigger_policy: RetriggerPolicy::default(),
            filter: RangeConfig::default(),
            sensors: Vec::new(),
            metadata: GatewayMetadata::default(),
        }
    }
}

impl GatewayConfig {
    /// Create a configuration for the given thing id.
    pub fn new(thing_id: impl Into<String>) -> Self {
        Self {
            thing_id: thing_id.into(),
            ..Default::default()
        }
    }

    /// Parse and validate a configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use wotkit_core::GatewayConfig;
    ///
    /// # fn example() -> wotkit_core::Result<()> {
    /// let config = GatewayConfig::from_json_file("config/gateway.json")?;
    /// println!("thing id: {}", config.thing_id);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Set the default reporting interval.
    pub fn reporting_interval(mut self, interval: Duration) -> Self {
        self.reporting_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the history capacity.
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Set the registry base URL.
    pub fn registry_base_url(mut self, url: impl Into<String>) -> Self {
        self.registry_base_url = url.into();
        self
    }

    /// Set the unknown model policy.
    pub fn unknown_model_policy(mut self, policy: UnknownModelPolicy) -> Self {
        self.unknown_model_policy = policy;
        self
    }

    /// Set the actuator re-trigger policy.
    pub fn retrigger_policy(mut self, policy: RetriggerPolicy) -> Self {
        self.retrigger_policy = policy;
        self
    }

    /// Set the gateway metadata.
    pub fn metadata(mut self, metadata: GatewayMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Default sampling interval as a `Duration`.
    #[must_use]
    pub fn reporting_interval_duration(&self) -> Duration {
        Duration::from_millis(self.reporting_interval_ms)
    }

    /// Registry request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Address at which the gateway is reachable, e.g. `http://10.0.0.2:3000/wotkit`.
    #[must_use]
    pub fn access_address(&self) -> String {
        format!(
            "http://{}:{}{}",
            self.access_host, self.access_port, self.access_base_path
        )
    }

    /// Check the configuration for values the gateway cannot run with.
    ///
    /// # Errors
    /// Returns `Error::Config` if the thing id is empty, the history capacity
    /// is zero, the reporting interval is zero, the filter range is inverted or
    /// the registry base URL is not an http(s) URL.
    pub fn validate(&self) -> Result<()> {
        if self.thing_id.trim().is_empty() {
            return Err(Error::config("thingId must not be empty"));
        }
        if self.history_capacity == 0 {
            return Err(Error::config("historyCapacity must be at least 1"));
        }
        if self.reporting_interval_ms == 0 {
            return Err(Error::config("reportingIntervalMs must be positive"));
        }
        if self.filter.min > self.filter.max {
            return Err(Error::config(format!(
                "filter range is inverted: {} > {}",
                self.filter.min, self.filter.max
            )));
        }
        if !(self.registry_base_url.starts_with("http://")
            || self.registry_base_url.starts_with("https://"))
        {
            return Err(Error::config(format!(
                "registryBaseUrl must be an http(s) URL, got {}",
                self.registry_base_url
            )));
        }
        Ok(())
    }
}
