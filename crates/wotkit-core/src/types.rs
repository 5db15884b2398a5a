use crate::{
    Result,
    constants::{SENSOR_URL_SCHEME, SENSOR_URL_SEGMENTS, SENSOR_URL_SEPARATOR},
    error::Error,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Value carried by a sensor reading.
///
/// Serialized untagged so that `21.5`, `true` and `"on"` map directly to the
/// matching variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum SensorValue {
    /// No value (e.g. a status-only report).
    #[default]
    Null,
    /// Numeric measurement.
    Number(f64),
    /// Boolean state (motion, switches).
    Bool(bool),
    /// Free-form text value.
    Text(String),
}

impl SensorValue {
    /// Get the numeric value if this is a number.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Check if this value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<f64> for SensorValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for SensorValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<bool> for SensorValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for SensorValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// A single reading event flowing through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Sensor id the reading belongs to.
    pub id: String,

    /// Measured value.
    pub value: SensorValue,

    /// Driver-reported status (e.g. "ok", "error").
    pub status: Option<String>,

    /// Time the reading was taken.
    pub time: DateTime<Utc>,

    /// Driver-reported reading type.
    #[serde(rename = "type")]
    pub kind: Option<String>,

    /// Optional driver message.
    pub message: Option<String>,
}

impl Reading {
    /// Create a reading stamped with the current time.
    pub fn new(id: impl Into<String>, value: impl Into<SensorValue>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
            status: Some("ok".to_string()),
            time: Utc::now(),
            kind: None,
            message: None,
        }
    }

    /// Set the reading time.
    pub fn at(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    /// Set the status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Set the reading type.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Set the message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Resolved components of an addressing URL.
///
/// Addressing URLs have the form `scheme:///<network>/<address>/<model>/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorAddress {
    /// Stable sensor id (last path segment).
    pub id: String,

    /// Bus or network name (e.g. "i2c", "gpio", "w1").
    pub network: String,

    /// Bus address or pin.
    pub address: String,

    /// Driver model name.
    pub model: String,
}

impl SensorAddress {
    /// Parse an addressing URL.
    ///
    /// # Errors
    /// Returns `Error::UnresolvedAddress` if the scheme is missing or any of the
    /// four path segments is missing or empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use wotkit_core::SensorAddress;
    ///
    /// let address = SensorAddress::parse("sensorjs:///i2c/0x40/htu21d/htu21d-0x40").unwrap();
    /// assert_eq!(address.id, "htu21d-0x40");
    /// assert_eq!(address.network, "i2c");
    /// assert_eq!(address.address, "0x40");
    /// assert_eq!(address.model, "htu21d");
    /// ```
    pub fn parse(url: &str) -> Result<Self> {
        let (scheme, path) = url
            .split_once(SENSOR_URL_SEPARATOR)
            .ok_or_else(|| Error::unresolved(url, "missing scheme separator"))?;

        if scheme.is_empty() {
            return Err(Error::unresolved(url, "empty scheme"));
        }

        let segments: Vec<&str> = path.trim_end_matches('/').split('/').collect();
        if segments.len() != SENSOR_URL_SEGMENTS {
            return Err(Error::unresolved(
                url,
                format!(
                    "expected {SENSOR_URL_SEGMENTS} path segments, got {}",
                    segments.len()
                ),
            ));
        }
        if segments.iter().any(|s| s.is_empty()) {
            return Err(Error::unresolved(url, "empty path segment"));
        }

        Ok(Self {
            network: segments[0].to_string(),
            address: segments[1].to_string(),
            model: segments[2].to_string(),
            id: segments[3].to_string(),
        })
    }

    /// Synthesize the addressing URL of an actuator on a pin.
    ///
    /// The instance id is `<model>-<pin>`.
    ///
    /// # Examples
    ///
    /// ```
    /// use wotkit_core::SensorAddress;
    ///
    /// let url = SensorAddress::actuator_url("gpio", "18", "rgbLed");
    /// assert_eq!(url, "sensorjs:///gpio/18/rgbLed/rgbLed-18");
    /// ```
    #[must_use]
    pub fn actuator_url(network: &str, pin: &str, model: &str) -> String {
        format!("{SENSOR_URL_SCHEME}{SENSOR_URL_SEPARATOR}{network}/{pin}/{model}/{model}-{pin}")
    }

    /// Key identifying the physical device (network, address and model).
    ///
    /// Two URLs with the same key drive the same hardware.
    #[must_use]
    pub fn device_key(&self) -> String {
        format!("{}/{}/{}", self.network, self.address, self.model)
    }
}

impl fmt::Display for SensorAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.network, self.address, self.model, self.id
        )
    }
}

/// Driver-reported properties of a sensor model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorProperties {
    /// Sampling interval recommended by the driver.
    pub recommended_interval: Option<Duration>,
}

/// One entry of a batch actuator command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinCommand {
    /// Pin or bus address of the actuator.
    #[serde(deserialize_with = "pin_from_any")]
    pub pin: String,

    /// Command to send.
    pub command: String,
}

impl PinCommand {
    /// Create a new pin command.
    pub fn new(pin: impl ToString, command: impl Into<String>) -> Self {
        Self {
            pin: pin.to_string(),
            command: command.into(),
        }
    }
}

fn pin_from_any<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "pin must be a string or number, got {other}"
        ))),
    }
}

/// Options accompanying an actuator command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOptions {
    /// Time the actuator stays set before it is cleared, in milliseconds.
    ///
    /// `None` or `0` clears right after the command completes.
    #[serde(default, rename = "duration")]
    pub duration_ms: Option<u64>,
}

impl CommandOptions {
    /// Options that keep the actuator set for `duration`.
    pub fn with_duration(duration: Duration) -> Self {
        Self {
            duration_ms: Some(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)),
        }
    }

    /// Duration of the hold, if positive.
    #[must_use]
    pub fn hold(&self) -> Option<Duration> {
        self.duration_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

/// Geographic coordinates of the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinates {
    pub longitude: String,
    pub latitude: String,
    pub altitude: String,
}

/// Descriptive gateway metadata published in the thing document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayMetadata {
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub domain: String,
    pub category: String,
    pub coordinates: Coordinates,
    pub poi: String,
    pub address: String,
    pub image: String,
    pub owners: Vec<String>,
    pub users: Vec<String>,
    pub keywords: Vec<String>,
    pub cpu: String,
    pub memory: String,
    pub disk: String,
    pub version: String,
}

impl GatewayMetadata {
    /// Create metadata with a display name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set manufacturer and model.
    pub fn with_hardware(mut self, manufacturer: impl Into<String>, model: impl Into<String>) -> Self {
        self.manufacturer = manufacturer.into();
        self.model = model.into();
        self
    }

    /// Set the domain (e.g. "House").
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Set the search keywords.
    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }
}
