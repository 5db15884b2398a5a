//! Core constants for the wotkit gateway.
//!
//! This module collects the defaults shared by the sensor pipeline, the
//! actuator controller and the thing registry synchronizer. Every value that
//! can be overridden at runtime has a matching field in
//! [`GatewayConfig`](crate::config::GatewayConfig).
//!
//! # Addressing URLs
//!
//! Sensors and actuators are addressed by URLs of the form:
//!
//! ```text
//! sensorjs:///<network>/<address>/<model>/<instanceId>
//! ```
//!
//! For example `sensorjs:///i2c/0x40/htu21d/htu21d-0x40` addresses an HTU21D
//! humidity sensor at I2C address `0x40` whose sensor id is `htu21d-0x40`.
//!
//! # Usage
//!
//! ```
//! use wotkit_core::constants::*;
//! use std::time::Duration;
//!
//! let interval = Duration::from_millis(DEFAULT_REPORTING_INTERVAL_MS);
//! assert_eq!(interval, Duration::from_secs(1));
//! assert_eq!(SENSOR_URL_SCHEME, "sensorjs");
//! ```

// ============================================================================
// Addressing
// ============================================================================

/// Scheme used when synthesizing actuator addressing URLs.
pub const SENSOR_URL_SCHEME: &str = "sensorjs";

/// Separator between the scheme and the addressing path.
pub const SENSOR_URL_SEPARATOR: &str = ":///";

/// Number of path segments in an addressing URL (network, address, model, id).
pub const SENSOR_URL_SEGMENTS: usize = 4;

// ============================================================================
// Sensor State
// ============================================================================

/// Default sampling/reporting interval in milliseconds.
///
/// Used when the driver does not recommend an interval for the sensor model.
pub const DEFAULT_REPORTING_INTERVAL_MS: u64 = 1000;

/// Default number of `(time, value)` pairs kept per sensor.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Capacity of the channel feeding readings into the pipeline consumer.
pub const READING_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the state-change broadcast channel.
pub const STATE_EVENT_CHANNEL_CAPACITY: usize = 128;

/// Lower bound of the default range filter applied to numeric readings.
pub const DEFAULT_FILTER_MIN: f64 = -50.0;

/// Upper bound of the default range filter applied to numeric readings.
pub const DEFAULT_FILTER_MAX: f64 = 1000.0;

// ============================================================================
// Thing Registry
// ============================================================================

/// Default base URL of the remote thing registry.
pub const DEFAULT_REGISTRY_BASE_URL: &str = "http://127.0.0.1:9090/wpx";

/// Registry collection that stores thing documents.
pub const DEFAULT_REGISTRY_COLLECTION: &str = "taar";

/// Prefix of operation URIs advertised in resource descriptors.
pub const DEFAULT_OPERATION_PREFIX: &str = "wpx/raat";

/// Base path at which the gateway is reachable.
pub const DEFAULT_ACCESS_BASE_PATH: &str = "/wotkit";

/// Default port advertised in the thing access address.
pub const DEFAULT_ACCESS_PORT: u16 = 3000;

/// Default timeout for registry HTTP calls in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 3000;

/// `chrono` format of `createdTime` and reading timestamps sent to the registry.
pub const THING_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// `chrono` format of `expiredTime`; things never expire.
pub const THING_EXPIRY_FORMAT: &str = "9999%m%d%H%M%S";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_bounds_are_ordered() {
        assert!(DEFAULT_FILTER_MIN < DEFAULT_FILTER_MAX);
    }

    #[test]
    fn test_history_capacity_is_positive() {
        assert!(DEFAULT_HISTORY_CAPACITY >= 1);
    }
}
