//! Mock driver resolver.
//!
//! [`MockDriver`] resolves any well-formed addressing URL into a
//! [`MockSensor`] or [`MockActuator`]. Models can be marked as unknown to the
//! driver to exercise resolution failures, and per-model properties can be
//! configured to exercise interval resolution.

use super::actuator::{ActuatorRecorder, MockActuator};
use super::sensor::{MockSensor, MockSensorHandle};
use crate::traits::DriverResolver;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use wotkit_core::{Error, SensorAddress, SensorProperties};

#[derive(Debug, Default)]
struct DriverState {
    properties: HashMap<String, SensorProperties>,
    unsupported_models: HashSet<String>,
    sensor_handles: HashMap<String, MockSensorHandle>,
}

/// Mock driver resolver.
///
/// Cloning a `MockDriver` shares its state, so a test can keep a clone to
/// feed sensors and inspect actuator activity after handing the driver to a
/// gateway.
///
/// # Examples
///
/// ```
/// use wotkit_hardware::mock::MockDriver;
/// use wotkit_hardware::traits::DriverResolver;
///
/// let driver = MockDriver::new();
/// let _sensor = driver.create_sensor("sensorjs:///i2c/0x40/htu21d/htu21d-0x40").unwrap();
///
/// assert!(driver.sensor_handle("htu21d-0x40").is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<DriverState>>,
    recorder: ActuatorRecorder,
}

impl MockDriver {
    /// Create a new mock driver that supports every model.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, DriverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Report `properties` for `model` (case-insensitive).
    pub fn with_properties(self, model: &str, properties: SensorProperties) -> Self {
        self.state()
            .properties
            .insert(model.to_lowercase(), properties);
        self
    }

    /// Refuse to construct handles for `model` (case-insensitive).
    pub fn without_model(self, model: &str) -> Self {
        self.state().unsupported_models.insert(model.to_lowercase());
        self
    }

    /// Shared actuator activity log.
    pub fn recorder(&self) -> &ActuatorRecorder {
        &self.recorder
    }

    /// Handle feeding the sensor with the given id, if it was created.
    pub fn sensor_handle(&self, id: &str) -> Option<MockSensorHandle> {
        self.state().sensor_handles.get(id).cloned()
    }

    /// Drop the handle of sensor `id`, disconnecting the device.
    ///
    /// Returns `false` if no such sensor was created.
    pub fn disconnect(&self, id: &str) -> bool {
        self.state().sensor_handles.remove(id).is_some()
    }

    /// Ids of every sensor created by this driver.
    pub fn sensor_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state().sensor_handles.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn check_supported(&self, url: &str, address: &SensorAddress) -> wotkit_core::Result<()> {
        if self
            .state()
            .unsupported_models
            .contains(&address.model.to_lowercase())
        {
            return Err(Error::unresolved(
                url,
                format!("no driver for model {}", address.model),
            ));
        }
        Ok(())
    }
}

impl DriverResolver for MockDriver {
    type Sensor = MockSensor;
    type Actuator = MockActuator;

    fn properties(&self, model: &str) -> Option<SensorProperties> {
        self.state().properties.get(&model.to_lowercase()).cloned()
    }

    fn create_sensor(&self, url: &str) -> wotkit_core::Result<MockSensor> {
        let address = self.resolve(url)?;
        self.check_supported(url, &address)?;

        let (sensor, handle) = MockSensor::new(address.id.clone());
        self.state().sensor_handles.insert(address.id, handle);
        Ok(sensor)
    }

    fn create_actuator(&self, url: &str) -> wotkit_core::Result<MockActuator> {
        let address = self.resolve(url)?;
        self.check_supported(url, &address)?;

        Ok(MockActuator::new(
            url,
            address.device_key(),
            self.recorder.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_create_actuator_tracks_handle() {
        let driver = MockDriver::new();
        let actuator = driver
            .create_actuator("sensorjs:///gpio/18/rgbLed/rgbLed-18")
            .unwrap();

        assert_eq!(actuator.key(), "gpio/18/rgbLed");
        assert_eq!(driver.recorder().live_handles("gpio/18/rgbLed"), 1);

        drop(actuator);
        assert_eq!(driver.recorder().live_handles("gpio/18/rgbLed"), 0);
    }

    #[tokio::test]
    async fn test_disconnect_closes_sensor() {
        use crate::traits::SensorDevice;

        let driver = MockDriver::new();
        let mut sensor = driver
            .create_sensor("sensorjs:///i2c/0x23/bh1750/bh1750-0x23")
            .unwrap();

        assert!(driver.disconnect("bh1750-0x23"));
        assert!(!driver.disconnect("bh1750-0x23"));
        assert!(driver.sensor_ids().is_empty());
        assert!(matches!(
            sensor.read_value().await,
            Err(crate::HardwareError::Disconnected { .. })
        ));
    }

    #[test]
    fn test_unsupported_model_is_unresolved() {
        let driver = MockDriver::new().without_model("BH1750");
        let result = driver.create_sensor("sensorjs:///i2c/0x23/bh1750/bh1750-0x23");

        assert!(matches!(result, Err(Error::UnresolvedAddress { .. })));
        assert!(driver.sensor_ids().is_empty());
    }

    #[test]
    fn test_malformed_url_is_unresolved() {
        let driver = MockDriver::new();
        assert!(matches!(
            driver.create_actuator("gpio/18"),
            Err(Error::UnresolvedAddress { .. })
        ));
    }

    #[test]
    fn test_properties_lookup_is_case_insensitive() {
        let driver = MockDriver::new().with_properties(
            "DS18B20",
            SensorProperties {
                recommended_interval: Some(Duration::from_millis(750)),
            },
        );

        let properties = driver.properties("ds18b20").unwrap();
        assert_eq!(
            properties.recommended_interval,
            Some(Duration::from_millis(750))
        );
        assert!(driver.properties("htu21d").is_none());
    }
}
