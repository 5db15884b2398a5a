//! Mock sensor implementation for testing and development.
//!
//! This module provides a simulated sensor device that can be fed samples
//! programmatically for testing without requiring physical hardware.

use crate::{
    Result,
    traits::{SensorDevice, SensorSample},
};
use tokio::sync::mpsc;
use wotkit_core::SensorValue;

/// Mock sensor device for testing and development.
///
/// This device simulates a sensor by receiving samples through an internal
/// channel. Tests and applications feed samples programmatically using a
/// [`MockSensorHandle`]. Reads wait until a sample is available.
///
/// # Examples
///
/// ```
/// use wotkit_hardware::mock::MockSensor;
/// use wotkit_hardware::traits::SensorDevice;
/// use wotkit_core::SensorValue;
///
/// #[tokio::main]
/// async fn main() -> wotkit_hardware::Result<()> {
///     let (mut sensor, handle) = MockSensor::new("htu21d-0x40");
///
///     handle.send_value(45.0).await?;
///
///     let sample = sensor.read_value().await?;
///     assert_eq!(sample.value, SensorValue::Number(45.0));
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockSensor {
    /// Channel receiver for simulated samples
    sample_rx: mpsc::Receiver<SensorSample>,

    /// Sensor id
    id: String,
}

impl MockSensor {
    /// Create a new mock sensor.
    ///
    /// Returns a tuple of (MockSensor, MockSensorHandle) where the handle
    /// can be used to feed samples to the sensor.
    pub fn new(id: impl Into<String>) -> (Self, MockSensorHandle) {
        let (sample_tx, sample_rx) = mpsc::channel(32);
        let id = id.into();

        let sensor = Self {
            sample_rx,
            id: id.clone(),
        };

        let handle = MockSensorHandle { sample_tx, id };

        (sensor, handle)
    }

    /// Get the sensor id.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl SensorDevice for MockSensor {
    async fn read_value(&mut self) -> Result<SensorSample> {
        self.sample_rx
            .recv()
            .await
            .ok_or_else(|| crate::HardwareError::disconnected(format!("{} sample channel closed", self.id)))
    }
}

/// Handle for feeding a mock sensor.
///
/// Can be cloned and shared across tasks.
#[derive(Debug, Clone)]
pub struct MockSensorHandle {
    /// Channel sender for simulated samples
    sample_tx: mpsc::Sender<SensorSample>,

    /// Sensor id
    id: String,
}

impl MockSensorHandle {
    /// Feed a sample to the mock sensor.
    ///
    /// # Errors
    ///
    /// Returns an error if the sensor has been dropped and the channel is closed.
    pub async fn send_sample(&self, sample: SensorSample) -> Result<()> {
        self.sample_tx
            .send(sample)
            .await
            .map_err(|_| crate::HardwareError::disconnected(format!("{} sample channel closed", self.id)))
    }

    /// Feed an "ok" sample carrying `value`.
    pub async fn send_value(&self, value: impl Into<SensorValue>) -> Result<()> {
        self.send_sample(SensorSample::new(value)).await
    }

    /// Get the sensor id.
    pub fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_sensor_reads_in_order() {
        let (mut sensor, handle) = MockSensor::new("bh1750-0x23");

        handle.send_value(10.0).await.unwrap();
        handle.send_value(20.0).await.unwrap();
        handle.send_value(true).await.unwrap();

        assert_eq!(sensor.read_value().await.unwrap().value, SensorValue::Number(10.0));
        assert_eq!(sensor.read_value().await.unwrap().value, SensorValue::Number(20.0));
        assert_eq!(sensor.read_value().await.unwrap().value, SensorValue::Bool(true));
    }

    #[tokio::test]
    async fn test_mock_sensor_disconnects_when_handle_dropped() {
        let (mut sensor, handle) = MockSensor::new("motion-17");
        drop(handle);

        let result = sensor.read_value().await;
        assert!(matches!(
            result,
            Err(crate::HardwareError::Disconnected { .. })
        ));
    }

    #[tokio::test]
    async fn test_mock_sensor_handle_fails_after_sensor_dropped() {
        let (sensor, handle) = MockSensor::new("motion-17");
        assert_eq!(sensor.id(), handle.id());
        drop(sensor);

        assert!(handle.send_value(1.0).await.is_err());
    }
}
