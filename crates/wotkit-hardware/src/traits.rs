//! Driver collaborator trait definitions.
//!
//! The gateway never talks to a bus (I2C, GPIO, 1-Wire, BLE) directly. It
//! consumes three narrow interfaces instead:
//!
//! - [`DriverResolver`] turns an addressing URL into device handles,
//! - [`SensorDevice`] produces raw samples,
//! - [`ActuatorDevice`] executes and clears commands.
//!
//! All device methods return futures that are `Send`, so handles can be moved
//! into Tokio tasks (sampling loops and timed clears). Implementations may
//! still be written with plain `async fn`.

use crate::error::Result;
use std::future::Future;
use wotkit_core::{CommandOptions, Reading, SensorAddress, SensorProperties, SensorValue};

/// A raw sample produced by a sensor device.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSample {
    /// Measured value.
    pub value: SensorValue,

    /// Driver status (e.g. "ok").
    pub status: Option<String>,

    /// Driver-reported reading type.
    pub kind: Option<String>,

    /// Optional driver message.
    pub message: Option<String>,
}

impl SensorSample {
    /// Create an "ok" sample with a value.
    pub fn new(value: impl Into<SensorValue>) -> Self {
        Self {
            value: value.into(),
            status: Some("ok".to_string()),
            kind: None,
            message: None,
        }
    }

    /// Set the reading type.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Turn the sample into a reading for sensor `id`, stamped now.
    pub fn into_reading(self, id: &str) -> Reading {
        let mut reading = Reading::new(id, self.value);
        reading.status = self.status;
        reading.kind = self.kind;
        reading.message = self.message;
        reading
    }
}

/// Sensor device abstraction.
///
/// # Examples
///
/// ```no_run
/// use wotkit_hardware::traits::SensorDevice;
/// use wotkit_hardware::error::Result;
///
/// async fn read_twice<S: SensorDevice>(sensor: &mut S) -> Result<()> {
///     let first = sensor.read_value().await?;
///     let second = sensor.read_value().await?;
///     println!("{:?} -> {:?}", first.value, second.value);
///     Ok(())
/// }
/// ```
pub trait SensorDevice: Send + 'static {
    /// Read the next sample from the device.
    ///
    /// May wait until the device has a sample available.
    fn read_value(&mut self) -> impl Future<Output = Result<SensorSample>> + Send;
}

/// Actuator device abstraction.
///
/// An actuator handle is owned by exactly one command session. The session
/// always calls [`clear`](ActuatorDevice::clear) before dropping the handle,
/// even when [`set`](ActuatorDevice::set) failed.
pub trait ActuatorDevice: Send + 'static {
    /// Addressing URL this handle was created for.
    fn address(&self) -> &str;

    /// Send a command to the actuator.
    fn set(
        &mut self,
        command: &str,
        options: &CommandOptions,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Reset the actuator to its idle state.
    fn clear(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Resolves addressing URLs into device handles.
///
/// This is the boundary to the driver framework. Resolution failures are
/// reported as `wotkit_core::Error::UnresolvedAddress`.
pub trait DriverResolver: Send + Sync + 'static {
    /// Sensor handle type produced by this resolver.
    type Sensor: SensorDevice;

    /// Actuator handle type produced by this resolver.
    type Actuator: ActuatorDevice;

    /// Parse an addressing URL into its components.
    fn resolve(&self, url: &str) -> wotkit_core::Result<SensorAddress> {
        SensorAddress::parse(url)
    }

    /// Driver properties for a model, if the driver knows the model.
    fn properties(&self, _model: &str) -> Option<SensorProperties> {
        None
    }

    /// Construct a sensor handle for an addressing URL.
    fn create_sensor(&self, url: &str) -> wotkit_core::Result<Self::Sensor>;

    /// Construct an actuator handle for an addressing URL.
    fn create_actuator(&self, url: &str) -> wotkit_core::Result<Self::Actuator>;
}
