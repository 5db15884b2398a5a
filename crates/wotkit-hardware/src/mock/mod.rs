//! Mock device implementations for testing and development.
//!
//! This module provides simulated sensors, actuators and a driver resolver
//! that can be controlled programmatically without requiring physical hardware.

pub mod actuator;
pub mod driver;
pub mod sensor;

// Re-export commonly used types
pub use actuator::{ActuatorEvent, ActuatorEventKind, ActuatorRecorder, MockActuator};
pub use driver::MockDriver;
pub use sensor::{MockSensor, MockSensorHandle};
