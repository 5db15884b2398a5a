//! Device abstraction layer for the wotkit gateway.
//!
//! This crate defines the driver collaborator interfaces the gateway consumes
//! and the two runtime components built directly on top of them:
//!
//! - [`SensorSampler`] reads every listened sensor at its interval and feeds
//!   the readings into one channel;
//! - [`ActuatorController`] issues actuator commands and guarantees that each
//!   one is followed by a clear, immediately or after a hold duration.
//!
//! # Driver Traits
//!
//! ```no_run
//! use wotkit_hardware::traits::{ActuatorDevice, DriverResolver};
//! use wotkit_core::CommandOptions;
//!
//! async fn blink<R: DriverResolver>(driver: &R, url: &str) -> wotkit_core::Result<()> {
//!     let mut led = driver.create_actuator(url)?;
//!     led.set("powerOn", &CommandOptions::default()).await?;
//!     led.clear().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Mock Implementations
//!
//! The [`mock`] module provides a driver, sensors fed through a handle and
//! actuators that record their calls, for development and testing without
//! physical hardware.

pub mod controller;
pub mod error;
pub mod mock;
pub mod sampler;
pub mod traits;

pub use controller::ActuatorController;
pub use error::{HardwareError, Result};
pub use sampler::{SensorReader, SensorSampler};
pub use traits::{ActuatorDevice, DriverResolver, SensorDevice, SensorSample};
