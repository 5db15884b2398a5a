//! wotkit gateway.
//!
//! Ties the device layer, the reading pipeline and the thing registry
//! together in one [`Gateway`] object. The `wotkit` binary runs a gateway
//! on simulated devices.

pub mod gateway;
pub mod simulation;

pub use gateway::Gateway;
pub use simulation::{Waveform, spawn_feeders};
