//! Shared building blocks for the wotkit gateway.
//!
//! Every other crate in the workspace depends on this one for the error
//! taxonomy, the reading/address/command types exchanged between components,
//! protocol-level constants and the gateway configuration.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use config::{GatewayConfig, RangeConfig, RetriggerPolicy, UnknownModelPolicy};
pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
