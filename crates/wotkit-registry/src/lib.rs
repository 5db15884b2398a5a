//! Thing registry integration for the wotkit gateway.
//!
//! - [`capability`] infers resource descriptors from sensor addressing URLs
//! - [`thing`] defines the registry documents
//! - [`transport`] sends requests to the registry (HTTP)
//! - [`sync`] keeps the gateway thing registered and publishes readings
//!
//! # Example
//!
//! ```no_run
//! use wotkit_registry::{CapabilityMapper, HttpTransport, HttpTransportConfig, ThingSynchronizer};
//! use wotkit_core::{GatewayConfig, GatewayMetadata, SensorValue};
//!
//! #[tokio::main]
//! async fn main() -> wotkit_core::Result<()> {
//!     let config = GatewayConfig::new("pi-01");
//!     let mapper = CapabilityMapper::from_config(&config);
//!     let transport = HttpTransport::new(HttpTransportConfig::from(&config))?;
//!     let sync = ThingSynchronizer::from_config(transport, &config);
//!
//!     let url = "sensorjs:///i2c/0x40/htu21d/htu21d-0x40";
//!     sync.add_resource(mapper.map(url)?.with_id("htu21d-0x40")).await;
//!
//!     sync.register(&GatewayMetadata::new("Web Of Things"), vec![]).await?;
//!     sync.publish_reading("htu21d-0x40", SensorValue::Number(45.0)).await?;
//!     sync.delete().await?;
//!     Ok(())
//! }
//! ```

pub mod capability;
pub mod sync;
pub mod thing;
pub mod transport;

pub use capability::{CapabilityMapper, UNKNOWN_CATEGORY};
pub use sync::ThingSynchronizer;
pub use thing::{
    AttributeDescriptor, OperationDescriptor, ResourceDescriptor, ResourceKind, ThingDocument,
    ThingMetadata,
};
pub use transport::{
    HttpTransport, HttpTransportConfig, RegistryMethod, RegistryRequest, RegistryResponse,
    RegistryTransport,
};
