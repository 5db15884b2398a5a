//! Reading pipeline of the wotkit gateway.
//!
//! Raw readings produced by the sensor samplers (or injected by the
//! application) travel through an ordered chain of middleware steps and end in
//! the [`SensorStateStore`], which keeps the latest value and a bounded history
//! per sensor.
//!
//! # Example
//!
//! ```no_run
//! use wotkit_pipeline::{Pipeline, PipelineConsumer, SensorState, SensorStateStore};
//! use wotkit_core::{RangeConfig, Reading};
//! use tokio_util::sync::CancellationToken;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> wotkit_core::Result<()> {
//!     let store = SensorStateStore::new();
//!     store
//!         .register(SensorState::new(
//!             "htu21d-0x40",
//!             "sensorjs:///i2c/0x40/htu21d/htu21d-0x40",
//!             Duration::from_secs(1),
//!             10,
//!         ))
//!         .await?;
//!
//!     let consumer = PipelineConsumer::spawn(
//!         Pipeline::default_chain(store.clone(), RangeConfig::default()),
//!         CancellationToken::new(),
//!     );
//!     consumer.ingest(Reading::new("htu21d-0x40", 42.0)).await?;
//!     consumer.shutdown().await;
//!
//!     println!("{:?}", store.get("htu21d-0x40").await);
//!     Ok(())
//! }
//! ```

pub mod consumer;
pub mod error;
pub mod middleware;
pub mod store;

pub use consumer::{ConsumerStats, Pipeline, PipelineBuilder, PipelineConsumer, StateChange};
pub use error::{PipelineError, Result};
pub use middleware::{
    BoundedQueue, Flow, Inspect, Middleware, RangeFilter, Scoped, StepContext, WindowAverage,
    from_fn,
};
pub use store::{History, HistoryEntry, SensorState, SensorStateStore};
