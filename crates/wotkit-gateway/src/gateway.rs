//! Gateway context object.
//!
//! [`Gateway`] owns every runtime component of one gateway instance and is
//! the only entry point applications need:
//!
//! ```text
//!                 ┌────────────────┐    readings    ┌──────────────────┐
//!  DriverResolver │ SensorSampler  │───────────────►│ PipelineConsumer │──► SensorStateStore
//!        │        └────────────────┘                └──────────────────┘         │
//!        │                                                   ▲              StateChange
//!        │        ┌────────────────────┐            ingest() │               broadcast
//!        └───────►│ ActuatorController │                     │
//!                 └────────────────────┘               application
//!
//!  create_sensor() ─► CapabilityMapper ─► ThingSynchronizer ─► RegistryTransport
//! ```
//!
//! Nothing is global: two gateways in one process share no state.

use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wotkit_core::{
    CommandOptions, Error, GatewayConfig, PinCommand, Reading, Result, SensorValue,
};
use wotkit_hardware::{ActuatorController, DriverResolver, SensorSampler};
use wotkit_pipeline::{
    ConsumerStats, Pipeline, PipelineConsumer, SensorState, SensorStateStore, StateChange,
};
use wotkit_registry::{
    CapabilityMapper, RegistryTransport, ResourceDescriptor, ThingDocument, ThingSynchronizer,
};

/// One running gateway.
///
/// # Examples
///
/// ```no_run
/// use wotkit_gateway::Gateway;
/// use wotkit_core::{GatewayConfig, Reading};
/// use wotkit_hardware::mock::MockDriver;
/// use wotkit_registry::{HttpTransport, HttpTransportConfig};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> wotkit_core::Result<()> {
///     let config = GatewayConfig::new("pi-01");
///     let transport = HttpTransport::new(HttpTransportConfig::from(&config))?;
///     let gateway = Gateway::start(config, Arc::new(MockDriver::new()), transport)?;
///
///     gateway.create_sensor("sensorjs:///i2c/0x40/htu21d/htu21d-0x40").await?;
///     gateway.ingest(Reading::new("htu21d-0x40", 42.0)).await?;
///
///     gateway.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct Gateway<R: DriverResolver, T: RegistryTransport> {
    config: GatewayConfig,
    resolver: Arc<R>,
    store: SensorStateStore,
    consumer: PipelineConsumer,
    controller: ActuatorController<R>,

    /// Also serializes sensor creation.
    sampler: Mutex<SensorSampler>,

    mapper: CapabilityMapper,
    synchronizer: ThingSynchronizer<T>,
    token: CancellationToken,
}

impl<R: DriverResolver, T: RegistryTransport> Gateway<R, T> {
    /// Start a gateway with the default pipeline chain.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid.
    pub fn start(config: GatewayConfig, resolver: Arc<R>, transport: T) -> Result<Self> {
        let range = config.filter;
        Self::start_with(config, resolver, transport, |store| {
            Pipeline::default_chain(store, range)
        })
    }

    /// Start a gateway whose pipeline is built by `chain`.
    ///
    /// `chain` receives the gateway's store and must build the pipeline on it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid.
    pub fn start_with<F>(config: GatewayConfig, resolver: Arc<R>, transport: T, chain: F) -> Result<Self>
    where
        F: FnOnce(SensorStateStore) -> Pipeline,
    {
        config.validate()?;

        let token = CancellationToken::new();
        let store = SensorStateStore::new();
        let pipeline = chain(store.clone());
        debug!(steps = ?pipeline.step_names(), "Pipeline built");

        let consumer = PipelineConsumer::spawn(pipeline, token.child_token());
        let sampler = SensorSampler::new(consumer.sender(), token.child_token());
        let controller = ActuatorController::with_token(
            Arc::clone(&resolver),
            config.retrigger_policy,
            token.child_token(),
        );
        let mapper = CapabilityMapper::from_config(&config);
        let synchronizer = ThingSynchronizer::from_config(transport, &config);

        info!(
            thing = %config.thing_id,
            registry = %config.registry_base_url,
            "Gateway started"
        );

        Ok(Self {
            config,
            resolver,
            store,
            consumer,
            controller,
            sampler: Mutex::new(sampler),
            mapper,
            synchronizer,
            token,
        })
    }

    /// Gateway configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Check if [`shutdown`](Self::shutdown) has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Create the sensor at `url`, start sampling it and describe it to the
    /// synchronizer.
    ///
    /// The sensor is sampled at the interval its driver recommends, or at the
    /// configured reporting interval. If any step fails, no state, sampling
    /// task or descriptor is left behind.
    ///
    /// # Errors
    ///
    /// - `Error::UnresolvedAddress` if the driver can not resolve `url`
    /// - `Error::UnknownModel` if the model is unknown under the reject policy
    /// - `Error::DuplicateSensor` if a sensor with the same id exists
    /// - `Error::ShuttingDown` after [`shutdown`](Self::shutdown) began
    pub async fn create_sensor(&self, url: &str) -> Result<SensorState> {
        if self.is_shutting_down() {
            return Err(Error::ShuttingDown);
        }

        let mut sampler = self.sampler.lock().await;

        let address = self.resolver.resolve(url)?;
        let descriptor = self.mapper.map(url)?.with_id(&address.id);
        if self.store.contains(&address.id).await {
            return Err(Error::DuplicateSensor(address.id));
        }

        let device = self.resolver.create_sensor(url)?;
        let interval = self
            .resolver
            .properties(&address.model)
            .and_then(|p| p.recommended_interval)
            .unwrap_or_else(|| self.config.reporting_interval_duration());

        let state = SensorState::new(&address.id, url, interval, self.config.history_capacity);
        self.store.register(state.clone()).await?;
        sampler.listen(&address.id, device, interval);
        self.synchronizer.add_resource(descriptor).await;

        info!(sensor = %address.id, url, ?interval, "Sensor created");
        Ok(state)
    }

    /// Create every sensor listed in the configuration.
    ///
    /// Failures are logged and skipped. Returns the number created.
    pub async fn create_configured_sensors(&self) -> usize {
        let mut created = 0;
        for url in &self.config.sensors {
            match self.create_sensor(url).await {
                Ok(_) => created += 1,
                Err(e) => warn!(url = %url, error = %e, "Failed to create configured sensor"),
            }
        }
        created
    }

    /// Snapshot of a sensor's state.
    pub async fn sensor(&self, id: &str) -> Option<SensorState> {
        self.store.get(id).await
    }

    /// Read a sensor's device now, outside its sampling schedule.
    ///
    /// The returned reading is not run through the pipeline and does not
    /// change the stored state.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument` if `id` is empty
    /// - `Error::UnknownSensor` if no sensor with this id was created
    /// - `Error::ShuttingDown` after [`shutdown`](Self::shutdown) began
    /// - `Error::Hardware` if the device read fails
    pub async fn read_sensor(&self, id: &str) -> Result<Reading> {
        if id.is_empty() {
            return Err(Error::invalid_argument("sensor id is required"));
        }
        if self.is_shutting_down() {
            return Err(Error::ShuttingDown);
        }

        let reader = self
            .sampler
            .lock()
            .await
            .reader(id)
            .ok_or_else(|| Error::UnknownSensor(id.to_string()))?;

        match reader.read().await {
            Ok(sample) => Ok(sample.into_reading(id)),
            Err(_) if self.is_shutting_down() => Err(Error::ShuttingDown),
            Err(e) => Err(e.into()),
        }
    }

    /// Ids of all created sensors, sorted.
    pub async fn sensor_ids(&self) -> Vec<String> {
        self.store.ids().await
    }

    /// Sensor state store.
    pub fn store(&self) -> &SensorStateStore {
        &self.store
    }

    /// Feed a reading into the pipeline.
    ///
    /// # Errors
    ///
    /// Returns `Error::ShuttingDown` once the pipeline consumer stopped.
    pub async fn ingest(&self, reading: Reading) -> Result<()> {
        self.consumer.ingest(reading).await
    }

    /// Subscribe to stored state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.consumer.subscribe()
    }

    /// Actuator controller handle.
    pub fn controller(&self) -> ActuatorController<R> {
        self.controller.clone()
    }

    /// Send `command` to the actuator at `url`.
    ///
    /// See [`ActuatorController::set_command`].
    ///
    /// # Errors
    ///
    /// Same as [`ActuatorController::set_command`].
    pub async fn set_command(&self, url: &str, command: &str, options: &CommandOptions) -> Result<()> {
        self.controller.set_command(url, command, options).await
    }

    /// Send one command per entry to actuators of `model` on `network`.
    ///
    /// See [`ActuatorController::set_commands`].
    ///
    /// # Errors
    ///
    /// Same as [`ActuatorController::set_commands`].
    pub async fn set_commands(
        &self,
        network: &str,
        model: &str,
        commands: &[PinCommand],
        options: &CommandOptions,
    ) -> Result<bool> {
        self.controller
            .set_commands(network, model, commands, options)
            .await
    }

    /// Capability mapper of this gateway.
    pub fn mapper(&self) -> &CapabilityMapper {
        &self.mapper
    }

    /// Synchronizer handle, for tasks that publish independently.
    pub fn synchronizer(&self) -> ThingSynchronizer<T> {
        self.synchronizer.clone()
    }

    /// Register the thing with the configured metadata.
    ///
    /// # Errors
    ///
    /// Same as [`ThingSynchronizer::register`].
    pub async fn register_thing(&self, extra: Vec<ResourceDescriptor>) -> Result<ThingDocument> {
        self.synchronizer
            .register(&self.config.metadata, extra)
            .await
    }

    /// Publish the current resource list.
    ///
    /// # Errors
    ///
    /// Same as [`ThingSynchronizer::update`].
    pub async fn update_thing(&self) -> Result<()> {
        self.synchronizer.update().await
    }

    /// Remove the thing from the registry.
    ///
    /// # Errors
    ///
    /// Same as [`ThingSynchronizer::delete`].
    pub async fn delete_thing(&self) -> Result<()> {
        self.synchronizer.delete().await
    }

    /// Push one sensor value to the registry.
    ///
    /// # Errors
    ///
    /// Same as [`ThingSynchronizer::publish_reading`].
    pub async fn publish_reading(&self, sensor_id: &str, value: SensorValue) -> Result<bool> {
        self.synchronizer.publish_reading(sensor_id, value).await
    }

    /// List the things known to the registry.
    ///
    /// # Errors
    ///
    /// Same as [`ThingSynchronizer::list_things`].
    pub async fn list_things(&self) -> Result<serde_json::Value> {
        self.synchronizer.list_things().await
    }

    /// Stop the gateway.
    ///
    /// Sampling stops, pending actuator clears fire immediately, the
    /// synchronizer refuses further calls and the pipeline processes what is
    /// already queued before it stops.
    pub async fn shutdown(self) -> ConsumerStats {
        info!(thing = %self.config.thing_id, "Gateway shutting down");
        self.token.cancel();

        self.sampler.into_inner().shutdown().await;
        self.controller.shutdown().await;
        self.synchronizer.close();
        let stats = self.consumer.shutdown().await;

        info!(
            received = stats.received,
            stored = stats.stored,
            failed = stats.failed,
            "Gateway stopped"
        );
        stats
    }
}
