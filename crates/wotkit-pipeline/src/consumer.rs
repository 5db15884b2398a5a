//! Pipeline consumer.
//!
//! A [`Pipeline`] is an ordered list of middleware steps fixed at build time,
//! always followed by the terminal write into the [`SensorStateStore`]. The
//! [`PipelineConsumer`] runs one pipeline on its own task, fed by a bounded
//! channel:
//!
//! ```text
//! samplers ──┐
//!            ├──► mpsc ──► [step 1] ──► ... ──► [step n] ──► store write ──► StateChange
//! ingest() ──┘                                                           (broadcast)
//! ```
//!
//! A single task processes every reading, so readings of one sensor are
//! applied in arrival order and never overlap.

use crate::error::{PipelineError, Result};
use crate::middleware::{Flow, Inspect, Middleware, RangeFilter, Scoped, StepContext};
use crate::store::SensorStateStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use wotkit_core::constants::{READING_CHANNEL_CAPACITY, STATE_EVENT_CHANNEL_CAPACITY};
use wotkit_core::{Error, RangeConfig, Reading, SensorValue};

/// Emitted after every successful store write.
///
/// This is the hook external push transports subscribe to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    /// Sensor id.
    pub id: String,

    /// New latest value.
    pub value: SensorValue,

    /// Reported status.
    pub status: Option<String>,

    /// Time of the reading.
    pub time: DateTime<Utc>,
}

/// Ordered middleware chain terminated by the store write.
pub struct Pipeline {
    steps: Vec<Box<dyn Middleware>>,
    store: SensorStateStore,
    events: broadcast::Sender<StateChange>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.step_names())
            .field("store", &self.store)
            .finish()
    }
}

/// Builder for [`Pipeline`].
///
/// # Examples
///
/// ```
/// use wotkit_pipeline::consumer::Pipeline;
/// use wotkit_pipeline::middleware::{BoundedQueue, RangeFilter, WindowAverage};
/// use wotkit_pipeline::store::SensorStateStore;
///
/// let pipeline = Pipeline::builder(SensorStateStore::new())
///     .step(RangeFilter::between(-50.0, 50.0))
///     .step(WindowAverage::new(20))
///     .step(BoundedQueue::new(100))
///     .build();
///
/// assert_eq!(pipeline.step_names(), vec!["range-filter", "window-average", "bounded-queue"]);
/// ```
pub struct PipelineBuilder {
    steps: Vec<Box<dyn Middleware>>,
    store: SensorStateStore,
    event_capacity: usize,
}

impl PipelineBuilder {
    /// Append a step. Steps run in the order they are added.
    pub fn step<M: Middleware>(mut self, step: M) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Set the capacity of the state change broadcast.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Build the pipeline.
    pub fn build(self) -> Pipeline {
        let (events, _) = broadcast::channel(self.event_capacity);
        Pipeline {
            steps: self.steps,
            store: self.store,
            events,
        }
    }
}

impl Pipeline {
    /// Start building a pipeline writing into `store`.
    pub fn builder(store: SensorStateStore) -> PipelineBuilder {
        PipelineBuilder {
            steps: Vec::new(),
            store,
            event_capacity: STATE_EVENT_CHANNEL_CAPACITY,
        }
    }

    /// The gateway's standard chain: a range filter, debug logging of 1-Wire
    /// temperature and I2C light readings, then the store write.
    ///
    /// `RangeConfig::default()` keeps values between -50 and 1000.
    pub fn default_chain(store: SensorStateStore, range: RangeConfig) -> Self {
        Self::builder(store)
            .step(RangeFilter::between(range.min, range.max))
            .step(Scoped::new(
                "/w1/*/ds18b20",
                Inspect::new(|r: &Reading| {
                    debug!(sensor = %r.id, value = %r.value, "ds18b20 temperature")
                }),
            ))
            .step(Scoped::new(
                "/i2c/*/bh1750",
                Inspect::new(|r: &Reading| debug!(sensor = %r.id, value = %r.value, "BH1750 light")),
            ))
            .build()
    }

    /// Names of the configured steps, in order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Store written by the terminal step.
    pub fn store(&self) -> &SensorStateStore {
        &self.store
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.events.subscribe()
    }

    /// Run one reading through the chain and write what comes out.
    ///
    /// Returns the number of readings written to the store. Readings for
    /// unknown sensors are logged and dropped without error before any step
    /// sees them.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing step, or
    /// `PipelineError::StepPanicked` if a step panicked; nothing is written
    /// for the reading in that case.
    pub async fn process(&mut self, reading: Reading) -> Result<usize> {
        let Some(url) = self.store.url_of(&reading.id).await else {
            warn!(sensor = %reading.id, "Reading for unknown sensor dropped");
            return Ok(0);
        };
        let survivors = self.run_steps(reading, &StepContext::new(Some(url.as_str())))?;

        let mut written = 0;
        for reading in survivors {
            if write(&self.store, &self.events, reading).await {
                written += 1;
            }
        }
        Ok(written)
    }

    fn run_steps(&mut self, reading: Reading, ctx: &StepContext<'_>) -> Result<Vec<Reading>> {
        let mut current = vec![reading];

        for step in &mut self.steps {
            let mut next = Vec::with_capacity(current.len());
            for reading in current {
                let id = reading.id.clone();
                let flow = catch_unwind(AssertUnwindSafe(|| step.handle(reading, ctx)))
                    .map_err(|_| PipelineError::step_panicked(step.name(), &id))??;
                match flow {
                    Flow::Next(reading) => next.push(reading),
                    Flow::Batch(batch) => next.extend(batch),
                    Flow::Hold => trace!(sensor = %id, step = step.name(), "Reading held"),
                    Flow::Drop => debug!(sensor = %id, step = step.name(), "Reading dropped"),
                }
            }
            if next.is_empty() {
                return Ok(next);
            }
            current = next;
        }
        Ok(current)
    }
}

/// Terminal step: apply the reading to its sensor's state.
async fn write(
    store: &SensorStateStore,
    events: &broadcast::Sender<StateChange>,
    reading: Reading,
) -> bool {
    match store.apply(&reading).await {
        Ok(state) => {
            trace!(sensor = %state.id, value = %state.latest, "State updated");
            // No subscribers is fine
            let _ = events.send(StateChange {
                id: state.id,
                value: state.latest,
                status: state.status,
                time: reading.time,
            });
            true
        }
        Err(Error::UnknownSensor(id)) => {
            warn!(sensor = %id, "Reading for unknown sensor dropped");
            false
        }
        Err(e) => {
            error!(sensor = %reading.id, error = %e, "Store write failed");
            false
        }
    }
}

/// Counters reported when a consumer stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Readings taken from the channel.
    pub received: u64,

    /// Readings written to the store.
    pub stored: u64,

    /// Readings aborted by a failing or panicking step.
    pub failed: u64,
}

/// Runs a [`Pipeline`] on its own task.
#[derive(Debug)]
pub struct PipelineConsumer {
    tx: mpsc::Sender<Reading>,
    events: broadcast::Sender<StateChange>,
    store: SensorStateStore,
    token: CancellationToken,
    task: JoinHandle<ConsumerStats>,
}

impl PipelineConsumer {
    /// Spawn a consumer task for `pipeline` with the default channel capacity.
    pub fn spawn(pipeline: Pipeline, token: CancellationToken) -> Self {
        Self::with_capacity(pipeline, READING_CHANNEL_CAPACITY, token)
    }

    /// Spawn a consumer task whose input channel holds `capacity` readings.
    ///
    /// The task stops once every sender is dropped or `token` is cancelled;
    /// readings already queued are still processed.
    pub fn with_capacity(pipeline: Pipeline, capacity: usize, token: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let events = pipeline.events.clone();
        let store = pipeline.store.clone();
        let task = tokio::spawn(Self::run(pipeline, rx, token.clone()));

        Self {
            tx,
            events,
            store,
            token,
            task,
        }
    }

    /// Sender feeding the consumer (for sampling tasks).
    pub fn sender(&self) -> mpsc::Sender<Reading> {
        self.tx.clone()
    }

    /// Store written by the consumer.
    pub fn store(&self) -> &SensorStateStore {
        &self.store
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.events.subscribe()
    }

    /// Queue a reading for processing.
    ///
    /// # Errors
    ///
    /// Returns `Error::ShuttingDown` once the consumer stopped.
    pub async fn ingest(&self, reading: Reading) -> wotkit_core::Result<()> {
        if self.token.is_cancelled() {
            return Err(Error::ShuttingDown);
        }
        self.tx.send(reading).await.map_err(|_| Error::ShuttingDown)
    }

    /// Stop the consumer after it processed the queued readings.
    pub async fn shutdown(self) -> ConsumerStats {
        self.token.cancel();
        drop(self.tx);

        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Pipeline consumer task failed");
                ConsumerStats::default()
            }
        }
    }

    async fn run(
        mut pipeline: Pipeline,
        mut rx: mpsc::Receiver<Reading>,
        token: CancellationToken,
    ) -> ConsumerStats {
        let mut stats = ConsumerStats::default();

        loop {
            tokio::select! {
                reading = rx.recv() => match reading {
                    Some(reading) => Self::consume(&mut pipeline, reading, &mut stats).await,
                    None => break,
                },
                _ = token.cancelled() => {
                    rx.close();
                    while let Some(reading) = rx.recv().await {
                        Self::consume(&mut pipeline, reading, &mut stats).await;
                    }
                    break;
                }
            }
        }

        info!(
            received = stats.received,
            stored = stats.stored,
            failed = stats.failed,
            "Pipeline consumer stopped"
        );
        stats
    }

    async fn consume(pipeline: &mut Pipeline, reading: Reading, stats: &mut ConsumerStats) {
        stats.received += 1;
        let id = reading.id.clone();

        match pipeline.process(reading).await {
            Ok(written) => stats.stored += written as u64,
            Err(e) => {
                stats.failed += 1;
                log_step_failure(&id, &e);
            }
        }
    }
}

fn log_step_failure(id: &str, error: &PipelineError) {
    warn!(sensor = %id, error = %error, "Pipeline step failed, reading aborted");
}
