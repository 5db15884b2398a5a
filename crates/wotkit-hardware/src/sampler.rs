//! Sensor sampling tasks.
//!
//! The [`SensorSampler`] connects sensor devices to the reading pipeline. Each
//! listened sensor runs in its own async task that reads the device at the
//! sensor's interval and forwards readings to a shared channel.
//!
//! ```text
//! ┌──────────┐       ┌─────────────────┐
//! │ ds18b20  │──────►│                 │
//! │ Task     │       │ Reading Channel │
//! └──────────┘       │  (mpsc)         │──────► Pipeline Consumer
//!                    │                 │
//! ┌──────────┐       │                 │
//! │ htu21d   │──────►│                 │
//! │ Task     │       └─────────────────┘
//! └──────────┘
//! ```
//!
//! Because each device is owned by its task, on-demand reads go through the
//! task as well: a [`SensorReader`] queues a request and the task answers it
//! between two scheduled samples.

use crate::traits::{SensorDevice, SensorSample};
use crate::{HardwareError, Result};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use wotkit_core::Reading;

/// Minimum delay between two reads of the same device (100 Hz maximum).
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Pending on-demand reads per sensor.
const READ_REQUEST_CAPACITY: usize = 8;

type ReadRequest = oneshot::Sender<Result<SensorSample>>;

/// Requests on-demand reads from one sensor's sampling task.
#[derive(Debug, Clone)]
pub struct SensorReader {
    id: String,
    tx: mpsc::Sender<ReadRequest>,
}

impl SensorReader {
    /// Sensor id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Read the device now, outside its sampling schedule.
    ///
    /// The sample goes to the caller only; it is not forwarded to the
    /// reading channel.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::Disconnected` if the sampling task stopped,
    /// otherwise the device's own read error.
    pub async fn read(&self) -> Result<SensorSample> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(reply)
            .await
            .map_err(|_| HardwareError::disconnected(&self.id))?;
        rx.await.map_err(|_| HardwareError::disconnected(&self.id))?
    }
}

enum Wake {
    Sample(Result<SensorSample>),
    Request(ReadRequest),
}

/// Runs one sampling task per listened sensor.
///
/// # Examples
///
/// ```no_run
/// use wotkit_hardware::sampler::SensorSampler;
/// use wotkit_hardware::mock::MockSensor;
/// use tokio::sync::mpsc;
/// use tokio_util::sync::CancellationToken;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let (tx, mut rx) = mpsc::channel(16);
///     let mut sampler = SensorSampler::new(tx, CancellationToken::new());
///
///     let (sensor, handle) = MockSensor::new("htu21d-0x40");
///     sampler.listen("htu21d-0x40", sensor, Duration::from_millis(100));
///
///     handle.send_value(42.0).await.unwrap();
///     let reading = rx.recv().await.unwrap();
///     assert_eq!(reading.id, "htu21d-0x40");
///
///     sampler.shutdown().await;
/// }
/// ```
#[derive(Debug)]
pub struct SensorSampler {
    /// Reading sender (cloned for each task).
    reading_tx: mpsc::Sender<Reading>,

    /// Running sampling tasks.
    tasks: JoinSet<Result<()>>,

    /// On-demand read handles by sensor id.
    readers: HashMap<String, SensorReader>,

    /// Cancels every sampling task.
    token: CancellationToken,
}

impl SensorSampler {
    /// Create a sampler forwarding readings to `reading_tx`.
    ///
    /// Tasks stop when `token` is cancelled.
    pub fn new(reading_tx: mpsc::Sender<Reading>, token: CancellationToken) -> Self {
        Self {
            reading_tx,
            tasks: JoinSet::new(),
            readers: HashMap::new(),
            token,
        }
    }

    /// Start sampling `device` every `interval`, tagging readings with `id`.
    pub fn listen<S: SensorDevice>(&mut self, id: impl Into<String>, device: S, interval: Duration) {
        let id = id.into();
        debug!(sensor = %id, ?interval, "Listening to sensor");

        let (request_tx, request_rx) = mpsc::channel(READ_REQUEST_CAPACITY);
        self.readers.insert(
            id.clone(),
            SensorReader {
                id: id.clone(),
                tx: request_tx,
            },
        );
        self.tasks.spawn(Self::sample_task(
            id,
            device,
            interval,
            self.reading_tx.clone(),
            request_rx,
            self.token.child_token(),
        ));
    }

    /// Number of sampling tasks still running.
    pub fn active(&self) -> usize {
        self.tasks.len()
    }

    /// On-demand read handle of sensor `id`, if it is listened.
    pub fn reader(&self, id: &str) -> Option<SensorReader> {
        self.readers.get(id).cloned()
    }

    /// Stop every sampling task and wait for them to terminate.
    pub async fn shutdown(mut self) {
        self.token.cancel();

        let mut error_count = 0;
        let mut panic_count = 0;

        while let Some(result) = self.tasks.join_next().await {
            match classify_task_result(result) {
                TaskTermination::Success | TaskTermination::Cancelled => {}
                TaskTermination::Error => error_count += 1,
                TaskTermination::Panic => panic_count += 1,
            }
        }

        info!(error_count, panic_count, "Sensor sampler stopped");
    }

    async fn sample_task<S: SensorDevice>(
        id: String,
        mut device: S,
        interval: Duration,
        tx: mpsc::Sender<Reading>,
        mut requests: mpsc::Receiver<ReadRequest>,
        token: CancellationToken,
    ) -> Result<()> {
        let pace = interval.max(MIN_POLL_INTERVAL);

        'sampling: loop {
            let start = tokio::time::Instant::now();

            let wake = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                Some(reply) = requests.recv() => Wake::Request(reply),
                sample = device.read_value() => Wake::Sample(sample),
            };
            let sample = match wake {
                Wake::Sample(sample) => sample,
                Wake::Request(reply) => {
                    if !Self::serve(&id, &mut device, reply, &token).await {
                        break;
                    }
                    continue;
                }
            };

            match sample {
                Ok(sample) => {
                    let reading = sample.into_reading(&id);
                    trace!(sensor = %id, value = %reading.value, "Sampled");

                    // Use try_send to detect backpressure
                    match tx.try_send(reading) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(reading)) => {
                            warn!(sensor = %id, "Reading channel full, waiting");
                            if tx.send(reading).await.is_err() {
                                break; // Channel closed
                            }
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            break; // Channel closed
                        }
                    }
                }
                Err(e @ HardwareError::Disconnected { .. }) => {
                    warn!(sensor = %id, error = %e, "Sensor disconnected, stopping sampler");
                    return Err(e);
                }
                Err(e) => {
                    warn!(sensor = %id, error = %e, "Sensor read failed");
                }
            }

            let deadline = start + pace;
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break 'sampling,
                    Some(reply) = requests.recv() => {
                        if !Self::serve(&id, &mut device, reply, &token).await {
                            break 'sampling;
                        }
                    }
                    _ = tokio::time::sleep_until(deadline) => break,
                }
            }
        }

        debug!(sensor = %id, "Sampler task finished");
        Ok(())
    }

    /// Answer one on-demand read. Returns `false` if cancelled meanwhile.
    async fn serve<S: SensorDevice>(
        id: &str,
        device: &mut S,
        reply: ReadRequest,
        token: &CancellationToken,
    ) -> bool {
        let sample = tokio::select! {
            _ = token.cancelled() => return false,
            sample = device.read_value() => sample,
        };
        trace!(sensor = %id, ok = sample.is_ok(), "On-demand read");

        // Requester may have given up
        let _ = reply.send(sample);
        true
    }
}

/// Task termination classification for shutdown handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskTermination {
    /// Task completed successfully.
    Success,
    /// Task returned an error.
    Error,
    /// Task was cancelled (expected during shutdown).
    Cancelled,
    /// Task panicked.
    Panic,
}

/// Classify the termination status of a task.
pub(crate) fn classify_task_result<T, E>(
    result: std::result::Result<std::result::Result<T, E>, tokio::task::JoinError>,
) -> TaskTermination {
    match result {
        Ok(Ok(_)) => TaskTermination::Success,
        Ok(Err(_)) => TaskTermination::Error,
        Err(e) if e.is_cancelled() => TaskTermination::Cancelled,
        Err(_) => TaskTermination::Panic,
    }
}
