//! Sensor state store.
//!
//! Holds one [`SensorState`] per registered sensor: its latest value, the
//! auxiliary fields reported with it and a bounded [`History`] of
//! `(time, value)` pairs.
//!
//! States are created once by [`SensorStateStore::register`] and never
//! removed. Their values change only through the pipeline's terminal write,
//! which is the single writer of the store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use wotkit_core::{Error, Reading, Result, SensorValue};

/// One history sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Time of the reading.
    pub time: DateTime<Utc>,

    /// Value of the reading.
    pub value: SensorValue,
}

/// Capacity-bounded, ordered history (oldest first).
///
/// Pushing into a full history evicts the oldest entry.
///
/// # Examples
///
/// ```
/// use wotkit_pipeline::store::History;
/// use wotkit_core::SensorValue;
/// use chrono::Utc;
///
/// let mut history = History::new(2);
/// for v in [10.0, 20.0, 30.0] {
///     history.push(Utc::now(), SensorValue::Number(v));
/// }
///
/// assert_eq!(history.values(), vec![SensorValue::Number(20.0), SensorValue::Number(30.0)]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct History {
    entries: VecDeque<HistoryEntry>,

    #[serde(skip)]
    capacity: usize,
}

impl History {
    /// Create an empty history. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one when full.
    pub fn push(&mut self, time: DateTime<Utc>, value: SensorValue) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry { time, value });
    }

    /// Maximum number of samples kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of samples kept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no sample was recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Values, oldest first.
    pub fn values(&self) -> Vec<SensorValue> {
        self.entries.iter().map(|e| e.value.clone()).collect()
    }

    /// Most recent sample.
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }
}

/// Live state of one sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorState {
    /// Sensor id, parsed from the addressing URL.
    pub id: String,

    /// Addressing URL of the sensor.
    pub url: String,

    /// Most recent accepted value (`Null` before the first reading).
    pub latest: SensorValue,

    /// Last reported status.
    pub status: Option<String>,

    /// Time of the last accepted reading.
    pub time: Option<DateTime<Utc>>,

    /// Last reported reading type.
    #[serde(rename = "type")]
    pub kind: Option<String>,

    /// Last reported message.
    pub message: Option<String>,

    /// Recent `(time, value)` pairs.
    pub history: History,

    /// Sampling interval in milliseconds.
    pub interval: u64,
}

impl SensorState {
    /// Create the state of a sensor that has not reported yet.
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        interval: Duration,
        history_capacity: usize,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            latest: SensorValue::Null,
            status: None,
            time: None,
            kind: None,
            message: None,
            history: History::new(history_capacity),
            interval: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Sampling interval.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval)
    }

    /// Record an accepted reading.
    fn apply(&mut self, reading: &Reading) {
        self.latest = reading.value.clone();
        self.status = reading.status.clone();
        self.time = Some(reading.time);
        self.kind = reading.kind.clone();
        self.message = reading.message.clone();
        self.history.push(reading.time, reading.value.clone());
    }
}

/// In-memory map from sensor id to [`SensorState`].
///
/// Cloning the store shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct SensorStateStore {
    states: Arc<RwLock<HashMap<String, SensorState>>>,
}

impl SensorStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the state of a newly created sensor.
    ///
    /// # Errors
    ///
    /// Returns `Error::DuplicateSensor` if a state with the same id exists;
    /// the existing state is left untouched.
    pub async fn register(&self, state: SensorState) -> Result<()> {
        let mut states = self.states.write().await;
        if states.contains_key(&state.id) {
            return Err(Error::DuplicateSensor(state.id));
        }

        debug!(sensor = %state.id, url = %state.url, "Sensor state registered");
        states.insert(state.id.clone(), state);
        Ok(())
    }

    /// Apply a reading to the state of its sensor.
    ///
    /// Returns the updated state.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownSensor` if no state exists for `reading.id`;
    /// nothing is modified in that case.
    pub(crate) async fn apply(&self, reading: &Reading) -> Result<SensorState> {
        let mut states = self.states.write().await;
        let state = states
            .get_mut(&reading.id)
            .ok_or_else(|| Error::UnknownSensor(reading.id.clone()))?;

        state.apply(reading);
        Ok(state.clone())
    }

    /// Snapshot of a sensor's state.
    pub async fn get(&self, id: &str) -> Option<SensorState> {
        self.states.read().await.get(id).cloned()
    }

    /// Check if a sensor is registered.
    pub async fn contains(&self, id: &str) -> bool {
        self.states.read().await.contains_key(id)
    }

    /// Addressing URL of a sensor.
    pub async fn url_of(&self, id: &str) -> Option<String> {
        self.states.read().await.get(id).map(|s| s.url.clone())
    }

    /// Ids of all registered sensors, sorted.
    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.states.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered sensors.
    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    /// Check if no sensor is registered.
    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }
}
