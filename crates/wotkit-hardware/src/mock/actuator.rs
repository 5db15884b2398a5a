//! Mock actuator implementation for testing and development.
//!
//! Every mock actuator reports to a shared [`ActuatorRecorder`], which keeps
//! an ordered log of set/clear calls and counts how many handles are alive
//! per physical device. Tests use the recorder to check clear timing and the
//! one-handle-per-address guarantee of the controller.

use crate::{HardwareError, Result, traits::ActuatorDevice};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;
use wotkit_core::CommandOptions;

/// Kind of call recorded for an actuator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActuatorEventKind {
    /// A command was sent.
    Set(String),

    /// The actuator was cleared.
    Clear,
}

/// A recorded actuator call.
#[derive(Debug, Clone)]
pub struct ActuatorEvent {
    /// Addressing URL of the handle.
    pub url: String,

    /// Physical device key (`network/address/model`).
    pub key: String,

    /// What happened.
    pub kind: ActuatorEventKind,

    /// When it happened (Tokio clock, so paused-time tests can measure it).
    pub at: Instant,
}

#[derive(Debug, Default)]
struct RecorderState {
    events: Vec<ActuatorEvent>,
    live: HashMap<String, usize>,
    peak: HashMap<String, usize>,
}

/// Shared log of mock actuator activity.
#[derive(Debug, Clone, Default)]
pub struct ActuatorRecorder {
    state: Arc<Mutex<RecorderState>>,
    fail_commands: Arc<AtomicBool>,
}

impl ActuatorRecorder {
    fn state(&self) -> MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, url: &str, key: &str, kind: ActuatorEventKind) {
        self.state().events.push(ActuatorEvent {
            url: url.to_string(),
            key: key.to_string(),
            kind,
            at: Instant::now(),
        });
    }

    fn acquire(&self, key: &str) {
        let mut state = self.state();
        let live = {
            let live = state.live.entry(key.to_string()).or_insert(0);
            *live += 1;
            *live
        };
        let peak = state.peak.entry(key.to_string()).or_insert(0);
        *peak = (*peak).max(live);
    }

    fn release(&self, key: &str) {
        if let Some(live) = self.state().live.get_mut(key) {
            *live = live.saturating_sub(1);
        }
    }

    /// Make every subsequent command fail.
    pub fn set_fail_commands(&self, fail: bool) {
        self.fail_commands.store(fail, Ordering::SeqCst);
    }

    fn fails(&self) -> bool {
        self.fail_commands.load(Ordering::SeqCst)
    }

    /// All recorded events in call order.
    pub fn events(&self) -> Vec<ActuatorEvent> {
        self.state().events.clone()
    }

    /// Recorded events for one device key.
    pub fn events_for(&self, key: &str) -> Vec<ActuatorEvent> {
        self.state()
            .events
            .iter()
            .filter(|e| e.key == key)
            .cloned()
            .collect()
    }

    /// Number of handles currently alive for a device key.
    pub fn live_handles(&self, key: &str) -> usize {
        self.state().live.get(key).copied().unwrap_or(0)
    }

    /// Highest number of simultaneously alive handles ever seen for a device key.
    pub fn peak_handles(&self, key: &str) -> usize {
        self.state().peak.get(key).copied().unwrap_or(0)
    }
}

/// Mock actuator device.
///
/// Created by [`MockDriver`](super::MockDriver). Dropping the actuator
/// releases its handle in the recorder.
#[derive(Debug)]
pub struct MockActuator {
    url: String,
    key: String,
    recorder: ActuatorRecorder,
}

impl MockActuator {
    /// Create a mock actuator reporting to `recorder`.
    pub fn new(url: impl Into<String>, key: impl Into<String>, recorder: ActuatorRecorder) -> Self {
        let key = key.into();
        recorder.acquire(&key);
        Self {
            url: url.into(),
            key,
            recorder,
        }
    }

    /// Physical device key of this handle.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl ActuatorDevice for MockActuator {
    fn address(&self) -> &str {
        &self.url
    }

    async fn set(&mut self, command: &str, _options: &CommandOptions) -> Result<()> {
        self.recorder
            .record(&self.url, &self.key, ActuatorEventKind::Set(command.to_string()));

        if self.recorder.fails() {
            return Err(HardwareError::command_failed(command, "mock failure"));
        }
        Ok(())
    }

    async fn clear(&mut self) -> Result<()> {
        self.recorder
            .record(&self.url, &self.key, ActuatorEventKind::Clear);
        Ok(())
    }
}

impl Drop for MockActuator {
    fn drop(&mut self) {
        self.recorder.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_actuator_records_calls() {
        let recorder = ActuatorRecorder::default();
        let mut actuator = MockActuator::new(
            "sensorjs:///gpio/18/rgbLed/rgbLed-18",
            "gpio/18/rgbLed",
            recorder.clone(),
        );

        assert_eq!(actuator.address(), "sensorjs:///gpio/18/rgbLed/rgbLed-18");
        actuator.set("powerOn", &CommandOptions::default()).await.unwrap();
        actuator.clear().await.unwrap();

        let kinds: Vec<_> = recorder.events().into_iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ActuatorEventKind::Set("powerOn".to_string()),
                ActuatorEventKind::Clear
            ]
        );
    }

    #[tokio::test]
    async fn test_mock_actuator_failure_still_records() {
        let recorder = ActuatorRecorder::default();
        recorder.set_fail_commands(true);
        let mut actuator = MockActuator::new("url", "gpio/18/rgbLed", recorder.clone());

        let result = actuator.set("powerOn", &CommandOptions::default()).await;
        assert!(matches!(result, Err(HardwareError::CommandFailed { .. })));
        assert_eq!(recorder.events_for("gpio/18/rgbLed").len(), 1);
    }

    #[test]
    fn test_handle_counting() {
        let recorder = ActuatorRecorder::default();

        let first = MockActuator::new("url", "gpio/18/rgbLed", recorder.clone());
        let second = MockActuator::new("url", "gpio/18/rgbLed", recorder.clone());
        assert_eq!(recorder.live_handles("gpio/18/rgbLed"), 2);

        drop(first);
        drop(second);
        assert_eq!(recorder.live_handles("gpio/18/rgbLed"), 0);
        assert_eq!(recorder.peak_handles("gpio/18/rgbLed"), 2);
    }
}
