//! Actuator lifecycle controller.
//!
//! The [`ActuatorController`] issues commands to addressable actuators and
//! guarantees that every command is followed by a clear:
//!
//! - without a duration (or with `duration = 0`) the actuator is cleared and
//!   released as soon as the command completes;
//! - with `duration = D > 0` a clear task fires after `D` on its own Tokio
//!   task, so the caller returns immediately;
//! - when the command fails the actuator is cleared right away and the
//!   error is returned.
//!
//! # Sessions
//!
//! Commands are serialized per physical device (`network/address/model`).
//! At most one handle per device is alive at any time. A command for a device
//! whose previous command still waits for its clear is handled according to
//! the configured [`RetriggerPolicy`]:
//!
//! | policy    | behavior                                                       |
//! |-----------|----------------------------------------------------------------|
//! | `Queue`   | wait for the pending clear to fire, then issue the command     |
//! | `Replace` | cancel the timer, clear and release now, then issue the command |
//! | `Reject`  | fail with `Error::ActuatorBusy`                                |
//!
//! # Shutdown
//!
//! [`shutdown`](ActuatorController::shutdown) cancels every pending timer.
//! Cancelled sessions clear their actuator immediately instead of waiting for
//! the timer, so no actuator stays energized after the gateway stops.
//!
//! # Examples
//!
//! ```no_run
//! use wotkit_hardware::controller::ActuatorController;
//! use wotkit_hardware::mock::MockDriver;
//! use wotkit_core::{CommandOptions, RetriggerPolicy};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> wotkit_core::Result<()> {
//!     let controller = ActuatorController::new(Arc::new(MockDriver::new()), RetriggerPolicy::Replace);
//!
//!     controller
//!         .set_command(
//!             "sensorjs:///gpio/18/rgbLed/rgbLed-18",
//!             "powerOn",
//!             &CommandOptions::with_duration(Duration::from_millis(500)),
//!         )
//!         .await?;
//!
//!     controller.shutdown().await;
//!     Ok(())
//! }
//! ```

use crate::sampler::{TaskTermination, classify_task_result};
use crate::traits::{ActuatorDevice, DriverResolver};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wotkit_core::{CommandOptions, Error, PinCommand, Result, RetriggerPolicy, SensorAddress};

/// A command whose clear has not fired yet.
#[derive(Debug)]
struct PendingClear {
    url: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Per-device session slot. Its lock serializes commands to one device.
#[derive(Debug, Default)]
struct Slot {
    pending: Option<PendingClear>,
}

struct ControllerInner<R> {
    resolver: Arc<R>,
    policy: RetriggerPolicy,
    slots: Mutex<HashMap<String, Arc<Mutex<Slot>>>>,
    token: CancellationToken,
}

/// Issues actuator commands and schedules their clears.
///
/// Cloning is cheap and shares all sessions.
pub struct ActuatorController<R> {
    inner: Arc<ControllerInner<R>>,
}

impl<R> Clone for ActuatorController<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: DriverResolver> ActuatorController<R> {
    /// Create a controller constructing handles through `resolver`.
    pub fn new(resolver: Arc<R>, policy: RetriggerPolicy) -> Self {
        Self::with_token(resolver, policy, CancellationToken::new())
    }

    /// Create a controller whose sessions are cancelled with `token`.
    pub fn with_token(resolver: Arc<R>, policy: RetriggerPolicy, token: CancellationToken) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                resolver,
                policy,
                slots: Mutex::new(HashMap::new()),
                token,
            }),
        }
    }

    /// Policy applied to re-triggered devices.
    pub fn policy(&self) -> RetriggerPolicy {
        self.inner.policy
    }

    /// Check if the controller refuses new commands.
    pub fn is_shutting_down(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Send `command` to the actuator at `url` and schedule its clear.
    ///
    /// Returns once the command completed; a timed clear keeps running in the
    /// background.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument` if `url` or `command` is empty (no I/O done)
    /// - `Error::UnresolvedAddress` if the driver cannot resolve `url`
    /// - `Error::ActuatorBusy` under `RetriggerPolicy::Reject`
    /// - `Error::Hardware` if the command failed (the actuator was cleared)
    /// - `Error::ShuttingDown` after [`shutdown`](Self::shutdown)
    pub async fn set_command(&self, url: &str, command: &str, options: &CommandOptions) -> Result<()> {
        if url.trim().is_empty() || command.trim().is_empty() {
            return Err(Error::invalid_argument(
                "actuator url and command can not be empty",
            ));
        }
        if self.is_shutting_down() {
            return Err(Error::ShuttingDown);
        }

        let address = self.inner.resolver.resolve(url)?;
        let key = address.device_key();
        let slot = self.slot(&key).await;
        let mut slot = slot.lock().await;

        if let Some(pending) = slot.pending.take() {
            if pending.task.is_finished() {
                wait_released(pending).await;
            } else {
                match self.inner.policy {
                    RetriggerPolicy::Reject => {
                        slot.pending = Some(pending);
                        return Err(Error::ActuatorBusy(key));
                    }
                    RetriggerPolicy::Queue => {
                        debug!(device = %key, "Queueing command behind pending clear");
                        wait_released(pending).await;
                    }
                    RetriggerPolicy::Replace => {
                        debug!(device = %key, "Replacing pending clear");
                        pending.cancel.cancel();
                        wait_released(pending).await;
                    }
                }
            }
        }

        if self.is_shutting_down() {
            return Err(Error::ShuttingDown);
        }

        let mut actuator = self.inner.resolver.create_actuator(url)?;
        info!(url, command, duration_ms = ?options.duration_ms, "Set actuator");

        let outcome = actuator.set(command, options).await;
        match (outcome, options.hold()) {
            (Ok(()), Some(hold)) => {
                let cancel = self.inner.token.child_token();
                let task = tokio::spawn(clear_after(actuator, hold, cancel.clone()));
                slot.pending = Some(PendingClear {
                    url: url.to_string(),
                    cancel,
                    task,
                });
                Ok(())
            }
            (Ok(()), None) => {
                clear_now(actuator).await;
                Ok(())
            }
            (Err(e), _) => {
                warn!(url, command, error = %e, "Actuator command failed, clearing");
                clear_now(actuator).await;
                Err(e.into())
            }
        }
    }

    /// Issue one command per entry to actuators of `model` on `network`.
    ///
    /// Each entry is addressed as `sensorjs:///<network>/<pin>/<model>/<model>-<pin>`
    /// and issued independently and concurrently.
    ///
    /// Returns `Ok(true)` when every command was accepted and `Ok(false)` when
    /// at least one failed (failures are logged).
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` before any I/O if `network` or `model`
    /// is empty, `commands` is empty, or any entry has an empty command.
    pub async fn set_commands(
        &self,
        network: &str,
        model: &str,
        commands: &[PinCommand],
        options: &CommandOptions,
    ) -> Result<bool> {
        if network.trim().is_empty() || model.trim().is_empty() || commands.is_empty() {
            return Err(Error::invalid_argument(
                "network, model and commands can not be empty",
            ));
        }
        if let Some(entry) = commands
            .iter()
            .find(|c| c.pin.trim().is_empty() || c.command.trim().is_empty())
        {
            return Err(Error::invalid_argument(format!(
                "command entry has an empty pin or command: {entry:?}"
            )));
        }

        let issued = commands.iter().map(|entry| {
            let url = SensorAddress::actuator_url(network, &entry.pin, model);
            async move {
                let result = self.set_command(&url, &entry.command, options).await;
                (url, result)
            }
        });

        let mut accepted = true;
        for (url, result) in join_all(issued).await {
            if let Err(e) = result {
                warn!(url, error = %e, "Batch actuator command failed");
                accepted = false;
            }
        }
        Ok(accepted)
    }

    /// Addressing URLs of sessions whose clear is still pending.
    pub async fn pending(&self) -> Vec<String> {
        let slots: Vec<_> = self.inner.slots.lock().await.values().cloned().collect();

        let mut urls = Vec::new();
        for slot in slots {
            if let Ok(slot) = slot.try_lock()
                && let Some(pending) = &slot.pending
                && !pending.task.is_finished()
            {
                urls.push(pending.url.clone());
            }
        }
        urls.sort();
        urls
    }

    /// Cancel every pending clear timer, clear those actuators now and refuse
    /// further commands.
    pub async fn shutdown(&self) {
        self.inner.token.cancel();

        let slots: Vec<_> = self.inner.slots.lock().await.values().cloned().collect();
        let mut released = 0usize;

        for slot in slots {
            if let Some(pending) = slot.lock().await.pending.take() {
                pending.cancel.cancel();
                wait_released(pending).await;
                released += 1;
            }
        }

        info!(released, "Actuator controller stopped");
    }

    async fn slot(&self, key: &str) -> Arc<Mutex<Slot>> {
        let mut slots = self.inner.slots.lock().await;
        Arc::clone(slots.entry(key.to_string()).or_default())
    }
}

/// Wait for a pending session to clear and release its handle.
async fn wait_released(pending: PendingClear) {
    let PendingClear { url, task, .. } = pending;
    match classify_task_result(task.await.map(Ok::<(), ()>)) {
        TaskTermination::Panic => error!(url = %url, "Actuator clear task panicked"),
        TaskTermination::Cancelled => warn!(url = %url, "Actuator clear task aborted"),
        TaskTermination::Success | TaskTermination::Error => {}
    }
}

async fn clear_after<A: ActuatorDevice>(actuator: A, hold: Duration, cancel: CancellationToken) {
    tokio::select! {
        _ = tokio::time::sleep(hold) => {
            info!(url = actuator.address(), ?hold, "Actuator clearing after hold");
        }
        _ = cancel.cancelled() => {
            debug!(url = actuator.address(), "Actuator clear timer cancelled, clearing now");
        }
    }
    clear_now(actuator).await;
}

/// Clear the actuator and release its handle.
async fn clear_now<A: ActuatorDevice>(mut actuator: A) {
    if let Err(e) = actuator.clear().await {
        error!(url = actuator.address(), error = %e, "Actuator clear failed");
    }
    debug!(url = actuator.address(), "Actuator released");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ActuatorEventKind, MockDriver};

    const RGB_URL: &str = "sensorjs:///gpio/18/rgbLed/rgbLed-18";
    const RGB_KEY: &str = "gpio/18/rgbLed";

    fn controller(policy: RetriggerPolicy) -> (ActuatorController<MockDriver>, MockDriver) {
        let driver = MockDriver::new();
        let controller = ActuatorController::new(Arc::new(driver.clone()), policy);
        (controller, driver)
    }

    fn kinds(driver: &MockDriver, key: &str) -> Vec<ActuatorEventKind> {
        driver
            .recorder()
            .events_for(key)
            .into_iter()
            .map(|e| e.kind)
            .collect()
    }

    fn set(command: &str) -> ActuatorEventKind {
        ActuatorEventKind::Set(command.to_string())
    }

    #[tokio::test]
    async fn test_empty_arguments_fail_before_io() {
        let (controller, driver) = controller(RetriggerPolicy::Replace);

        let result = controller.set_command("", "powerOn", &CommandOptions::default()).await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));

        let result = controller.set_command(RGB_URL, " ", &CommandOptions::default()).await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));

        assert!(driver.recorder().events().is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_url_is_reported() {
        let (controller, driver) = controller(RetriggerPolicy::Replace);

        let result = controller
            .set_command("sensorjs:///gpio/18", "powerOn", &CommandOptions::default())
            .await;
        assert!(matches!(result, Err(Error::UnresolvedAddress { .. })));
        assert!(driver.recorder().events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_command_without_duration_clears_immediately() {
        let (controller, driver) = controller(RetriggerPolicy::Replace);

        controller
            .set_command(RGB_URL, "powerOn", &CommandOptions::default())
            .await
            .unwrap();

        assert_eq!(kinds(&driver, RGB_KEY), vec![set("powerOn"), ActuatorEventKind::Clear]);
        assert_eq!(driver.recorder().live_handles(RGB_KEY), 0);
        assert!(controller.pending().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_duration_clears_immediately() {
        let (controller, driver) = controller(RetriggerPolicy::Replace);

        let options = CommandOptions { duration_ms: Some(0) };
        controller.set_command(RGB_URL, "powerOn", &options).await.unwrap();

        assert_eq!(kinds(&driver, RGB_KEY), vec![set("powerOn"), ActuatorEventKind::Clear]);
        assert_eq!(driver.recorder().live_handles(RGB_KEY), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_clear_fires_after_duration() {
        let (controller, driver) = controller(RetriggerPolicy::Replace);
        let options = CommandOptions::with_duration(Duration::from_millis(500));

        controller.set_command(RGB_URL, "powerOn", &options).await.unwrap();
        assert_eq!(kinds(&driver, RGB_KEY), vec![set("powerOn")]);
        assert_eq!(driver.recorder().live_handles(RGB_KEY), 1);
        assert_eq!(controller.pending().await, vec![RGB_URL.to_string()]);

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert_eq!(kinds(&driver, RGB_KEY), vec![set("powerOn")]);

        tokio::time::sleep(Duration::from_millis(2)).await;
        let events = driver.recorder().events_for(RGB_KEY);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, ActuatorEventKind::Clear);
        assert!(events[1].at - events[0].at >= Duration::from_millis(500));
        assert_eq!(driver.recorder().live_handles(RGB_KEY), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_command_is_still_cleared() {
        let (controller, driver) = controller(RetriggerPolicy::Replace);
        driver.recorder().set_fail_commands(true);

        let options = CommandOptions::with_duration(Duration::from_millis(500));
        let result = controller.set_command(RGB_URL, "powerOn", &options).await;

        assert!(matches!(result, Err(Error::Hardware(_))));
        assert_eq!(kinds(&driver, RGB_KEY), vec![set("powerOn"), ActuatorEventKind::Clear]);
        assert_eq!(driver.recorder().live_handles(RGB_KEY), 0);
        assert!(controller.pending().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_policy_preempts_pending_clear() {
        let (controller, driver) = controller(RetriggerPolicy::Replace);
        let options = CommandOptions::with_duration(Duration::from_millis(500));

        controller.set_command(RGB_URL, "red", &options).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.set_command(RGB_URL, "green", &options).await.unwrap();

        let events = driver.recorder().events_for(RGB_KEY);
        assert_eq!(
            events.iter().map(|e| e.kind.clone()).collect::<Vec<_>>(),
            vec![set("red"), ActuatorEventKind::Clear, set("green")]
        );
        assert!(events[1].at - events[0].at < Duration::from_millis(500));
        assert_eq!(driver.recorder().peak_handles(RGB_KEY), 1);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(kinds(&driver, RGB_KEY).last(), Some(&ActuatorEventKind::Clear));
        assert_eq!(driver.recorder().live_handles(RGB_KEY), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_policy_waits_for_pending_clear() {
        let (controller, driver) = controller(RetriggerPolicy::Queue);
        let options = CommandOptions::with_duration(Duration::from_millis(500));

        controller.set_command(RGB_URL, "red", &options).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller
            .set_command(RGB_URL, "green", &CommandOptions::default())
            .await
            .unwrap();

        let events = driver.recorder().events_for(RGB_KEY);
        assert_eq!(
            events.iter().map(|e| e.kind.clone()).collect::<Vec<_>>(),
            vec![
                set("red"),
                ActuatorEventKind::Clear,
                set("green"),
                ActuatorEventKind::Clear
            ]
        );
        assert!(events[1].at - events[0].at >= Duration::from_millis(500));
        assert!(events[2].at >= events[1].at);
        assert_eq!(driver.recorder().peak_handles(RGB_KEY), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reject_policy_refuses_busy_actuator() {
        let (controller, driver) = controller(RetriggerPolicy::Reject);
        let options = CommandOptions::with_duration(Duration::from_millis(500));

        controller.set_command(RGB_URL, "red", &options).await.unwrap();
        let result = controller.set_command(RGB_URL, "green", &options).await;
        assert!(matches!(result, Err(Error::ActuatorBusy(ref key)) if key == RGB_KEY));

        tokio::time::sleep(Duration::from_millis(501)).await;
        controller.set_command(RGB_URL, "green", &options).await.unwrap();
        assert_eq!(
            kinds(&driver, RGB_KEY),
            vec![set("red"), ActuatorEventKind::Clear, set("green")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_devices_do_not_interfere() {
        let (controller, driver) = controller(RetriggerPolicy::Reject);
        let options = CommandOptions::with_duration(Duration::from_millis(500));

        controller.set_command(RGB_URL, "red", &options).await.unwrap();
        controller
            .set_command("sensorjs:///gpio/19/rgbLed/rgbLed-19", "blue", &options)
            .await
            .unwrap();

        assert_eq!(controller.pending().await.len(), 2);
        assert_eq!(driver.recorder().live_handles("gpio/19/rgbLed"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_clear() {
        let (controller, driver) = controller(RetriggerPolicy::Replace);
        let options = CommandOptions::with_duration(Duration::from_millis(500));

        controller.set_command(RGB_URL, "powerOn", &options).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        controller.shutdown().await;

        let events = driver.recorder().events_for(RGB_KEY);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, ActuatorEventKind::Clear);
        assert!(events[1].at - events[0].at < Duration::from_millis(500));
        assert_eq!(driver.recorder().live_handles(RGB_KEY), 0);
        assert!(controller.pending().await.is_empty());

        let result = controller
            .set_command(RGB_URL, "powerOn", &CommandOptions::default())
            .await;
        assert!(matches!(result, Err(Error::ShuttingDown)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_commands_synthesizes_urls() {
        let (controller, driver) = controller(RetriggerPolicy::Replace);
        let options = CommandOptions::with_duration(Duration::from_millis(500));

        let accepted = controller
            .set_commands("gpio", "rgbLed", &[PinCommand::new(18, "powerOn")], &options)
            .await
            .unwrap();

        assert!(accepted);
        let events = driver.recorder().events_for(RGB_KEY);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].url, RGB_URL);
        assert_eq!(controller.pending().await, vec![RGB_URL.to_string()]);

        controller.shutdown().await;
        assert_eq!(kinds(&driver, RGB_KEY), vec![set("powerOn"), ActuatorEventKind::Clear]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_commands_issues_every_entry() {
        let (controller, driver) = controller(RetriggerPolicy::Replace);
        let commands = vec![
            PinCommand::new(18, "powerOn"),
            PinCommand::new(19, "powerOff"),
            PinCommand::new(20, "powerOn"),
        ];

        let accepted = controller
            .set_commands("gpio", "rgbLed", &commands, &CommandOptions::default())
            .await
            .unwrap();

        assert!(accepted);
        for key in ["gpio/18/rgbLed", "gpio/19/rgbLed", "gpio/20/rgbLed"] {
            assert_eq!(kinds(&driver, key).len(), 2);
            assert_eq!(driver.recorder().live_handles(key), 0);
        }
        assert_eq!(kinds(&driver, "gpio/19/rgbLed")[0], set("powerOff"));
    }

    #[tokio::test]
    async fn test_set_commands_reports_partial_failure() {
        let (controller, driver) = controller(RetriggerPolicy::Replace);
        driver.recorder().set_fail_commands(true);

        let accepted = controller
            .set_commands(
                "gpio",
                "rgbLed",
                &[PinCommand::new(18, "powerOn")],
                &CommandOptions::default(),
            )
            .await
            .unwrap();

        assert!(!accepted);
    }

    #[tokio::test]
    async fn test_set_commands_validates_arguments() {
        let (controller, driver) = controller(RetriggerPolicy::Replace);
        let options = CommandOptions::default();

        assert!(matches!(
            controller.set_commands("", "rgbLed", &[PinCommand::new(18, "on")], &options).await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            controller.set_commands("gpio", "rgbLed", &[], &options).await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            controller
                .set_commands("gpio", "rgbLed", &[PinCommand::new(18, "on"), PinCommand::new(19, "")], &options)
                .await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(driver.recorder().events().is_empty());
    }
}
