//! Synthetic readings for mock sensors.
//!
//! In simulation mode every created sensor is backed by a
//! [`MockSensor`](wotkit_hardware::mock::MockSensor). A feeder task per
//! sensor pushes values shaped by the sensor model into its handle, at the
//! sensor's sampling interval.

use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use wotkit_core::{SensorAddress, SensorValue};
use wotkit_hardware::mock::{MockDriver, MockSensorHandle};
use wotkit_pipeline::SensorState;

/// Ticks per full sine period.
const PERIOD_TICKS: f64 = 60.0;

/// Fastest feed rate; drivers may recommend a zero interval.
const MIN_FEED_INTERVAL: Duration = Duration::from_millis(10);

/// Shape of the values fed to one simulated sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    /// `base + amplitude * sin(2π * tick / period)`.
    Sine { base: f64, amplitude: f64 },

    /// `true` on every `every`-th tick.
    Pulse { every: u64 },
}

impl Waveform {
    /// Waveform matching a driver model (case-insensitive).
    pub fn for_model(model: &str) -> Self {
        match model.to_lowercase().as_str() {
            "ds18b20" => Self::Sine {
                base: 22.0,
                amplitude: 3.0,
            },
            "htu21d" => Self::Sine {
                base: 50.0,
                amplitude: 10.0,
            },
            "bh1750" => Self::Sine {
                base: 400.0,
                amplitude: 300.0,
            },
            "motion" => Self::Pulse { every: 5 },
            _ => Self::Sine {
                base: 0.0,
                amplitude: 1.0,
            },
        }
    }

    /// Value at `tick`, rounded to two decimals.
    pub fn sample(&self, tick: u64) -> SensorValue {
        match *self {
            Self::Sine { base, amplitude } => {
                let phase = (tick as f64 / PERIOD_TICKS) * std::f64::consts::TAU;
                let value = base + amplitude * phase.sin();
                SensorValue::Number((value * 100.0).round() / 100.0)
            }
            Self::Pulse { every } => SensorValue::Bool(every > 0 && tick % every == 0),
        }
    }
}

/// Start one feeder task per sensor in `sensors`.
///
/// Sensors whose URL does not parse or that `driver` did not create are
/// skipped. Feeders stop when `token` is cancelled or the sensor is dropped.
pub fn spawn_feeders(
    driver: &MockDriver,
    sensors: &[SensorState],
    token: CancellationToken,
) -> JoinSet<()> {
    let mut feeders = JoinSet::new();

    for state in sensors {
        let model = match SensorAddress::parse(&state.url) {
            Ok(address) => address.model,
            Err(e) => {
                warn!(sensor = %state.id, error = %e, "Not simulating sensor");
                continue;
            }
        };
        let Some(handle) = driver.sensor_handle(&state.id) else {
            warn!(sensor = %state.id, "No mock handle for sensor");
            continue;
        };

        feeders.spawn(feed(
            handle,
            Waveform::for_model(&model),
            state.interval(),
            token.child_token(),
        ));
    }

    feeders
}

async fn feed(
    handle: MockSensorHandle,
    waveform: Waveform,
    interval: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval.max(MIN_FEED_INTERVAL));
    let mut tick = 0u64;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if handle.send_value(waveform.sample(tick)).await.is_err() {
            break; // Sensor dropped
        }
        tick = tick.wrapping_add(1);
    }

    debug!(sensor = handle.id(), ticks = tick, "Feeder stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use wotkit_hardware::traits::DriverResolver;

    #[rstest]
    #[case("ds18b20", 19.0, 25.0)]
    #[case("HTU21D", 40.0, 60.0)]
    #[case("bh1750", 100.0, 700.0)]
    fn test_sine_stays_in_band(#[case] model: &str, #[case] low: f64, #[case] high: f64) {
        let waveform = Waveform::for_model(model);

        for tick in 0..120 {
            let value = waveform.sample(tick).as_f64().unwrap();
            assert!(value >= low && value <= high, "{model} tick {tick}: {value}");
        }
    }

    #[test]
    fn test_pulse() {
        let waveform = Waveform::for_model("motion");

        assert_eq!(waveform.sample(0), SensorValue::Bool(true));
        assert_eq!(waveform.sample(1), SensorValue::Bool(false));
        assert_eq!(waveform.sample(5), SensorValue::Bool(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_feeder_drives_mock_sensor() {
        use wotkit_hardware::traits::SensorDevice;

        let driver = MockDriver::new();
        let url = "sensorjs:///i2c/0x40/htu21d/htu21d-0x40";
        let mut sensor = driver.create_sensor(url).unwrap();
        let state = SensorState::new("htu21d-0x40", url, Duration::from_millis(100), 4);

        let token = CancellationToken::new();
        let mut feeders = spawn_feeders(&driver, &[state], token.clone());

        let first = sensor.read_value().await.unwrap();
        assert_eq!(first.value, SensorValue::Number(50.0));
        let second = sensor.read_value().await.unwrap();
        assert!(second.value.as_f64().unwrap() > 50.0);

        token.cancel();
        while feeders.join_next().await.is_some() {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_clamped() {
        use wotkit_hardware::traits::SensorDevice;

        let driver = MockDriver::new();
        let url = "sensorjs:///w1/28-0000/ds18b20/ds18b20-28";
        let mut sensor = driver.create_sensor(url).unwrap();
        let state = SensorState::new("ds18b20-28", url, Duration::ZERO, 4);

        let token = CancellationToken::new();
        let mut feeders = spawn_feeders(&driver, &[state], token.clone());

        let start = tokio::time::Instant::now();
        sensor.read_value().await.unwrap();
        sensor.read_value().await.unwrap();
        assert!(start.elapsed() >= MIN_FEED_INTERVAL);

        token.cancel();
        while let Some(result) = feeders.join_next().await {
            assert!(result.is_ok(), "feeder panicked");
        }
    }

    #[test]
    fn test_unknown_sensor_is_skipped() {
        let state = SensorState::new(
            "bh1750-0x23",
            "sensorjs:///i2c/0x23/bh1750/bh1750-0x23",
            Duration::from_millis(100),
            4,
        );
        let feeders = spawn_feeders(&MockDriver::new(), &[state], CancellationToken::new());

        assert!(feeders.is_empty());
    }
}
