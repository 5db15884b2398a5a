//! Middleware contract and built-in operators.
//!
//! A middleware step receives one reading at a time and decides what happens
//! to it through the returned [`Flow`]:
//!
//! | flow          | effect                                                  |
//! |---------------|---------------------------------------------------------|
//! | `Next(r)`     | pass `r` (unchanged or transformed) to the next step    |
//! | `Batch(rs)`   | forward every reading of `rs`, in order                 |
//! | `Hold`        | keep the reading inside the step for now                |
//! | `Drop`        | discard the reading, ending the chain for it            |
//!
//! Returning an error aborts the reading's journey. Nothing has been written
//! to the state store at that point, since the store write is the terminal
//! step of the pipeline.
//!
//! # Built-in operators
//!
//! - [`RangeFilter`] drops numeric values outside an inclusive range
//! - [`WindowAverage`] replaces every `size` numeric values by their mean
//! - [`BoundedQueue`] buffers readings and releases them as one batch
//! - [`Scoped`] applies an inner step only to sensors matching a URL pattern
//! - [`Inspect`] observes readings without changing them
//!
//! Closures become steps through [`from_fn`].

use crate::error::{PipelineError, Result};
use std::collections::{HashMap, VecDeque};
use tracing::trace;
use wotkit_core::{Reading, SensorAddress, SensorValue};

/// What a step decided for a reading.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Forward the reading.
    Next(Reading),

    /// Forward several readings.
    Batch(Vec<Reading>),

    /// The step kept the reading.
    Hold,

    /// The reading was discarded.
    Drop,
}

/// Information about the sensor a reading belongs to.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepContext<'a> {
    url: Option<&'a str>,
}

impl<'a> StepContext<'a> {
    /// Context for a reading from the sensor at `url`.
    pub fn new(url: Option<&'a str>) -> Self {
        Self { url }
    }

    /// Addressing URL of the sensor, if the sensor is registered.
    pub fn url(&self) -> Option<&'a str> {
        self.url
    }
}

/// A pipeline step.
pub trait Middleware: Send + 'static {
    /// Name used in logs and errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Handle one reading.
    fn handle(&mut self, reading: Reading, ctx: &StepContext<'_>) -> Result<Flow>;
}

impl Middleware for Box<dyn Middleware> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn handle(&mut self, reading: Reading, ctx: &StepContext<'_>) -> Result<Flow> {
        (**self).handle(reading, ctx)
    }
}

/// Step built from a closure. See [`from_fn`].
pub struct FnStep<F> {
    name: String,
    f: F,
}

/// Turn a closure into a named pipeline step.
///
/// # Examples
///
/// ```
/// use wotkit_pipeline::middleware::{Flow, from_fn};
/// use wotkit_core::{Reading, SensorValue};
///
/// let celsius_to_kelvin = from_fn("kelvin", |mut reading: Reading, _ctx| {
///     if let Some(v) = reading.value.as_f64() {
///         reading.value = SensorValue::Number(v + 273.15);
///     }
///     Ok(Flow::Next(reading))
/// });
/// ```
pub fn from_fn<F>(name: impl Into<String>, f: F) -> FnStep<F>
where
    F: FnMut(Reading, &StepContext<'_>) -> Result<Flow> + Send + 'static,
{
    FnStep {
        name: name.into(),
        f,
    }
}

impl<F> Middleware for FnStep<F>
where
    F: FnMut(Reading, &StepContext<'_>) -> Result<Flow> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&mut self, reading: Reading, ctx: &StepContext<'_>) -> Result<Flow> {
        (self.f)(reading, ctx)
    }
}

/// Drops numeric values outside `[min, max]`.
///
/// Non-numeric values pass unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeFilter {
    min: f64,
    max: f64,
}

impl RangeFilter {
    /// Keep values between `min` and `max`, both inclusive.
    pub fn between(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

impl Middleware for RangeFilter {
    fn name(&self) -> &str {
        "range-filter"
    }

    fn handle(&mut self, reading: Reading, _ctx: &StepContext<'_>) -> Result<Flow> {
        match reading.value.as_f64() {
            Some(v) if v.is_nan() || v < self.min || v > self.max => {
                trace!(sensor = %reading.id, value = v, "Out of range, dropped");
                Ok(Flow::Drop)
            }
            _ => Ok(Flow::Next(reading)),
        }
    }
}

/// Emits the mean of every `size` consecutive numeric values of a sensor.
///
/// The emitted reading carries the fields of the last reading of the window.
/// Non-numeric values pass unchanged and do not enter the window.
#[derive(Debug, Clone)]
pub struct WindowAverage {
    size: usize,
    windows: HashMap<String, Vec<f64>>,
}

impl WindowAverage {
    /// Average over `size` values. A size of zero is treated as one.
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            windows: HashMap::new(),
        }
    }
}

impl Middleware for WindowAverage {
    fn name(&self) -> &str {
        "window-average"
    }

    fn handle(&mut self, mut reading: Reading, _ctx: &StepContext<'_>) -> Result<Flow> {
        let Some(value) = reading.value.as_f64() else {
            return Ok(Flow::Next(reading));
        };
        if !value.is_finite() {
            return Err(PipelineError::invalid_value(
                &reading.id,
                format!("can not average {value}"),
            ));
        }

        let window = self.windows.entry(reading.id.clone()).or_default();
        window.push(value);
        if window.len() < self.size {
            return Ok(Flow::Hold);
        }

        let mean = window.iter().sum::<f64>() / window.len() as f64;
        window.clear();
        reading.value = SensorValue::Number(mean);
        Ok(Flow::Next(reading))
    }
}

/// Buffers readings per sensor and releases them as one batch once
/// `capacity` readings are queued.
#[derive(Debug, Clone)]
pub struct BoundedQueue {
    capacity: usize,
    queues: HashMap<String, VecDeque<Reading>>,
}

impl BoundedQueue {
    /// Queue up to `capacity` readings. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            queues: HashMap::new(),
        }
    }

    /// Number of readings currently queued for a sensor.
    pub fn queued(&self, id: &str) -> usize {
        self.queues.get(id).map_or(0, VecDeque::len)
    }
}

impl Middleware for BoundedQueue {
    fn name(&self) -> &str {
        "bounded-queue"
    }

    fn handle(&mut self, reading: Reading, _ctx: &StepContext<'_>) -> Result<Flow> {
        let capacity = self.capacity;
        let queue = self
            .queues
            .entry(reading.id.clone())
            .or_insert_with(|| VecDeque::with_capacity(capacity));
        queue.push_back(reading);

        if queue.len() < capacity {
            return Ok(Flow::Hold);
        }
        Ok(Flow::Batch(queue.drain(..).collect()))
    }
}

/// Applies an inner step only to sensors whose URL matches a pattern.
///
/// Patterns address `/<network>/<address>/<model>` segment by segment,
/// case-insensitively; `*` matches any segment and missing trailing segments
/// match anything. Readings of other sensors pass unchanged.
///
/// # Examples
///
/// ```
/// use wotkit_pipeline::middleware::{RangeFilter, Scoped};
///
/// // Only filter 1-Wire temperature sensors, whatever their address.
/// let step = Scoped::new("/w1/*/ds18b20", RangeFilter::between(-55.0, 125.0));
/// assert!(step.matches("sensorjs:///w1/28-0000/DS18B20/ds18b20-28"));
/// assert!(!step.matches("sensorjs:///i2c/0x40/htu21d/htu21d-0x40"));
/// ```
pub struct Scoped<M> {
    pattern: Vec<String>,
    inner: M,
}

impl<M: Middleware> Scoped<M> {
    /// Scope `inner` to sensors matching `pattern`.
    pub fn new(pattern: &str, inner: M) -> Self {
        let pattern = pattern
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
            .collect();
        Self { pattern, inner }
    }

    /// Check if the sensor at `url` is in scope.
    pub fn matches(&self, url: &str) -> bool {
        let Ok(address) = SensorAddress::parse(url) else {
            return false;
        };
        let segments = [&address.network, &address.address, &address.model];

        self.pattern.len() <= segments.len()
            && self
                .pattern
                .iter()
                .zip(segments)
                .all(|(p, s)| p == "*" || p.eq_ignore_ascii_case(s))
    }
}

impl<M: Middleware> Middleware for Scoped<M> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn handle(&mut self, reading: Reading, ctx: &StepContext<'_>) -> Result<Flow> {
        match ctx.url() {
            Some(url) if self.matches(url) => self.inner.handle(reading, ctx),
            _ => Ok(Flow::Next(reading)),
        }
    }
}

/// Calls a hook with every reading and passes it on unchanged.
pub struct Inspect<F> {
    hook: F,
}

impl<F> Inspect<F>
where
    F: FnMut(&Reading) + Send + 'static,
{
    /// Observe readings with `hook`.
    pub fn new(hook: F) -> Self {
        Self { hook }
    }
}

impl<F> Middleware for Inspect<F>
where
    F: FnMut(&Reading) + Send + 'static,
{
    fn name(&self) -> &str {
        "inspect"
    }

    fn handle(&mut self, reading: Reading, _ctx: &StepContext<'_>) -> Result<Flow> {
        trace!(sensor = %reading.id, value = %reading.value, "Inspect");
        (self.hook)(&reading);
        Ok(Flow::Next(reading))
    }
}
