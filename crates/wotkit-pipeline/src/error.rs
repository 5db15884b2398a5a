//! Error types for the reading pipeline.

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised while a reading travels through the pipeline.
///
/// A failing step aborts the journey of one reading only; the consumer logs
/// the error and keeps processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A middleware step failed on a reading.
    #[error("Step '{step}' failed on {sensor}: {message}")]
    StepFailed {
        step: String,
        sensor: String,
        message: String,
    },

    /// A middleware step panicked on a reading.
    #[error("Step '{step}' panicked on {sensor}")]
    StepPanicked { step: String, sensor: String },

    /// A reading carried a value the step can not work with.
    #[error("Invalid value for {sensor}: {message}")]
    InvalidValue { sensor: String, message: String },

    /// State store error.
    #[error(transparent)]
    Store(#[from] wotkit_core::Error),
}

impl PipelineError {
    /// Create a step failure error.
    pub fn step_failed(
        step: impl Into<String>,
        sensor: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::StepFailed {
            step: step.into(),
            sensor: sensor.into(),
            message: message.into(),
        }
    }

    /// Create a step panic error.
    pub fn step_panicked(step: impl Into<String>, sensor: impl Into<String>) -> Self {
        Self::StepPanicked {
            step: step.into(),
            sensor: sensor.into(),
        }
    }

    /// Create an invalid value error.
    pub fn invalid_value(sensor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            sensor: sensor.into(),
            message: message.into(),
        }
    }
}
