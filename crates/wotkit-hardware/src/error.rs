//! Error types for hardware operations.
//!
//! Devices fail in two ways the gateway reacts to differently: a sensor that
//! disconnected stops its sampling task, while a rejected actuator command is
//! reported to the caller and the actuator is cleared.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during hardware device operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Actuator refused or failed to execute a command.
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new command failed error.
    pub fn command_failed(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            message: message.into(),
        }
    }
}

impl From<HardwareError> for wotkit_core::Error {
    fn from(error: HardwareError) -> Self {
        wotkit_core::Error::Hardware(error.to_string())
    }
}
