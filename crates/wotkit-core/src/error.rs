use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Argument errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Sensor errors
    #[error("Unresolved address {url}: {reason}")]
    UnresolvedAddress { url: String, reason: String },

    #[error("Unknown sensor: {0}")]
    UnknownSensor(String),

    #[error("Sensor already registered: {0}")]
    DuplicateSensor(String),

    #[error("Unknown sensor model: {0}")]
    UnknownModel(String),

    // Actuator errors
    #[error("Actuator busy: {0}")]
    ActuatorBusy(String),

    #[error("Hardware operation failed: {0}")]
    Hardware(String),

    // Registry errors
    #[error("Thing is not registered")]
    NotRegistered,

    #[error("Registry transport error{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    RegistryTransport {
        status: Option<u16>,
        message: String,
    },

    // Lifecycle errors
    #[error("Gateway is shutting down")]
    ShuttingDown,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create an unresolved address error.
    pub fn unresolved(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnresolvedAddress {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a registry transport error without an HTTP status.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::RegistryTransport {
            status: None,
            message: message.into(),
        }
    }

    /// Create a registry transport error for a non-success HTTP status.
    pub fn transport_status(status: u16, message: impl Into<String>) -> Self {
        Self::RegistryTransport {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
