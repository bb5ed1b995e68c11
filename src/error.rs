use thiserror::Error;

#[derive(Error, Debug)]
pub enum FacecamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Identity store error: {0}")]
    Store(#[from] StoreError),

    #[error("Embedding oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Enrollment error: {0}")]
    Enrollment(#[from] EnrollmentError),

    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl FacecamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Failures raised by the identity store and its persistence collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Identity '{name}' already exists")]
    DuplicateName { name: String },

    #[error("Identity '{name}' not found")]
    NotFound { name: String },

    #[error("Invalid identity name: {reason}")]
    InvalidName { reason: String },

    #[error("Identity '{name}' has no descriptors")]
    EmptyDescriptors { name: String },

    #[error("Persistence I/O failure on '{key}': {details}")]
    Io { key: String, details: String },

    #[error("Malformed record under '{key}': {details}")]
    Corrupt { key: String, details: String },

    #[error("Identity store used before load")]
    NotLoaded,
}

impl StoreError {
    pub fn io<K: Into<String>, D: ToString>(key: K, details: D) -> Self {
        Self::Io {
            key: key.into(),
            details: details.to_string(),
        }
    }
}

/// Failures of a forward pass (frame acquisition or embedding inference)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("Transient forward pass failure: {details}")]
    Transient { details: String },

    #[error("Fatal forward pass failure: {details}")]
    Fatal { details: String },
}

impl OracleError {
    pub fn transient<S: Into<String>>(details: S) -> Self {
        Self::Transient {
            details: details.into(),
        }
    }

    pub fn fatal<S: Into<String>>(details: S) -> Self {
        Self::Fatal {
            details: details.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, OracleError::Fatal { .. })
    }

    /// Short text suitable for the operator status line
    pub fn user_message(&self) -> String {
        match self {
            OracleError::Transient { details } => format!("Frame skipped: {}", details),
            OracleError::Fatal { details } => format!("Detection halted: {}", details),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnrollmentError {
    #[error("No enrollment session is active")]
    NotStarted,

    #[error("Enrollment for '{name}' is incomplete ({accumulated}/{target} samples)")]
    Incomplete {
        name: String,
        accumulated: usize,
        target: usize,
    },

    #[error("Invalid sample count {requested} (allowed 1..={max})")]
    InvalidSampleCount { requested: usize, max: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    #[error("Cannot {command} while in {mode} mode")]
    InvalidTransition { mode: String, command: String },

    #[error("Controller is not running")]
    Unavailable,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, FacecamError>;
