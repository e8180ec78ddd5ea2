use thiserror::Error;

/// Per-request failures raised by the domain model and services.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CareError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: u64 },

    #[error("Invalid state: {0}")]
    State(String),
}

impl CareError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CareError::Validation(msg.into())
    }

    pub fn not_found(kind: &'static str, id: u64) -> Self {
        CareError::NotFound { kind, id }
    }

    pub fn state(msg: impl Into<String>) -> Self {
        CareError::State(msg.into())
    }
}

pub type CareResult<T> = Result<T, CareError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
