use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Timestamp has no determinable offset: {0}")]
    NaiveTimestamp(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Helper for mapping any decode failure into a malformed-input error
pub fn malformed<E: ToString>(err: E) -> CoreError {
    CoreError::MalformedInput(err.to_string())
}

impl CoreError {
    /// Short machine-friendly code used in diagnostics.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::MalformedInput(_) => "MALFORMED_INPUT",
            CoreError::NaiveTimestamp(_) => "NAIVE_TIMESTAMP",
            CoreError::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }
}
