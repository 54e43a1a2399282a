use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error, Clone)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed input or envelope. Dropped and logged by the component that
    /// hit it, never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// Storage backend fault. Surfaces to the immediate caller; no internal
    /// retry loops anywhere in this crate.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Validation(e.to_string())
    }
}
