use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}
