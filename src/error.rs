use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("descriptor must be {expected} bytes long, got {actual}")]
    DescriptorLength { expected: usize, actual: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to access file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to (de)serialize: {0}")]
    Json(#[from] serde_json::Error),
}
