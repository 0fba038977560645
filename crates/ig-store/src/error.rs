use ig_core::NodeId;
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Another writer forwarded the node first.
    #[error("node {0} is already forwarded")]
    ForwardConflict(NodeId),
}

impl StoreError {
    fn is_integrity(&self) -> bool {
        match self {
            StoreError::InvalidData(_) => true,
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => {
                e.code == ErrorCode::ConstraintViolation
            }
            _ => false,
        }
    }
}

/// Corrupt rows and constraint violations are integrity errors; everything
/// else reaches the engine as a retryable store error.
impl From<StoreError> for ig_core::Error {
    fn from(e: StoreError) -> Self {
        if e.is_integrity() {
            ig_core::Error::Integrity(e.to_string())
        } else {
            ig_core::Error::store(e)
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
