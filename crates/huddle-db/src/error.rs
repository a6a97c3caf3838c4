use thiserror::Error;

/// Store-level failure taxonomy. Guard and existence checks fail fast
/// inside the same connection closure as the write, so any error here
/// means no rows were changed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("database lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        StoreError::Validation(msg.into())
    }
}
