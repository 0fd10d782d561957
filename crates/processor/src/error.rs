use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessorError>;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Batch worker failed: {0}")]
    Worker(String),

    #[error("Batch context has no open transaction")]
    NoOpenTransaction,

    #[error("Notification failed: {0}")]
    Notification(String),
}
