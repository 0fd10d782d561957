use thiserror::Error;

pub type Result<T> = std::result::Result<T, ImporterError>;

#[derive(Error, Debug)]
pub enum ImporterError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Import worker failed: {0}")]
    Worker(String),

    #[error("Unsupported ruleset id: {0}")]
    UnsupportedRuleset(i16),
}
