use labnote_core::CoreError;
use labnote_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("backup error: {0}")]
    Backup(String),
}

impl EngineError {
    /// True when the store refused the caller's identity.
    pub fn is_auth(&self) -> bool {
        matches!(self, EngineError::Storage(StorageError::NotAuthenticated))
    }
}
