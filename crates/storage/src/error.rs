use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("user not authenticated")]
    NotAuthenticated,

    #[error("rejected by store: {0}")]
    Rejected(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("core error: {0}")]
    Core(#[from] labnote_core::CoreError),
}
