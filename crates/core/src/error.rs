use kiln_api::ApiError;
use kiln_classfile::ClassFileError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KilnError {
    #[error("Store error: {0}")]
    Store(#[from] ApiError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Class file error: {0}")]
    ClassFile(#[from] ClassFileError),
    /// A stale artifact could not be removed. Aborts the pass.
    #[error("Cannot delete stale artifact {path}: {source}")]
    StaleArtifact {
        path: String,
        #[source]
        source: ApiError,
    },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl KilnError {
    /// Errors that must stop the running pass.
    pub fn is_fatal(&self) -> bool {
        matches!(self, KilnError::StaleArtifact { .. } | KilnError::Internal(_))
    }
}

impl<T> From<std::sync::PoisonError<T>> for KilnError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        KilnError::Internal(format!("lock poisoned: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, KilnError>;
