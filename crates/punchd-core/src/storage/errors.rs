use crate::errors::PunchdError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Store file unavailable at '{path}': {message}")]
    Unavailable { path: String, message: String },

    #[error("Failed to encode or decode value for key '{key}': {message}")]
    Serialization { key: String, message: String },

    #[error("IO error accessing store: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl PunchdError for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            StorageError::Unavailable { .. } => "STORE_UNAVAILABLE",
            StorageError::Serialization { .. } => "STORE_SERIALIZATION_ERROR",
            StorageError::Io { .. } => "STORE_IO_ERROR",
        }
    }
}
