//! Registry errors

use thiserror::Error;

/// Registry-specific errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Secret '{0}' already exists")]
    AlreadyExists(String),

    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("Decryption failure: {0}")]
    DecryptionFailure(String),

    #[error("Failed to persist store: {0}")]
    PersistenceFailure(String),

    #[error("Key material error: {0}")]
    KeyMaterial(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
