//! Store errors.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store root {0} does not exist")]
    RootMissing(PathBuf),

    #[error("Store root {0} is not a directory")]
    RootNotDirectory(PathBuf),

    #[error("Store root {path} is not accessible: {source}")]
    RootInaccessible {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Trust anchor {path} is not readable: {source}")]
    TrustAnchor {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Trust anchor {0} lists no key identifiers")]
    EmptyTrustAnchor(PathBuf),

    #[error("Key identifier must be 16 hexadecimal characters, got {0:?}")]
    InvalidKeyFormat(String),

    #[error("No such secret exists")]
    SecretNotFound,

    #[error("Secret {path} is not readable: {source}")]
    SecretUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read secret {path}: {source}")]
    SecretReadFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Store listing task failed: {0}")]
    Listing(String),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::InvalidKeyFormat(_) => ErrorKind::Validation,
            StoreError::SecretNotFound => ErrorKind::NotFound,
            StoreError::SecretUnavailable { .. } | StoreError::Timeout { .. } => {
                ErrorKind::Unavailable
            }
            StoreError::RootMissing(_)
            | StoreError::RootNotDirectory(_)
            | StoreError::RootInaccessible { .. }
            | StoreError::TrustAnchor { .. }
            | StoreError::EmptyTrustAnchor(_)
            | StoreError::SecretReadFailure { .. }
            | StoreError::Listing(_) => ErrorKind::Internal,
        }
    }
}
