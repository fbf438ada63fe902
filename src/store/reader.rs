//! Containment-checked secret reads.
//!
//! A `(path, username)` pair names `<root>/<path>/<username>.gpg`. The
//! candidate is canonicalized (resolving `..` and symlinks) and must land
//! strictly inside the canonical store root. Anything else is reported exactly
//! like a missing file.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::{self, File};
use tokio::io::AsyncReadExt;

use super::error::StoreError;
use super::index::SECRET_EXTENSION;

#[derive(Debug, Clone)]
pub struct SecretReader {
    /// Canonical store root.
    root: PathBuf,
    timeout: Duration,
}

impl SecretReader {
    /// `root` must already be canonical, otherwise every read fails
    /// containment.
    pub fn new(root: PathBuf, timeout: Duration) -> Self {
        Self { root, timeout }
    }

    /// Unresolved location for a secret.
    pub fn candidate_path(&self, rel_path: &str, username: &str) -> PathBuf {
        self.root
            .join(rel_path)
            .join(format!("{}.{}", username, SECRET_EXTENSION))
    }

    /// Read the raw ciphertext of one secret.
    pub async fn read_secret(&self, rel_path: &str, username: &str) -> Result<Vec<u8>, StoreError> {
        let candidate = self.candidate_path(rel_path, username);
        tokio::time::timeout(self.timeout, self.read_contained(&candidate))
            .await
            .map_err(|_| StoreError::Timeout {
                operation: "secret read",
                timeout: self.timeout,
            })?
    }

    async fn read_contained(&self, candidate: &Path) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(candidate).await?;

        let mut file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                return Err(StoreError::SecretUnavailable { path, source: e });
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::SecretNotFound);
            }
            Err(e) => return Err(StoreError::SecretReadFailure { path, source: e }),
        };

        let mut data = Vec::new();
        if let Err(source) = file.read_to_end(&mut data).await {
            return Err(StoreError::SecretReadFailure { path, source });
        }
        Ok(data)
    }

    /// Canonical path of an existing regular file inside the root.
    async fn resolve(&self, candidate: &Path) -> Result<PathBuf, StoreError> {
        let resolved = match fs::canonicalize(candidate).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::debug!("Secret {} does not resolve: {}", candidate.display(), e);
                return Err(StoreError::SecretNotFound);
            }
        };

        if resolved == self.root || !resolved.starts_with(&self.root) {
            tracing::warn!(
                "Rejected secret path outside the store: {}",
                candidate.display()
            );
            return Err(StoreError::SecretNotFound);
        }

        match fs::metadata(&resolved).await {
            Ok(metadata) if metadata.is_file() => Ok(resolved),
            _ => Err(StoreError::SecretNotFound),
        }
    }
}
