//! Password store access.
//!
//! A store is a directory laid out the way `pass` lays it out:
//!
//! ```text
//! $PASSWORD_STORE_DIR/
//! ├── .gpg-id            # trusted key ids, one per line
//! ├── example.com/
//! │   ├── alice.gpg      # opaque ciphertext
//! │   └── bob.gpg
//! └── work/
//!     └── vpn/
//!         └── carol.gpg
//! ```
//!
//! [`PasswordStore`] is opened once at startup (every check here is fatal)
//! and then shared read-only by all requests. Listings and reads always hit
//! the live filesystem.

mod collation;
mod error;
mod index;
mod reader;
mod trust;

pub use collation::{Collation, UnicodeCollation};
pub use error::StoreError;
pub use index::{SecretCatalog, SecretIndex, SecretRecord, SECRET_EXTENSION};
pub use reader::SecretReader;
pub use trust::{KeyId, TrustAnchor, TRUST_ANCHOR_FILE};

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs;

/// Handle to an opened store.
pub struct PasswordStore {
    root: PathBuf,
    trust: TrustAnchor,
    index: SecretIndex,
    reader: SecretReader,
}

impl PasswordStore {
    /// Open the store at `root` with the default collation.
    pub async fn open(root: &Path, fs_timeout: Duration) -> Result<Self, StoreError> {
        Self::open_with_collation(root, fs_timeout, Arc::new(UnicodeCollation)).await
    }

    pub async fn open_with_collation(
        root: &Path,
        fs_timeout: Duration,
        collation: Arc<dyn Collation>,
    ) -> Result<Self, StoreError> {
        let inaccessible = |source| StoreError::RootInaccessible {
            path: root.to_path_buf(),
            source,
        };

        let metadata = match fs::metadata(root).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::RootMissing(root.to_path_buf()));
            }
            Err(e) => return Err(inaccessible(e)),
        };
        if !metadata.is_dir() {
            return Err(StoreError::RootNotDirectory(root.to_path_buf()));
        }

        let root = fs::canonicalize(root).await.map_err(inaccessible)?;
        let _entries = fs::read_dir(&root).await.map_err(inaccessible)?;

        let trust = TrustAnchor::load(&root, fs_timeout).await?;
        let index = SecretIndex::new(root.clone(), collation, fs_timeout);
        let reader = SecretReader::new(root.clone(), fs_timeout);

        tracing::info!(
            "Opened password store at {} (trust anchor {})",
            root.display(),
            trust.path().display()
        );

        Ok(Self {
            root,
            trust,
            index,
            reader,
        })
    }

    /// Canonical store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn trust_anchor(&self) -> &TrustAnchor {
        &self.trust
    }

    /// Parse and check a submitted key identifier.
    pub async fn validate_key(&self, identifier: &str) -> Result<bool, StoreError> {
        self.trust.validate(identifier).await
    }

    pub async fn is_trusted(&self, key: &KeyId) -> Result<bool, StoreError> {
        self.trust.contains(key).await
    }

    pub async fn list_secrets(&self) -> Result<SecretCatalog, StoreError> {
        self.index.list_secrets().await
    }

    pub async fn read_secret(&self, rel_path: &str, username: &str) -> Result<Vec<u8>, StoreError> {
        self.reader.read_secret(rel_path, username).await
    }
}
