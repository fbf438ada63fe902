//! Secret catalog built from a walk of the store root.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use walkdir::WalkDir;

use super::collation::Collation;
use super::error::StoreError;

/// Suffix of secret files.
pub const SECRET_EXTENSION: &str = "gpg";

/// One stored secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretRecord {
    /// Name of the directory holding the secret.
    pub domain: String,
    /// That directory relative to the store root, `/` separated.
    pub path: String,
    /// File stem of the secret file.
    pub username: String,
    /// Sort form of `username`.
    pub username_normalized: String,
}

/// Sorted listing of every secret in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SecretCatalog(Vec<SecretRecord>);

impl SecretCatalog {
    pub fn records(&self) -> &[SecretRecord] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SecretRecord> {
        self.0.iter()
    }
}

/// Read-only view producing [`SecretCatalog`]s from the live filesystem.
///
/// Every call performs one complete walk; nothing is cached between calls.
#[derive(Clone)]
pub struct SecretIndex {
    root: PathBuf,
    collation: Arc<dyn Collation>,
    timeout: Duration,
}

impl SecretIndex {
    pub fn new(root: PathBuf, collation: Arc<dyn Collation>, timeout: Duration) -> Self {
        Self {
            root,
            collation,
            timeout,
        }
    }

    pub async fn list_secrets(&self) -> Result<SecretCatalog, StoreError> {
        let root = self.root.clone();
        let collation = Arc::clone(&self.collation);
        let walk = tokio::task::spawn_blocking(move || walk_store(&root, collation.as_ref()));

        match tokio::time::timeout(self.timeout, walk).await {
            Ok(Ok(catalog)) => Ok(catalog),
            Ok(Err(e)) => Err(StoreError::Listing(e.to_string())),
            Err(_) => Err(StoreError::Timeout {
                operation: "store listing",
                timeout: self.timeout,
            }),
        }
    }
}

fn walk_store(root: &Path, collation: &dyn Collation) -> SecretCatalog {
    let mut records = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable store entry: {}", e);
                continue;
            }
        };
        // Depth 1 files sit directly in the root and have no domain.
        if entry.depth() < 2 || !entry.file_type().is_file() {
            continue;
        }
        if let Some(record) = record_for(root, entry.path(), collation) {
            records.push(record);
        }
    }

    // Stable, so exact ties keep walk order.
    records.sort_by(|a, b| {
        collation
            .compare(&a.domain, &b.domain)
            .then_with(|| collation.compare(&a.username_normalized, &b.username_normalized))
    });

    SecretCatalog(records)
}

fn record_for(root: &Path, path: &Path, collation: &dyn Collation) -> Option<SecretRecord> {
    if path.extension()? != SECRET_EXTENSION {
        return None;
    }

    let Some(username) = path.file_stem().and_then(|s| s.to_str()) else {
        tracing::debug!("Skipping non UTF-8 secret name: {}", path.display());
        return None;
    };
    let parent = path.parent()?;
    let domain = parent.file_name()?.to_str()?;

    let relative = parent.strip_prefix(root).ok()?;
    let segments = relative
        .components()
        .map(|component| match component {
            Component::Normal(segment) => segment.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;

    Some(SecretRecord {
        domain: domain.to_string(),
        path: segments.join("/"),
        username: username.to_string(),
        username_normalized: collation.normalize(username),
    })
}
