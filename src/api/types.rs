//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::store::SecretCatalog;

/// Body of `POST /secret`.
///
/// The credential fields travel in the same object and are consumed by the
/// auth middleware; unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecretRequest {
    /// Directory of the secret relative to the store root
    pub path: Option<String>,

    /// File stem of the secret, without `.gpg`
    pub username: Option<String>,
}

/// An armored OpenPGP message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmoredResponse {
    pub response: String,
}

/// Plain catalog, returned when the caller authenticated with a key id only.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogResponse {
    pub secrets: SecretCatalog,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always "ok" when the server is running
    pub status: String,

    /// Server version
    pub version: String,
}
