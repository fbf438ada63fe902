//! Secret listing and retrieval handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, State},
    response::{IntoResponse, Response},
    Json,
};

use super::error::ApiError;
use super::routes::AppState;
use super::types::{ArmoredResponse, CatalogResponse, SecretRequest};
use crate::envelope::Envelope;
use crate::gate::AuthorizedKey;

/// `POST /secrets`
///
/// The catalog is encrypted to the caller's public key when one was
/// presented; a key id alone gets the plain listing.
pub async fn list_secrets(
    State(state): State<Arc<AppState>>,
    Extension(key): Extension<AuthorizedKey>,
) -> Result<Response, ApiError> {
    let catalog = state.store.list_secrets().await?;
    tracing::info!("Listing {} secrets for key {}", catalog.len(), key.key_id);

    let Some(public_key) = key.public_key else {
        return Ok(Json(CatalogResponse { secrets: catalog }).into_response());
    };

    let data = serde_json::to_vec(&catalog).map_err(|e| {
        tracing::error!("Failed to serialize catalog: {}", e);
        ApiError::internal()
    })?;
    let response = state.pgp.encrypt(&data, &[public_key]).await?;
    Ok(Json(ArmoredResponse { response }).into_response())
}

/// `POST /secret`
pub async fn get_secret(
    State(state): State<Arc<AppState>>,
    Extension(key): Extension<AuthorizedKey>,
    body: Bytes,
) -> Result<Json<ArmoredResponse>, ApiError> {
    let request: SecretRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!("Unreadable secret request: {}", e);
        ApiError::invalid_secret_request()
    })?;

    let Some(path) = request.path else {
        tracing::debug!("Request body does not have a path");
        return Err(ApiError::invalid_secret_request());
    };
    let Some(username) = request.username else {
        tracing::debug!("Request body does not have a username");
        return Err(ApiError::invalid_secret_request());
    };

    let ciphertext = state.store.read_secret(&path, &username).await?;
    tracing::info!("Serving secret {}/{} to key {}", path, username, key.key_id);

    Ok(Json(ArmoredResponse {
        response: Envelope::build(&ciphertext).armored(),
    }))
}
