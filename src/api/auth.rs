//! Key-based auth for the secret routes.
//!
//! The credential travels in the JSON body, so the middleware buffers the
//! body, runs the [`AuthGate`](crate::gate::AuthGate) and hands the same
//! bytes on to the handler together with the
//! [`AuthorizedKey`](crate::gate::AuthorizedKey) extension.

use std::error::Error as _;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use super::error::ApiError;
use super::routes::AppState;
use super::types::ErrorResponse;
use crate::gate::{Credential, Decision};
use http_body_util::LengthLimitError;

/// 413 when the body hit the size cap, 400 for anything else that broke
/// the read (a client hanging up mid-body, a malformed chunk).
fn body_rejection(err: &axum::Error) -> (StatusCode, &'static str) {
    let mut cause: Option<&(dyn std::error::Error + 'static)> = err.source();
    while let Some(e) = cause {
        if e.is::<LengthLimitError>() {
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large.");
        }
        cause = e.source();
    }
    (StatusCode::BAD_REQUEST, "Unreadable request body.")
}

pub async fn require_key(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, state.config.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let (status, message) = body_rejection(&e);
            tracing::warn!(status = %status, "Rejected request body: {}", e);
            return (
                status,
                Json(ErrorResponse {
                    error: message.to_string(),
                }),
            )
                .into_response();
        }
    };

    match state.gate.check(Credential::from_json(&bytes)).await {
        Decision::Authorized(key) => {
            let mut req = Request::from_parts(parts, Body::from(bytes));
            req.extensions_mut().insert(key);
            next.run(req).await
        }
        Decision::Denied(reason) => ApiError::from(reason).into_response(),
    }
}
