//! Error responses.
//!
//! Every failure leaves the API as `{"error": "<message>"}` with the status
//! its [`ErrorKind`] maps to. Causes are logged here and never sent back.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::types::ErrorResponse;
use crate::error::ErrorKind;
use crate::gate::DenialReason;
use crate::pgp::PgpError;
use crate::store::StoreError;

pub const INVALID_SECRET_REQUEST: &str = "Invalid secret requested.";
pub const NO_SUCH_SECRET: &str = "No such secret exists.";
const SECRET_UNAVAILABLE: &str = "Secret is temporarily unavailable.";
const INTERNAL: &str = "Internal server error.";

#[derive(Debug, Clone)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_secret_request() -> Self {
        Self::new(ErrorKind::Validation, INVALID_SECRET_REQUEST)
    }

    pub fn internal() -> Self {
        Self::new(ErrorKind::Internal, INTERNAL)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let kind = err.kind();
        let message = match kind {
            ErrorKind::Validation => DenialReason::MalformedKeyId.message(),
            ErrorKind::NotFound => NO_SUCH_SECRET,
            ErrorKind::Unavailable => SECRET_UNAVAILABLE,
            ErrorKind::Auth | ErrorKind::Internal => INTERNAL,
        };
        if kind == ErrorKind::Internal {
            tracing::error!(kind = %kind, "Store failure: {}", err);
        } else if kind.is_transient() {
            tracing::warn!(kind = %kind, "Store unavailable, caller may retry: {}", err);
        } else {
            tracing::debug!(kind = %kind, "Store rejected request: {}", err);
        }
        Self::new(kind, message)
    }
}

impl From<DenialReason> for ApiError {
    fn from(reason: DenialReason) -> Self {
        Self::new(reason.kind(), reason.message())
    }
}

impl From<PgpError> for ApiError {
    fn from(err: PgpError) -> Self {
        if err.is_bad_key() {
            tracing::warn!("Caller key unusable for encryption: {}", err);
            Self::from(DenialReason::MalformedPublicKey)
        } else {
            tracing::error!("Encryption failed: {}", err);
            Self::internal()
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (
            status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;

    #[test]
    fn store_errors_hide_their_causes() {
        let err = ApiError::from(StoreError::SecretReadFailure {
            path: PathBuf::from("/store/site/alice.gpg"),
            source: io::Error::new(io::ErrorKind::Other, "disk on fire"),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), INTERNAL);
    }

    #[test]
    fn not_found_is_a_bad_request() {
        let err = ApiError::from(StoreError::SecretNotFound);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), NO_SUCH_SECRET);
    }

    #[test]
    fn unavailable_is_service_unavailable() {
        let err = ApiError::from(StoreError::SecretUnavailable {
            path: PathBuf::from("x.gpg"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        });
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.kind().is_transient());
    }

    #[test]
    fn pgp_errors_split_on_fault() {
        let bad_key = ApiError::from(PgpError::MalformedKey("junk".into()));
        assert_eq!(bad_key.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(bad_key.message(), "Invalid publicKey.");

        let broken_gpg = ApiError::from(PgpError::Gpg("no such file".into()));
        assert_eq!(broken_gpg.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
