//! HTTP API for passgate.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /secrets` - List the store (encrypted to `publicKey` when given)
//! - `POST /secret` - Fetch one secret as an armored message
//!
//! Both `POST` routes require a `publicKey` or `keyId` in the JSON body.

mod auth;
pub mod error;
mod logging;
mod routes;
mod secrets;
pub mod types;

pub use error::ApiError;
pub use routes::{router, serve, AppState};
pub use types::*;
