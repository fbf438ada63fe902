//! # passgate
//!
//! HTTP gateway for a `pass`-style password store: one GPG-encrypted file
//! per credential, organized by domain, served only to callers whose key id
//! is listed in the store's `.gpg-id`.
//!
//! ## Architecture
//!
//! ```text
//!   request ──► access log ──► auth middleware ──► handler
//!                                   │                 │
//!                                   ▼                 ▼
//!                              ┌─────────┐   ┌─────────────────┐
//!                              │AuthGate │   │ SecretIndex     │
//!                              └────┬────┘   │ SecretReader    │
//!                                   │        └────────┬────────┘
//!                                   ▼                 ▼
//!                             ┌───────────┐     ┌──────────┐
//!                             │TrustAnchor│     │ Envelope │
//!                             └───────────┘     └──────────┘
//! ```
//!
//! ## Modules
//! - `store`: trust anchor, catalog walk and contained secret reads
//! - `gate`: authorize or deny a request's credential
//! - `envelope`: CRC-24 checksummed ASCII armor
//! - `pgp`: key id extraction and encryption for listings
//! - `api`: axum routes and middleware
//! - `logging`: optional `LOG_DIR` files with size rotation

pub mod api;
pub mod config;
pub mod envelope;
pub mod error;
pub mod gate;
pub mod logging;
pub mod pgp;
pub mod store;
pub mod util;

pub use config::Config;
pub use error::ErrorKind;
pub use gate::{AuthGate, AuthorizedKey, Credential, Decision, DenialReason};
pub use store::PasswordStore;
