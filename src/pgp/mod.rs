//! OpenPGP capability.
//!
//! The gateway never decrypts anything. It needs exactly two operations:
//!
//! - derive the primary key id from an armored public key, to authenticate
//!   the caller against the trust anchor
//! - encrypt bytes for a set of armored public keys, to return the catalog
//!   readable only by the caller
//!
//! [`OpenPgp`] is the seam; [`GpgCli`] is the production implementation.

mod gpg;
mod packet;

pub use gpg::{GpgCli, GpgConfig};
pub use packet::{primary_key_id, PUBLIC_KEY_LABEL};

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::envelope::ArmorError;
use crate::store::KeyId;

#[derive(Debug, Error)]
pub enum PgpError {
    #[error("Invalid armor: {0}")]
    Armor(#[from] ArmorError),

    #[error("Malformed public key: {0}")]
    MalformedKey(String),

    #[error("Unsupported public key packet version {0}")]
    UnsupportedVersion(u8),

    #[error("No recipients given")]
    NoRecipients,

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("gpg exited unsuccessfully: {0}")]
    Gpg(String),

    #[error("gpg timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PgpError {
    /// Whether the caller's key itself was at fault, as opposed to the local
    /// gpg installation.
    pub fn is_bad_key(&self) -> bool {
        matches!(
            self,
            PgpError::Armor(_) | PgpError::MalformedKey(_) | PgpError::UnsupportedVersion(_)
        )
    }
}

#[async_trait]
pub trait OpenPgp: Send + Sync {
    /// Long key id of the primary key in an armored public key block.
    fn primary_key_id(&self, armored_key: &str) -> Result<KeyId, PgpError>;

    /// Encrypt `data` to every key in `armored_keys`, returning an armored
    /// `PGP MESSAGE`.
    async fn encrypt(&self, data: &[u8], armored_keys: &[String]) -> Result<String, PgpError>;
}
