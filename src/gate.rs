//! Authentication gate.
//!
//! Every request carries either a raw key id or an armored public key. The
//! gate derives the long key id and checks it against the store's trust
//! anchor. The outcome is final for the request; nothing is retried.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::ErrorKind;
use crate::pgp::OpenPgp;
use crate::store::{KeyId, PasswordStore};

/// What the caller presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    KeyId(String),
    PublicKey(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialFields {
    public_key: Option<String>,
    key_id: Option<String>,
}

impl Credential {
    /// Read the credential from a JSON object body.
    ///
    /// `publicKey` wins over `keyId` since encrypted responses need it. A
    /// body that is not a JSON object has no credential.
    pub fn from_json(body: &[u8]) -> Option<Self> {
        let fields: CredentialFields = serde_json::from_slice(body).ok()?;
        fields
            .public_key
            .map(Credential::PublicKey)
            .or_else(|| fields.key_id.map(Credential::KeyId))
    }
}

/// A caller that passed the gate.
#[derive(Debug, Clone)]
pub struct AuthorizedKey {
    pub key_id: KeyId,
    /// Present when the caller authenticated with a public key.
    pub public_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    MissingCredential,
    MalformedPublicKey,
    MalformedKeyId,
    Untrusted,
    Unavailable,
    Internal,
}

impl DenialReason {
    pub fn kind(self) -> ErrorKind {
        match self {
            DenialReason::MissingCredential | DenialReason::MalformedKeyId => ErrorKind::Validation,
            DenialReason::MalformedPublicKey | DenialReason::Untrusted => ErrorKind::Auth,
            DenialReason::Unavailable => ErrorKind::Unavailable,
            DenialReason::Internal => ErrorKind::Internal,
        }
    }

    /// Caller-facing message; never includes internal detail.
    pub fn message(self) -> &'static str {
        match self {
            DenialReason::MissingCredential => "Please provide a publicKey or keyId.",
            DenialReason::MalformedPublicKey | DenialReason::Untrusted => "Invalid publicKey.",
            DenialReason::MalformedKeyId => "Please provide a proper keyId.",
            DenialReason::Unavailable => "Service temporarily unavailable.",
            DenialReason::Internal => "Internal server error.",
        }
    }
}

#[derive(Debug)]
pub enum Decision {
    Authorized(AuthorizedKey),
    Denied(DenialReason),
}

#[derive(Clone)]
pub struct AuthGate {
    store: Arc<PasswordStore>,
    pgp: Arc<dyn OpenPgp>,
}

impl AuthGate {
    pub fn new(store: Arc<PasswordStore>, pgp: Arc<dyn OpenPgp>) -> Self {
        Self { store, pgp }
    }

    pub async fn check(&self, credential: Option<Credential>) -> Decision {
        let Some(credential) = credential else {
            return Decision::Denied(DenialReason::MissingCredential);
        };

        let (key_id, public_key) = match credential {
            Credential::KeyId(identifier) => match KeyId::parse(&identifier) {
                Ok(key_id) => (key_id, None),
                Err(e) => {
                    tracing::debug!("Rejected key id: {}", e);
                    return Decision::Denied(DenialReason::MalformedKeyId);
                }
            },
            Credential::PublicKey(armored) => match self.pgp.primary_key_id(&armored) {
                Ok(key_id) => (key_id, Some(armored)),
                Err(e) => {
                    tracing::warn!("Rejected unparseable public key: {}", e);
                    return Decision::Denied(DenialReason::MalformedPublicKey);
                }
            },
        };

        match self.store.is_trusted(&key_id).await {
            Ok(true) => {
                tracing::debug!("Authorized key {}", key_id);
                Decision::Authorized(AuthorizedKey { key_id, public_key })
            }
            Ok(false) => {
                tracing::warn!("Rejected untrusted key {}", key_id);
                Decision::Denied(DenialReason::Untrusted)
            }
            Err(e) => {
                tracing::error!("Key validation failed: {}", e);
                if e.kind() == ErrorKind::Unavailable {
                    Decision::Denied(DenialReason::Unavailable)
                } else {
                    Decision::Denied(DenialReason::Internal)
                }
            }
        }
    }
}
