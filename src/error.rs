//! Failure classification shared by the store, the auth gate and the API.
//!
//! Every error is tagged with an [`ErrorKind`] where it is detected; the kind
//! alone decides the response status at the boundary.

use std::fmt;

/// The class of a failure, independent of where it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed request field, malformed key identifier.
    Validation,
    /// Untrusted or unparseable credential.
    Auth,
    /// Secret absent, not a regular file, or outside the store root.
    NotFound,
    /// Secret exists but cannot be read right now.
    Unavailable,
    /// Anything unexpected.
    Internal,
}

impl ErrorKind {
    /// HTTP-shaped status code for this kind.
    ///
    /// `NotFound` deliberately maps to 400 rather than 404 so that a missing
    /// secret and a rejected traversal attempt look the same to the caller.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Auth => 401,
            ErrorKind::NotFound => 400,
            ErrorKind::Unavailable => 503,
            ErrorKind::Internal => 500,
        }
    }

    /// Whether a caller may reasonably retry the same request later.
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::Unavailable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Auth => "auth",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}
