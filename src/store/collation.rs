//! Sort collation for the secret catalog.
//!
//! Pluggable so a deployment can substitute locale-specific rules. The default
//! [`UnicodeCollation`] approximates a root-locale collator:
//!
//! 1. primary: compatibility-decomposed, combining marks dropped, lower-cased
//! 2. secondary: accents count, case does not
//! 3. tertiary: lower case sorts before upper case

use std::cmp::Ordering;

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

pub trait Collation: Send + Sync {
    /// The form recorded as a record's `username_normalized`. Used only for
    /// ordering, never for identity.
    fn normalize(&self, value: &str) -> String;

    /// Total order used to sort domains and normalized usernames.
    fn compare(&self, a: &str, b: &str) -> Ordering;
}

/// Default collation: canonical decomposition (NFD) for the normalized form,
/// case- and accent-insensitive primary ordering.
///
/// Non-Latin code points are decomposed like any other; nothing is stripped.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeCollation;

impl UnicodeCollation {
    fn primary(value: &str) -> impl Iterator<Item = char> + '_ {
        value
            .nfkd()
            .filter(|c| !is_combining_mark(*c))
            .flat_map(char::to_lowercase)
    }

    fn secondary(value: &str) -> impl Iterator<Item = char> + '_ {
        value.nfkd().flat_map(char::to_lowercase)
    }

    fn tertiary(value: &str) -> impl Iterator<Item = bool> + '_ {
        value.nfkd().map(char::is_uppercase)
    }
}

impl Collation for UnicodeCollation {
    fn normalize(&self, value: &str) -> String {
        value.nfd().collect()
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        Self::primary(a)
            .cmp(Self::primary(b))
            .then_with(|| Self::secondary(a).cmp(Self::secondary(b)))
            .then_with(|| Self::tertiary(a).cmp(Self::tertiary(b)))
    }
}
