//! Trust anchor (`.gpg-id`) and key identifier matching.
//!
//! The trust anchor is a newline separated list of key identifiers. Entries
//! may be long (16 hex) or short (8 hex) ids, optionally prefixed with `0` or
//! `0x`. A submitted key id is trusted when any of its six variants equals an
//! entry, compared case-insensitively.
//!
//! The file is streamed line by line on every check; it is never held in
//! memory.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::error::StoreError;

/// Name of the trust anchor file under the store root.
pub const TRUST_ANCHOR_FILE: &str = ".gpg-id";

/// A normalized long (16 hex digit) OpenPGP key identifier, upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyId(String);

impl KeyId {
    /// Parse a submitted identifier.
    ///
    /// Accepts an optional `0x` prefix, or a single leading `0` on a
    /// 17-character input. What remains must be exactly 16 hex digits.
    pub fn parse(input: &str) -> Result<Self, StoreError> {
        let trimmed = input.trim();
        let candidate = if let Some(rest) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            rest
        } else if trimmed.len() == 17 {
            trimmed.strip_prefix('0').unwrap_or(trimmed)
        } else {
            trimmed
        };

        if candidate.len() != 16 || !candidate.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(StoreError::InvalidKeyFormat(input.to_string()));
        }
        Ok(Self(candidate.to_ascii_uppercase()))
    }

    /// Build from the raw 8 key id bytes.
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(hex::encode_upper(bytes))
    }

    pub fn long(&self) -> &str {
        &self.0
    }

    /// The trailing 8 hex digits.
    pub fn short(&self) -> &str {
        &self.0[8..]
    }

    /// `{long, 0+long, 0x+long, short, 0+short, 0x+short}`.
    pub fn variants(&self) -> [String; 6] {
        let long = self.long();
        let short = self.short();
        [
            long.to_string(),
            format!("0{}", long),
            format!("0x{}", long),
            short.to_string(),
            format!("0{}", short),
            format!("0x{}", short),
        ]
    }

    /// Whether a trust anchor entry names this key.
    pub fn matches(&self, entry: &str) -> bool {
        self.variants()
            .iter()
            .any(|variant| variant.eq_ignore_ascii_case(entry))
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Blank lines and `#` comments are not entries.
fn anchor_entry(line: &str) -> Option<&str> {
    let entry = line.trim();
    if entry.is_empty() || entry.starts_with('#') {
        None
    } else {
        Some(entry)
    }
}

/// Handle to the trust anchor file of a store.
#[derive(Debug, Clone)]
pub struct TrustAnchor {
    path: PathBuf,
    timeout: Duration,
}

impl TrustAnchor {
    /// Open the trust anchor under `root`, failing unless it is readable and
    /// lists at least one entry.
    pub async fn load(root: &Path, timeout: Duration) -> Result<Self, StoreError> {
        let anchor = Self {
            path: root.join(TRUST_ANCHOR_FILE),
            timeout,
        };
        let has_entry = anchor.scan(|_| true).await?;
        if !has_entry {
            return Err(StoreError::EmptyTrustAnchor(anchor.path));
        }
        Ok(anchor)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check a submitted identifier against the anchor.
    ///
    /// Fails with [`StoreError::InvalidKeyFormat`] before touching the file if
    /// the identifier is not a long key id.
    pub async fn validate(&self, identifier: &str) -> Result<bool, StoreError> {
        let key = KeyId::parse(identifier)?;
        self.contains(&key).await
    }

    pub async fn contains(&self, key: &KeyId) -> Result<bool, StoreError> {
        self.scan(|entry| key.matches(entry))
            .await
    }

    /// Stream the file, stopping at the first entry accepted by `hit`.
    async fn scan<F>(&self, mut hit: F) -> Result<bool, StoreError>
    where
        F: FnMut(&str) -> bool,
    {
        let read_error = |source| StoreError::TrustAnchor {
            path: self.path.clone(),
            source,
        };

        let scan = async {
            let file = File::open(&self.path).await.map_err(read_error)?;
            let mut lines = BufReader::new(file).lines();
            while let Some(line) = lines.next_line().await.map_err(read_error)? {
                if anchor_entry(&line).is_some_and(&mut hit) {
                    return Ok(true);
                }
            }
            Ok(false)
        };

        tokio::time::timeout(self.timeout, scan)
            .await
            .map_err(|_| StoreError::Timeout {
                operation: "trust anchor scan",
                timeout: self.timeout,
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn anchor_with(contents: &[u8]) -> (tempfile::TempDir, TrustAnchor) {
        let dir = tempfile::tempdir().expect("tempdir");
        tokio::fs::write(dir.path().join(TRUST_ANCHOR_FILE), contents)
            .await
            .expect("write anchor");
        let anchor = TrustAnchor::load(dir.path(), TIMEOUT).await.expect("load anchor");
        (dir, anchor)
    }

    #[test]
    fn parse_normalizes_prefixes_and_case() {
        let expected = "9ED5E44EFB91D165";
        for input in [
            "9ED5E44EFB91D165",
            "9ed5e44efb91d165",
            "0x9ED5E44EFB91D165",
            "0X9ed5e44efb91d165",
            "09ED5E44EFB91D165",
            "  9ED5E44EFB91D165\n",
        ] {
            assert_eq!(KeyId::parse(input).unwrap().long(), expected, "{input}");
        }
    }

    #[test]
    fn parse_rejects_wrong_lengths_and_non_hex() {
        let long_prefixed = format!("0x{}", "A".repeat(20));
        for input in [
            "",
            "ABCD",
            "FB91D165",
            long_prefixed.as_str(),
            "9ED5E44EFB91D16",
            "9ED5E44EFB91D1655",
            "19ED5E44EFB91D165",
            "9ED5E44EFB91D16G",
            "0x0x9ED5E44EFB91D1",
        ] {
            assert!(
                matches!(KeyId::parse(input), Err(StoreError::InvalidKeyFormat(_))),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn variants_cover_long_and_short_forms() {
        let key = KeyId::parse("9ED5E44EFB91D165").unwrap();
        assert_eq!(key.short(), "FB91D165");
        assert_eq!(
            key.variants(),
            [
                "9ED5E44EFB91D165".to_string(),
                "09ED5E44EFB91D165".to_string(),
                "0x9ED5E44EFB91D165".to_string(),
                "FB91D165".to_string(),
                "0FB91D165".to_string(),
                "0xFB91D165".to_string(),
            ]
        );
        assert!(key.matches("0XFB91D165"));
        assert!(!key.matches("9ED5E44E"));
    }

    #[test]
    fn from_bytes_renders_upper_hex() {
        let key = KeyId::from_bytes([0x9E, 0xD5, 0xE4, 0x4E, 0xFB, 0x91, 0xD1, 0x65]);
        assert_eq!(key.to_string(), "9ED5E44EFB91D165");
    }

    #[tokio::test]
    async fn validate_accepts_every_entry_form() {
        let (_dir, anchor) = anchor_with(
            b"# team keys\n\n1111222233334444\n0x55556666AAAABBBB\n0ccccdddd\n0xEEEEFFFF\nabcdef0123456789\n",
        )
        .await;

        assert!(anchor.validate("1111222233334444").await.unwrap());
        assert!(anchor.validate("55556666AAAABBBB").await.unwrap());
        // Short entry with a `0` prefix, matched from the long id.
        assert!(anchor.validate("00000000CCCCDDDD").await.unwrap());
        assert!(anchor.validate("12345678EEEEFFFF").await.unwrap());
        assert!(anchor.validate("ABCDEF0123456789").await.unwrap());
        assert!(anchor.validate("0xabcdef0123456789").await.unwrap());
    }

    #[tokio::test]
    async fn validate_rejects_unknown_keys() {
        let (_dir, anchor) = anchor_with(b"1111222233334444\n").await;
        assert!(!anchor.validate("4444333322221111").await.unwrap());
        // Sharing only the leading half is not a short-id match.
        assert!(!anchor.validate("1111222299999999").await.unwrap());
        // Repeated checks give the same answer.
        assert!(anchor.validate("1111222233334444").await.unwrap());
        assert!(anchor.validate("1111222233334444").await.unwrap());
    }

    #[tokio::test]
    async fn validate_reports_format_errors() {
        let (_dir, anchor) = anchor_with(b"1111222233334444\n").await;
        assert!(matches!(
            anchor.validate("ABCD").await,
            Err(StoreError::InvalidKeyFormat(_))
        ));
    }

    #[tokio::test]
    async fn non_utf8_anchor_is_an_internal_failure() {
        let (dir, anchor) = anchor_with(b"1111222233334444\n").await;
        tokio::fs::write(dir.path().join(TRUST_ANCHOR_FILE), b"\xff\xfe\xfd\n1111222233334444\n")
            .await
            .unwrap();
        let err = anchor.validate("9999222233334444").await.unwrap_err();
        assert!(matches!(err, StoreError::TrustAnchor { .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::Internal);
    }

    #[tokio::test]
    async fn load_requires_an_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = TrustAnchor::load(dir.path(), TIMEOUT).await.unwrap_err();
        assert!(matches!(missing, StoreError::TrustAnchor { .. }));

        tokio::fs::write(dir.path().join(TRUST_ANCHOR_FILE), "\n# nobody\n  \n")
            .await
            .unwrap();
        let empty = TrustAnchor::load(dir.path(), TIMEOUT).await.unwrap_err();
        assert!(matches!(empty, StoreError::EmptyTrustAnchor(_)));
    }
}
