//! ASCII armor for secret payloads.
//!
//! Ciphertext read from the store (or a serialized catalog) is wrapped in a
//! `PGP MESSAGE` armor block carrying an OpenPGP CRC-24 checksum:
//!
//! ```text
//! -----BEGIN PGP MESSAGE-----
//!
//! <base64 body, 64 columns>
//! =<base64 of the 3 checksum bytes>
//! -----END PGP MESSAGE-----
//! ```
//!
//! [`dearmor`] parses any armored block back, verifying the checksum when one
//! is present. It is also what the key-id extraction in [`crate::pgp`] uses to
//! read armored public keys.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use thiserror::Error;

/// CRC-24 initial value (RFC 4880 §6.1).
const CRC24_INIT: u32 = 0x00B7_04CE;

/// CRC-24 generator polynomial (RFC 4880 §6.1).
const CRC24_POLY: u32 = 0x0186_4CFB;

/// Armor label used for secret payloads.
pub const MESSAGE_LABEL: &str = "PGP MESSAGE";

/// Body line width. RFC 4880 §6.3 caps armor lines at 76 characters.
const LINE_WIDTH: usize = 64;

/// Compute the OpenPGP CRC-24 of `data`.
pub fn crc24(data: &[u8]) -> u32 {
    let mut crc = CRC24_INIT;
    for &byte in data {
        crc ^= u32::from(byte) << 16;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x0100_0000 != 0 {
                crc ^= CRC24_POLY;
            }
        }
    }
    crc & 0x00FF_FFFF
}

fn checksum_bytes(crc: u32) -> [u8; 3] {
    [(crc >> 16) as u8, (crc >> 8) as u8, crc as u8]
}

/// A payload wrapped as an armored `PGP MESSAGE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    body: String,
    checksum: u32,
}

impl Envelope {
    /// Wrap `payload`. The payload is opaque; it is never parsed here.
    pub fn build(payload: &[u8]) -> Self {
        Self {
            body: BASE64.encode(payload),
            checksum: crc24(payload),
        }
    }

    /// The unwrapped base64 body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// The CRC-24 of the wrapped payload.
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// The `=XXXX` checksum line.
    pub fn checksum_line(&self) -> String {
        format!("={}", BASE64.encode(checksum_bytes(self.checksum)))
    }

    /// Render the full armored text.
    pub fn armored(&self) -> String {
        let mut out = String::with_capacity(self.body.len() + self.body.len() / LINE_WIDTH + 96);
        out.push_str("-----BEGIN ");
        out.push_str(MESSAGE_LABEL);
        out.push_str("-----\n\n");

        if self.body.is_empty() {
            out.push('\n');
        }
        // base64 is pure ASCII, so byte offsets are char boundaries.
        let mut rest = self.body.as_str();
        while !rest.is_empty() {
            let (line, tail) = rest.split_at(rest.len().min(LINE_WIDTH));
            out.push_str(line);
            out.push('\n');
            rest = tail;
        }

        out.push_str(&self.checksum_line());
        out.push('\n');
        out.push_str("-----END ");
        out.push_str(MESSAGE_LABEL);
        out.push_str("-----");
        out
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.armored())
    }
}

#[derive(Debug, Error)]
pub enum ArmorError {
    #[error("No armor header line found")]
    MissingHeader,

    #[error("Armor block '{0}' is not terminated")]
    MissingFooter(String),

    #[error("Invalid base64 in armor body: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Malformed armor checksum line")]
    MalformedChecksum,

    #[error("Armor checksum mismatch: expected {expected:06X}, computed {computed:06X}")]
    ChecksumMismatch { expected: u32, computed: u32 },
}

/// A decoded armor block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dearmored {
    /// The label between `BEGIN ` and the trailing dashes, e.g. `PGP MESSAGE`.
    pub label: String,
    pub data: Vec<u8>,
}

/// Decode the first armored block in `text`.
///
/// Armor headers (`Key: value` lines) are skipped. A checksum line is
/// optional, but when present it must match the decoded data.
pub fn dearmor(text: &str) -> Result<Dearmored, ArmorError> {
    let mut lines = text.lines().map(str::trim_end);

    let label = loop {
        let line = lines.next().ok_or(ArmorError::MissingHeader)?;
        if let Some(label) = line
            .trim_start()
            .strip_prefix("-----BEGIN ")
            .and_then(|rest| rest.strip_suffix("-----"))
        {
            break label.to_string();
        }
    };
    let footer = format!("-----END {}-----", label);

    let mut body = String::new();
    let mut checksum: Option<&str> = None;
    let mut in_headers = true;
    let mut closed = false;

    for line in lines {
        if line.trim_start() == footer {
            closed = true;
            break;
        }
        if in_headers {
            if line.is_empty() {
                in_headers = false;
                continue;
            }
            if line.contains(": ") {
                continue;
            }
            in_headers = false;
        }
        // Body lines are whole base64 quads, so only the checksum starts with '='.
        if let Some(sum) = line.trim_start().strip_prefix('=') {
            checksum = Some(sum);
            continue;
        }
        body.push_str(line.trim());
    }

    if !closed {
        return Err(ArmorError::MissingFooter(label));
    }

    let data = BASE64.decode(body.as_bytes())?;

    if let Some(sum) = checksum {
        let bytes = BASE64
            .decode(sum.trim())
            .map_err(|_| ArmorError::MalformedChecksum)?;
        let [b0, b1, b2] = <[u8; 3]>::try_from(bytes.as_slice())
            .map_err(|_| ArmorError::MalformedChecksum)?;
        let expected = (u32::from(b0) << 16) | (u32::from(b1) << 8) | u32::from(b2);
        let computed = crc24(&data);
        if expected != computed {
            return Err(ArmorError::ChecksumMismatch { expected, computed });
        }
    }

    Ok(Dearmored { label, data })
}
