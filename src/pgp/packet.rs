//! Minimal OpenPGP packet parsing: just enough to find the primary key id.

use sha1::Sha1;
use sha2::{Digest, Sha256};

use super::PgpError;
use crate::envelope::dearmor;
use crate::store::KeyId;

pub const PUBLIC_KEY_LABEL: &str = "PGP PUBLIC KEY BLOCK";

const TAG_PUBLIC_KEY: u8 = 6;

fn malformed(reason: &str) -> PgpError {
    PgpError::MalformedKey(reason.to_string())
}

/// Long key id of the primary key in an armored public key block.
///
/// The primary key is the first packet of a transferable public key.
pub fn primary_key_id(armored: &str) -> Result<KeyId, PgpError> {
    let block = dearmor(armored)?;
    if block.label != PUBLIC_KEY_LABEL {
        return Err(PgpError::MalformedKey(format!(
            "expected a {} block, got {}",
            PUBLIC_KEY_LABEL, block.label
        )));
    }

    let (tag, body) = first_packet(&block.data)?;
    if tag != TAG_PUBLIC_KEY {
        return Err(PgpError::MalformedKey(format!(
            "first packet has tag {}, not a public key",
            tag
        )));
    }
    key_id(body)
}

fn split_be(data: &[u8], width: usize) -> Result<(usize, &[u8]), PgpError> {
    if data.len() < width {
        return Err(malformed("truncated packet length"));
    }
    let (bytes, rest) = data.split_at(width);
    let value = bytes.iter().fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
    Ok((value, rest))
}

/// Tag and body of the first packet, old or new header format.
fn first_packet(data: &[u8]) -> Result<(u8, &[u8]), PgpError> {
    let (&header, rest) = data.split_first().ok_or_else(|| malformed("empty key block"))?;
    if header & 0x80 == 0 {
        return Err(malformed("invalid packet header"));
    }

    let (tag, len, rest) = if header & 0x40 != 0 {
        let tag = header & 0x3F;
        let (&first, rest) = rest
            .split_first()
            .ok_or_else(|| malformed("truncated packet length"))?;
        match first {
            0..=191 => (tag, usize::from(first), rest),
            192..=223 => {
                let (&second, rest) = rest
                    .split_first()
                    .ok_or_else(|| malformed("truncated packet length"))?;
                let len = ((usize::from(first) - 192) << 8) + usize::from(second) + 192;
                (tag, len, rest)
            }
            255 => {
                let (len, rest) = split_be(rest, 4)?;
                (tag, len, rest)
            }
            _ => return Err(malformed("partial body length on a key packet")),
        }
    } else {
        let tag = (header >> 2) & 0x0F;
        match header & 0x03 {
            0 => {
                let (len, rest) = split_be(rest, 1)?;
                (tag, len, rest)
            }
            1 => {
                let (len, rest) = split_be(rest, 2)?;
                (tag, len, rest)
            }
            2 => {
                let (len, rest) = split_be(rest, 4)?;
                (tag, len, rest)
            }
            _ => (tag, rest.len(), rest),
        }
    };

    let body = rest.get(..len).ok_or_else(|| malformed("truncated packet"))?;
    Ok((tag, body))
}

fn key_id(body: &[u8]) -> Result<KeyId, PgpError> {
    let version = *body.first().ok_or_else(|| malformed("empty public key packet"))?;
    let id: [u8; 8] = match version {
        4 => {
            let len = u16::try_from(body.len()).map_err(|_| malformed("v4 key packet too long"))?;
            let mut hasher = Sha1::new();
            hasher.update([0x99]);
            hasher.update(len.to_be_bytes());
            hasher.update(body);
            let fingerprint = hasher.finalize();
            tail(&fingerprint)?
        }
        5 | 6 => {
            let prefix = if version == 5 { 0x9A } else { 0x9B };
            let len = u32::try_from(body.len()).map_err(|_| malformed("key packet too long"))?;
            let mut hasher = Sha256::new();
            hasher.update([prefix]);
            hasher.update(len.to_be_bytes());
            hasher.update(body);
            let fingerprint = hasher.finalize();
            <[u8; 8]>::try_from(&fingerprint[..8]).map_err(|_| malformed("short fingerprint"))?
        }
        2 | 3 => {
            // version, creation time (4), validity days (2), algorithm, RSA modulus MPI
            let algorithm = *body.get(7).ok_or_else(|| malformed("truncated v3 key"))?;
            if !matches!(algorithm, 1..=3) {
                return Err(malformed("v3 keys must be RSA"));
            }
            let (bits, rest) = split_be(body.get(8..).unwrap_or_default(), 2)?;
            let modulus = rest
                .get(..bits.div_ceil(8))
                .ok_or_else(|| malformed("truncated RSA modulus"))?;
            tail(modulus)?
        }
        other => return Err(PgpError::UnsupportedVersion(other)),
    };
    Ok(KeyId::from_bytes(id))
}

/// Last 8 bytes.
fn tail(bytes: &[u8]) -> Result<[u8; 8], PgpError> {
    let start = bytes
        .len()
        .checked_sub(8)
        .ok_or_else(|| malformed("key material too short"))?;
    <[u8; 8]>::try_from(&bytes[start..]).map_err(|_| malformed("key material too short"))
}
