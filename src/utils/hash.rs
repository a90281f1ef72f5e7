// Hashing and big-integer helpers
//
// SHA-1 is used only as a stable fingerprint (thumbprints, chain identity,
// key-exchange parameter reuse), never for security decisions.

use base64::Engine;
use sha1::{Digest, Sha1};

/// Lowercase hex SHA-1 of one buffer
pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

/// Lowercase hex SHA-1 over the concatenation of several buffers
pub fn sha1_hex_concat<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> String {
    let mut h = Sha1::new();
    for p in parts {
        h.update(p);
    }
    hex::encode(h.finalize())
}

/// One input of [`hash_values`]
#[derive(Debug, Clone, Copy)]
pub enum HashValue<'a> {
    Absent,
    Int(u32),
    Bytes(&'a [u8]),
}

impl<'a> From<Option<&'a [u8]>> for HashValue<'a> {
    fn from(v: Option<&'a [u8]>) -> Self {
        v.map_or(HashValue::Absent, HashValue::Bytes)
    }
}

/// Unambiguous fingerprint of a tuple of values: each value is tagged
/// (absent / present) and byte strings are length-prefixed.
pub fn hash_values(values: &[HashValue<'_>]) -> String {
    let mut h = Sha1::new();
    for v in values {
        match v {
            HashValue::Absent => h.update([0u8]),
            HashValue::Int(x) => {
                h.update([1u8]);
                h.update(x.to_be_bytes());
            }
            HashValue::Bytes(b) => {
                h.update([1u8]);
                h.update((b.len() as u32).to_be_bytes());
                h.update(b);
            }
        }
    }
    hex::encode(h.finalize())
}

/// Bit length of an unsigned big-endian integer
pub fn bit_length(v: &[u8]) -> u32 {
    let Some(k) = v.iter().position(|&b| b != 0) else {
        return 0;
    };
    let mut bit_len = ((v.len() - k) * 8) as u32;
    let mut b = v[k];
    while b < 0x80 {
        b <<= 1;
        bit_len -= 1;
    }
    bit_len
}

/// Bit length of a curve order, rounded to the nearest power of two so
/// that an order of 2^252 + small (Curve25519) reports 252.
pub fn adjusted_bit_length(v: &[u8]) -> u32 {
    let Some(k) = v.iter().position(|&b| b != 0) else {
        return 0;
    };
    let mut bit_len = ((v.len() - k) * 8) as u32;
    let mut b = v[k];
    if b == 0x01 {
        if k == v.len() - 1 {
            return 0;
        }
        bit_len -= 7;
        if v[k + 1] < 0x80 {
            bit_len -= 1;
        }
    } else {
        while b < 0x80 {
            b <<= 1;
            bit_len -= 1;
        }
        if b < 0xC0 {
            bit_len -= 1;
        }
    }
    bit_len
}

/// PEM armor for a DER certificate, 76 characters per line
pub fn to_pem(der: &[u8]) -> String {
    let mut out = String::from("-----BEGIN CERTIFICATE-----\n");
    for chunk in der.chunks(57) {
        out.push_str(&base64::engine::general_purpose::STANDARD.encode(chunk));
        out.push('\n');
    }
    out.push_str("-----END CERTIFICATE-----\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha1_known_vector() {
        assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(sha1_hex_concat([&b"a"[..], &b"bc"[..]]), sha1_hex(b"abc"));
    }

    #[test]
    fn test_hash_values_is_unambiguous() {
        let a = hash_values(&[HashValue::Bytes(b"ab"), HashValue::Bytes(b"c")]);
        let b = hash_values(&[HashValue::Bytes(b"a"), HashValue::Bytes(b"bc")]);
        assert_ne!(a, b);
        let c = hash_values(&[HashValue::Absent, HashValue::Int(0)]);
        let d = hash_values(&[HashValue::Int(0), HashValue::Absent]);
        assert_ne!(c, d);
    }

    #[test]
    fn test_bit_length() {
        assert_eq!(bit_length(&[]), 0);
        assert_eq!(bit_length(&[0x00, 0x00]), 0);
        assert_eq!(bit_length(&[0x00, 0x01]), 1);
        assert_eq!(bit_length(&[0x00, 0x80, 0x00]), 16);
        assert_eq!(bit_length(&[0x7F, 0xFF]), 15);
    }

    #[test]
    fn test_adjusted_bit_length() {
        // P-256 order starts with 0xFF
        assert_eq!(adjusted_bit_length(&[0xFF; 32]), 256);
        // Curve25519 order is 2^252 + small: 0x10 followed by zeros
        let mut c25519 = vec![0x10];
        c25519.extend_from_slice(&[0u8; 31]);
        assert_eq!(adjusted_bit_length(&c25519), 252);
        // order just above a byte boundary: 0x01 0x00...
        assert_eq!(adjusted_bit_length(&[0x01, 0x00, 0x00]), 16);
        assert_eq!(adjusted_bit_length(&[0x01, 0x80, 0x00]), 17);
        assert_eq!(adjusted_bit_length(&[0x01]), 0);
        assert_eq!(adjusted_bit_length(&[0x80, 0x00]), 15);
    }

    #[test]
    fn test_pem_line_width() {
        let pem = to_pem(&[0xAB; 100]);
        let lines: Vec<&str> = pem.lines().collect();
        assert_eq!(lines[0], "-----BEGIN CERTIFICATE-----");
        assert_eq!(lines[1].len(), 76);
        assert_eq!(lines.last(), Some(&"-----END CERTIFICATE-----"));
    }
}
