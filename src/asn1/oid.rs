// Object identifier text form <-> DER content octets

use crate::decode_bail;
use crate::error::ProbeResult;

/// Decode OID content octets into dotted-decimal text
pub fn decode(v: &[u8]) -> ProbeResult<String> {
    if v.is_empty() {
        decode_bail!("empty OID");
    }
    let mut arcs: Vec<u64> = Vec::new();
    let mut acc: u64 = 0;
    let mut fresh = true;
    for &b in v {
        if fresh && b == 0x80 {
            decode_bail!("non-minimal OID arc encoding");
        }
        fresh = false;
        if acc > (u64::MAX >> 7) {
            decode_bail!("OID arc overflow");
        }
        acc = (acc << 7) | u64::from(b & 0x7F);
        if b & 0x80 == 0 {
            arcs.push(acc);
            acc = 0;
            fresh = true;
        }
    }
    if !fresh {
        decode_bail!("truncated OID");
    }

    let first = arcs[0];
    let (a, b) = if first < 40 {
        (0, first)
    } else if first < 80 {
        (1, first - 40)
    } else {
        (2, first - 80)
    };
    let mut out = format!("{}.{}", a, b);
    for arc in &arcs[1..] {
        out.push('.');
        out.push_str(&arc.to_string());
    }
    Ok(out)
}

/// Encode dotted-decimal text into OID content octets
pub fn encode(text: &str) -> ProbeResult<Vec<u8>> {
    let mut arcs = Vec::new();
    for part in text.split('.') {
        if part.is_empty() || !part.bytes().all(|c| c.is_ascii_digit()) {
            decode_bail!("invalid OID: {}", text);
        }
        // leading zeros are not canonical
        if part.len() > 1 && part.starts_with('0') {
            decode_bail!("invalid OID: {}", text);
        }
        match part.parse::<u64>() {
            Ok(n) => arcs.push(n),
            Err(_) => decode_bail!("invalid OID: {}", text),
        }
    }
    if arcs.len() < 2 || arcs[0] > 2 || (arcs[0] < 2 && arcs[1] >= 40) {
        decode_bail!("invalid OID: {}", text);
    }
    let first = match (arcs[0] * 40).checked_add(arcs[1]) {
        Some(f) => f,
        None => decode_bail!("invalid OID: {}", text),
    };

    let mut out = Vec::new();
    for arc in std::iter::once(first).chain(arcs[2..].iter().copied()) {
        let mut groups = Vec::new();
        let mut a = arc;
        loop {
            groups.push((a & 0x7F) as u8);
            a >>= 7;
            if a == 0 {
                break;
            }
        }
        for (i, g) in groups.iter().enumerate().rev() {
            out.push(if i > 0 { g | 0x80 } else { *g });
        }
    }
    Ok(out)
}

/// True if the text is a syntactically valid OID
pub fn is_valid(text: &str) -> bool {
    encode(text).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_encoding() {
        // sha256WithRSAEncryption
        let der = encode("1.2.840.113549.1.1.11").unwrap();
        assert_eq!(der, hex::decode("2a864886f70d01010b").unwrap());
        assert_eq!(decode(&der).unwrap(), "1.2.840.113549.1.1.11");
    }

    #[test]
    fn test_joint_iso_arc_above_39() {
        let der = encode("2.999.3").unwrap();
        assert_eq!(decode(&der).unwrap(), "2.999.3");
    }

    #[test]
    fn test_invalid_text() {
        assert!(encode("1").is_err());
        assert!(encode("3.1").is_err());
        assert!(encode("1.40").is_err());
        assert!(encode("1.2.x").is_err());
        assert!(encode("1.02.3").is_err());
        assert!(!is_valid(""));
    }

    #[test]
    fn test_invalid_content() {
        assert!(decode(&[]).is_err());
        assert!(decode(&[0x2A, 0x86]).is_err());
        assert!(decode(&[0x80, 0x01]).is_err());
    }
}
