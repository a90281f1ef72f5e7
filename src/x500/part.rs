// Distinguished name attribute (one type/value pair of an RDN)

use crate::asn1::{self, Element, tag};
use crate::decode_bail;
use crate::error::{ProbeError, ProbeResult};
use std::fmt;
use std::hash::{Hash, Hasher};

pub const COMMON_NAME: &str = "CN";
pub const LOCALITY: &str = "L";
pub const STATE: &str = "ST";
pub const ORGANIZATION: &str = "O";
pub const ORGANIZATIONAL_UNIT: &str = "OU";
pub const COUNTRY: &str = "C";
pub const STREET: &str = "STREET";
pub const DOMAIN_COMPONENT: &str = "DC";
pub const USER_ID: &str = "UID";
pub const EMAIL_ADDRESS: &str = "EMAILADDRESS";

const FRIENDLY_TYPES: &[(&str, &str)] = &[
    ("2.5.4.3", COMMON_NAME),
    ("2.5.4.7", LOCALITY),
    ("2.5.4.8", STATE),
    ("2.5.4.10", ORGANIZATION),
    ("2.5.4.11", ORGANIZATIONAL_UNIT),
    ("2.5.4.6", COUNTRY),
    ("2.5.4.9", STREET),
    ("0.9.2342.19200300.100.1.25", DOMAIN_COMPONENT),
    ("0.9.2342.19200300.100.1.1", USER_ID),
    ("1.2.840.113549.1.9.1", EMAIL_ADDRESS),
];

/// Short attribute name for a registered OID
pub fn friendly_type(oid: &str) -> Option<&'static str> {
    FRIENDLY_TYPES.iter().find(|(o, _)| *o == oid).map(|(_, ft)| *ft)
}

/// OID for a short attribute name (case-insensitive, "S" is accepted for "ST")
pub fn oid_for_friendly_type(name: &str) -> Option<&'static str> {
    let name = if name.eq_ignore_ascii_case("S") { STATE } else { name };
    FRIENDLY_TYPES
        .iter()
        .find(|(_, ft)| ft.eq_ignore_ascii_case(name))
        .map(|(o, _)| *o)
}

/// One attribute of a distinguished name
#[derive(Debug, Clone)]
pub struct DnPart {
    oid: String,
    value: Option<String>,
    asn_value: Element,
    normalized: Option<String>,
    encoded: Vec<u8>,
}

impl DnPart {
    /// Registered attribute types must carry a string value; others may
    /// hold arbitrary ASN.1.
    pub fn new(oid: impl Into<String>, asn_value: Element) -> ProbeResult<Self> {
        let oid = oid.into();
        let encoded = asn_value.encode();
        let (value, normalized) = match asn_value.get_string() {
            Ok(s) => {
                let norm = normalize(&s);
                (Some(s), Some(norm))
            }
            Err(e) => {
                if friendly_type(&oid).is_some() {
                    return Err(e);
                }
                (None, None)
            }
        };
        Ok(Self {
            oid,
            value,
            asn_value,
            normalized,
            encoded,
        })
    }

    pub fn oid(&self) -> &str {
        &self.oid
    }

    /// String value, if the attribute value is a character string
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn is_string(&self) -> bool {
        self.value.is_some()
    }

    pub fn asn_value(&self) -> &Element {
        &self.asn_value
    }

    /// Short name ("CN", "O", ...) or the OID itself
    pub fn friendly_type(&self) -> &str {
        friendly_type(&self.oid).unwrap_or(&self.oid)
    }

    /// Parse one `type=value` component of an RFC 4514 string
    pub fn parse(s: &str) -> ProbeResult<Self> {
        let Some(eq) = s.find('=') else {
            decode_bail!("invalid DN: no '=' sign");
        };
        let attr = s[..eq].trim();
        let raw = trim_value(&s[eq + 1..]);

        let oid = match oid_for_friendly_type(attr) {
            Some(oid) => oid.to_string(),
            None if asn1::oid::is_valid(attr) => attr.to_string(),
            None => decode_bail!("invalid DN: unknown attribute type '{}'", attr),
        };

        let value = if let Some(hex_value) = raw.strip_prefix('#') {
            let bytes = hex::decode(hex_value)
                .map_err(|e| ProbeError::Decode(format!("bad DN value: {}", e)))?;
            Element::decode(&bytes)
                .map_err(|e| ProbeError::Decode(format!("bad DN value: {}", e)))?
        } else {
            let text = unescape(raw)?;
            let string_type = if text.chars().all(asn1::is_printable) {
                tag::PRINTABLE_STRING
            } else {
                tag::UTF8_STRING
            };
            Element::string(string_type, &text)?
        };
        DnPart::new(oid, value)
    }
}

impl PartialEq for DnPart {
    fn eq(&self, other: &Self) -> bool {
        if self.oid != other.oid {
            return false;
        }
        match (&self.normalized, &other.normalized) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.encoded == other.encoded,
            _ => false,
        }
    }
}

impl Eq for DnPart {}

impl Hash for DnPart {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.oid.hash(state);
        match &self.normalized {
            Some(n) => n.hash(state),
            None => self.encoded.hash(state),
        }
    }
}

impl fmt::Display for DnPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (friendly_type(&self.oid), &self.value) {
            (Some(ft), Some(value)) => {
                write!(f, "{}=", ft)?;
                let bytes = value.as_bytes();
                let last = bytes.len().saturating_sub(1);
                for (i, &b) in bytes.iter().enumerate() {
                    let edge = (i == 0 && (b == b' ' || b == b'#')) || (i == last && b == b' ');
                    if edge || must_escape(b) {
                        match b {
                            b' ' | b'"' | b'#' | b'+' | b',' | b';' | b'<' | b'=' | b'>' | b'\\' => {
                                write!(f, "\\{}", char::from(b))?
                            }
                            _ => write!(f, "\\{:02X}", b)?,
                        }
                    } else {
                        write!(f, "{}", char::from(b))?;
                    }
                }
                Ok(())
            }
            _ => write!(f, "{}=#{}", self.oid, hex::encode_upper(&self.encoded)),
        }
    }
}

fn must_escape(b: u8) -> bool {
    !(0x20..0x7F).contains(&b) || matches!(b, b'"' | b'+' | b',' | b';' | b'<' | b'>' | b'\\')
}

/// Trim surrounding spaces but keep an escaped trailing space
fn trim_value(s: &str) -> &str {
    let start = s.trim_start();
    let trimmed = start.trim_end();
    let backslashes = trimmed.bytes().rev().take_while(|&b| b == b'\\').count();
    if backslashes % 2 == 1 && trimmed.len() < start.len() {
        &start[..trimmed.len() + 1]
    } else {
        trimmed
    }
}

fn unescape(s: &str) -> ProbeResult<String> {
    let mut out = Vec::with_capacity(s.len());
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        let Some((_, n)) = chars.next() else {
            decode_bail!("truncated escape in DN value");
        };
        if n.is_ascii_hexdigit() {
            let Some((_, n2)) = chars.next() else {
                decode_bail!("truncated escape in DN value");
            };
            if !n2.is_ascii_hexdigit() {
                decode_bail!("not a hex digit in DN value: U+{:04X}", u32::from(n2));
            }
            let byte = u8::from_str_radix(&s[i + 1..i + 3], 16)
                .map_err(|_| ProbeError::Decode("invalid hex escape".into()))?;
            out.push(byte);
        } else {
            let mut buf = [0u8; 4];
            out.extend_from_slice(n.encode_utf8(&mut buf).as_bytes());
        }
    }
    String::from_utf8(out).map_err(|_| ProbeError::Decode("invalid hex escape: not UTF-8".into()))
}

/// Case fold, drop control characters, collapse whitespace runs
fn normalize(s: &str) -> String {
    let folded = s.to_uppercase().to_lowercase();
    let mut out = String::with_capacity(folded.len());
    let mut last_was_space = true;
    for c in folded.trim().chars() {
        if is_control(c) {
            continue;
        }
        if is_space(c) {
            if last_was_space {
                continue;
            }
            last_was_space = true;
            out.push(' ');
        } else {
            last_was_space = false;
            out.push(c);
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

fn is_control(c: char) -> bool {
    matches!(u32::from(c),
        0x0000..=0x0008
        | 0x000E..=0x001F
        | 0x007F..=0x0084
        | 0x0086..=0x009F
        | 0x06DD
        | 0x070F
        | 0x180E
        | 0x200C..=0x200F
        | 0x202A..=0x202E
        | 0x2060..=0x2063
        | 0x206A..=0x206F
        | 0xFEFF
        | 0xFFF9..=0xFFFB)
}

fn is_space(c: char) -> bool {
    matches!(u32::from(c),
        0x0020 | 0x00A0 | 0x1680 | 0x2000..=0x200A | 0x2028 | 0x2029 | 0x202F | 0x205F | 0x3000)
}
