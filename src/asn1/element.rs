// ASN.1 element model, structural assertions and constructors

use super::{oid, strings, tag};
use crate::decode_bail;
use crate::error::{ProbeError, ProbeResult};
use chrono::{DateTime, Datelike, Utc};

/// Tag class (top two bits of the identifier octet)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagClass {
    Universal,
    Application,
    Context,
    Private,
}

impl TagClass {
    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => TagClass::Universal,
            1 => TagClass::Application,
            2 => TagClass::Context,
            _ => TagClass::Private,
        }
    }

    pub(crate) fn bits(self) -> u8 {
        match self {
            TagClass::Universal => 0,
            TagClass::Application => 1,
            TagClass::Context => 2,
            TagClass::Private => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Content {
    Primitive(Vec<u8>),
    Constructed(Vec<Element>),
}

/// One decoded (or constructed) ASN.1 element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub(crate) class: TagClass,
    pub(crate) tag: u32,
    pub(crate) content: Content,
}

impl Element {
    /// Build a primitive element from raw value bytes
    pub fn primitive(class: TagClass, tag: u32, value: impl Into<Vec<u8>>) -> Self {
        Self {
            class,
            tag,
            content: Content::Primitive(value.into()),
        }
    }

    /// Build a constructed element from its sub-elements
    pub fn constructed(class: TagClass, tag: u32, subs: Vec<Element>) -> Self {
        Self {
            class,
            tag,
            content: Content::Constructed(subs),
        }
    }

    pub fn sequence(subs: Vec<Element>) -> Self {
        Self::constructed(TagClass::Universal, tag::SEQUENCE, subs)
    }

    /// SET with the given order kept as-is
    pub fn set(subs: Vec<Element>) -> Self {
        Self::constructed(TagClass::Universal, tag::SET, subs)
    }

    /// SET OF, with sub-elements sorted by their encoding as DER requires
    pub fn set_of(mut subs: Vec<Element>) -> Self {
        subs.sort_by_cached_key(|e| e.encode());
        Self::set(subs)
    }

    /// Explicitly tagged wrapper `[n] { inner }`
    pub fn explicit(n: u32, inner: Element) -> Self {
        Self::constructed(TagClass::Context, n, vec![inner])
    }

    pub fn oid(text: &str) -> ProbeResult<Self> {
        Ok(Self::primitive(
            TagClass::Universal,
            tag::OBJECT_IDENTIFIER,
            oid::encode(text)?,
        ))
    }

    pub fn boolean(v: bool) -> Self {
        Self::primitive(TagClass::Universal, tag::BOOLEAN, vec![if v { 0xFF } else { 0x00 }])
    }

    pub fn null() -> Self {
        Self::primitive(TagClass::Universal, tag::NULL, Vec::new())
    }

    pub fn integer(v: u64) -> Self {
        Self::unsigned_integer(&v.to_be_bytes())
    }

    /// INTEGER from an unsigned big-endian magnitude
    pub fn unsigned_integer(magnitude: &[u8]) -> Self {
        let start = magnitude.iter().position(|&b| b != 0).unwrap_or(magnitude.len());
        let trimmed = &magnitude[start..];
        let mut v = Vec::with_capacity(trimmed.len() + 1);
        if trimmed.is_empty() || trimmed[0] >= 0x80 {
            v.push(0);
        }
        v.extend_from_slice(trimmed);
        Self::primitive(TagClass::Universal, tag::INTEGER, v)
    }

    pub fn octet_string(v: impl Into<Vec<u8>>) -> Self {
        Self::primitive(TagClass::Universal, tag::OCTET_STRING, v)
    }

    /// BIT STRING with no unused bits
    pub fn bit_string(bits: &[u8]) -> Self {
        let mut v = Vec::with_capacity(bits.len() + 1);
        v.push(0);
        v.extend_from_slice(bits);
        Self::primitive(TagClass::Universal, tag::BIT_STRING, v)
    }

    /// Character string of the given universal string type
    pub fn string(string_type: u32, s: &str) -> ProbeResult<Self> {
        let v = strings::encode_string(string_type, s)?;
        Ok(Self::primitive(TagClass::Universal, string_type, v))
    }

    /// UTCTime for years 1950..=2049, GeneralizedTime otherwise
    pub fn time(t: &DateTime<Utc>) -> Self {
        if (1950..2050).contains(&t.year()) {
            Self::utc_time(t)
        } else {
            Self::generalized_time(t)
        }
    }

    pub fn utc_time(t: &DateTime<Utc>) -> Self {
        let s = t.format("%y%m%d%H%M%SZ").to_string();
        Self::primitive(TagClass::Universal, tag::UTC_TIME, s.into_bytes())
    }

    pub fn generalized_time(t: &DateTime<Utc>) -> Self {
        let s = t.format("%Y%m%d%H%M%SZ").to_string();
        Self::primitive(TagClass::Universal, tag::GENERALIZED_TIME, s.into_bytes())
    }

    pub fn class(&self) -> TagClass {
        self.class
    }

    pub fn tag(&self) -> u32 {
        self.tag
    }

    pub fn is_constructed(&self) -> bool {
        matches!(self.content, Content::Constructed(_))
    }

    /// True for a universal-class element with the given tag number
    pub fn is_universal(&self, tag: u32) -> bool {
        self.class == TagClass::Universal && self.tag == tag
    }

    pub fn is_context(&self, n: u32) -> bool {
        self.class == TagClass::Context && self.tag == n
    }

    /// Raw value bytes; for constructed elements, the encoded sub-elements
    pub fn value(&self) -> Vec<u8> {
        match &self.content {
            Content::Primitive(v) => v.clone(),
            Content::Constructed(subs) => {
                let mut out = Vec::new();
                for s in subs {
                    s.encode_into(&mut out);
                }
                out
            }
        }
    }

    /// Sub-elements (empty for primitive elements)
    pub fn subs(&self) -> &[Element] {
        match &self.content {
            Content::Constructed(subs) => subs,
            Content::Primitive(_) => &[],
        }
    }

    pub fn sub(&self, i: usize) -> ProbeResult<&Element> {
        self.subs().get(i).ok_or_else(|| {
            ProbeError::Decode(format!("missing sub-element {} (have {})", i, self.subs().len()))
        })
    }

    pub fn expect_tag(&self, tag: u32) -> ProbeResult<()> {
        if !self.is_universal(tag) {
            decode_bail!(
                "unexpected tag: {:?}/{} (expected universal/{})",
                self.class,
                self.tag,
                tag
            );
        }
        Ok(())
    }

    pub fn expect_constructed(&self) -> ProbeResult<()> {
        if !self.is_constructed() {
            decode_bail!("expected a constructed element (tag {})", self.tag);
        }
        Ok(())
    }

    pub(crate) fn primitive_value(&self) -> ProbeResult<&[u8]> {
        match &self.content {
            Content::Primitive(v) => Ok(v),
            Content::Constructed(_) => {
                decode_bail!("expected a primitive element (tag {})", self.tag)
            }
        }
    }

    pub fn expect_sub_count(&self, n: usize) -> ProbeResult<()> {
        self.expect_sub_count_between(n, n)
    }

    pub fn expect_sub_count_between(&self, min: usize, max: usize) -> ProbeResult<()> {
        self.expect_constructed()?;
        let n = self.subs().len();
        if n < min || n > max {
            if min == max {
                decode_bail!("expected {} sub-element(s), got {}", min, n);
            }
            decode_bail!("expected {}..{} sub-element(s), got {}", min, max, n);
        }
        Ok(())
    }

    pub fn get_oid(&self) -> ProbeResult<String> {
        self.expect_tag(tag::OBJECT_IDENTIFIER)?;
        oid::decode(self.primitive_value()?)
    }

    /// Decode any universal character-string type
    pub fn get_string(&self) -> ProbeResult<String> {
        if self.class != TagClass::Universal {
            decode_bail!("not a character string (class {:?})", self.class);
        }
        strings::decode_string(self.tag, self.primitive_value()?)
    }

    /// Decode the value bytes as the given string type, whatever the tag
    /// (used for implicitly tagged strings such as SAN dNSName)
    pub fn get_string_as(&self, string_type: u32) -> ProbeResult<String> {
        strings::decode_string(string_type, self.primitive_value()?)
    }

    pub fn get_time(&self) -> ProbeResult<DateTime<Utc>> {
        let v = self.primitive_value()?;
        match (self.class, self.tag) {
            (TagClass::Universal, tag::UTC_TIME) => strings::decode_utc_time(v),
            (TagClass::Universal, tag::GENERALIZED_TIME) => strings::decode_generalized_time(v),
            _ => decode_bail!("not a time value (tag {})", self.tag),
        }
    }

    pub fn get_boolean(&self) -> ProbeResult<bool> {
        self.expect_tag(tag::BOOLEAN)?;
        match self.primitive_value()? {
            [0x00] => Ok(false),
            [_] => Ok(true),
            v => decode_bail!("invalid BOOLEAN length: {}", v.len()),
        }
    }

    /// BIT STRING payload (without the unused-bits octet)
    pub fn get_bitstring(&self) -> ProbeResult<Vec<u8>> {
        self.expect_tag(tag::BIT_STRING)?;
        let v = self.primitive_value()?;
        match v.split_first() {
            None => decode_bail!("empty BIT STRING"),
            Some((&unused, rest)) => {
                if unused > 7 || (rest.is_empty() && unused != 0) {
                    decode_bail!("invalid BIT STRING unused bits: {}", unused);
                }
                Ok(rest.to_vec())
            }
        }
    }

    /// Raw two's-complement bytes of an INTEGER
    pub fn get_integer_bytes(&self) -> ProbeResult<&[u8]> {
        self.expect_tag(tag::INTEGER)?;
        let v = self.primitive_value()?;
        if v.is_empty() {
            decode_bail!("empty INTEGER");
        }
        Ok(v)
    }

    pub fn get_octet_string(&self) -> ProbeResult<&[u8]> {
        self.expect_tag(tag::OCTET_STRING)?;
        self.primitive_value()
    }
}
