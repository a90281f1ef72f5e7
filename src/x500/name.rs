// Distinguished name: ordered RDNs, each a set of attributes

use super::DnPart;
use crate::asn1::{Element, tag};
use crate::decode_bail;
use crate::error::ProbeResult;
use std::fmt;

/// An X.500 name as found in certificate subject/issuer fields.
///
/// RDNs are kept in encoding order (most significant first). Attributes in
/// one RDN are sorted by OID, so two names with the same content compare
/// equal regardless of SET ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DistinguishedName {
    rdns: Vec<Vec<DnPart>>,
}

impl DistinguishedName {
    pub fn from_rdns(rdns: Vec<Vec<DnPart>>) -> ProbeResult<Self> {
        let mut out = Vec::with_capacity(rdns.len());
        for mut rdn in rdns {
            rdn.sort_by(|a, b| a.oid().cmp(b.oid()));
            if let Some(w) = rdn.windows(2).find(|w| w[0].oid() == w[1].oid()) {
                decode_bail!("multiple values of type {} in RDN", w[0].oid());
            }
            out.push(rdn);
        }
        Ok(Self { rdns: out })
    }

    /// Decode a Name. Strict mode requires single-valued RDNs holding
    /// string values; lenient mode allows multi-valued RDNs and binary
    /// values for unregistered attribute types.
    pub fn decode(ae: &Element, strict: bool) -> ProbeResult<Self> {
        ae.expect_tag(tag::SEQUENCE)?;
        ae.expect_constructed()?;
        let mut rdns = Vec::with_capacity(ae.subs().len());
        for ardn in ae.subs() {
            ardn.expect_tag(tag::SET)?;
            ardn.expect_sub_count_between(1, usize::MAX)?;
            let n = ardn.subs().len();
            if strict && n != 1 {
                decode_bail!("several ({}) values in RDN", n);
            }
            let mut rdn = Vec::with_capacity(n);
            for atv in ardn.subs() {
                atv.expect_tag(tag::SEQUENCE)?;
                atv.expect_sub_count(2)?;
                let oid = atv.sub(0)?.get_oid()?;
                let part = DnPart::new(oid, atv.sub(1)?.clone())?;
                if strict && !part.is_string() {
                    decode_bail!("RDN is not a string");
                }
                rdn.push(part);
            }
            rdns.push(rdn);
        }
        Self::from_rdns(rdns)
    }

    /// Parse the RFC 4514 string form (least significant RDN first)
    pub fn parse(s: &str) -> ProbeResult<Self> {
        let mut rdns: Vec<Vec<DnPart>> = Vec::new();
        let bytes = s.as_bytes();
        let mut start = 0;
        let mut append = false;
        while start < bytes.len() {
            let mut end = start;
            let mut escaped = false;
            while end < bytes.len() {
                if escaped {
                    escaped = false;
                } else {
                    match bytes[end] {
                        b',' | b'+' => break,
                        b'\\' => escaped = true,
                        _ => {}
                    }
                }
                end += 1;
            }
            let part = DnPart::parse(&s[start..end])?;
            match rdns.last_mut() {
                Some(rdn) if append => rdn.push(part),
                _ => rdns.push(vec![part]),
            }
            append = bytes.get(end) == Some(&b'+');
            start = end + 1;
        }
        rdns.reverse();
        Self::from_rdns(rdns)
    }

    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }

    pub fn rdns(&self) -> &[Vec<DnPart>] {
        &self.rdns
    }

    /// All attributes, RDN by RDN
    pub fn parts(&self) -> impl Iterator<Item = &DnPart> {
        self.rdns.iter().flatten()
    }

    pub fn to_asn1(&self) -> ProbeResult<Element> {
        let mut rdns = Vec::with_capacity(self.rdns.len());
        for rdn in &self.rdns {
            let mut atvs = Vec::with_capacity(rdn.len());
            for p in rdn {
                atvs.push(Element::sequence(vec![
                    Element::oid(p.oid())?,
                    p.asn_value().clone(),
                ]));
            }
            rdns.push(Element::set_of(atvs));
        }
        Ok(Element::sequence(rdns))
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for rdn in self.rdns.iter().rev() {
            for (j, part) in rdn.iter().enumerate() {
                if j > 0 {
                    f.write_str("+")?;
                } else if !first {
                    f.write_str(",")?;
                }
                first = false;
                write!(f, "{}", part)?;
            }
        }
        Ok(())
    }
}
