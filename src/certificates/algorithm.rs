// AlgorithmIdentifier: SEQUENCE { OID, parameters OPTIONAL }

use crate::asn1::{Element, tag};
use crate::error::ProbeResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmIdentifier {
    oid: String,
    parameters: Option<Element>,
}

impl AlgorithmIdentifier {
    pub fn new(oid: impl Into<String>, parameters: Option<Element>) -> Self {
        Self {
            oid: oid.into(),
            parameters,
        }
    }

    pub fn decode(ae: &Element) -> ProbeResult<Self> {
        ae.expect_tag(tag::SEQUENCE)?;
        Self::decode_untagged(ae)
    }

    /// Decode without checking the outer tag (for implicitly tagged uses)
    pub fn decode_untagged(ae: &Element) -> ProbeResult<Self> {
        ae.expect_sub_count_between(1, 2)?;
        let oid = ae.sub(0)?.get_oid()?;
        Ok(Self {
            oid,
            parameters: ae.subs().get(1).cloned(),
        })
    }

    pub fn oid(&self) -> &str {
        &self.oid
    }

    pub fn parameters(&self) -> Option<&Element> {
        self.parameters.as_ref()
    }

    pub fn to_asn1(&self) -> ProbeResult<Element> {
        let mut subs = vec![Element::oid(&self.oid)?];
        if let Some(p) = &self.parameters {
            subs.push(p.clone());
        }
        Ok(Element::sequence(subs))
    }
}
