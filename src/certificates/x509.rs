// X.509 certificate decoder (analysis only, no signature verification)

use super::AlgorithmIdentifier;
use crate::asn1::{Element, TagClass, tag};
use crate::data::PKIX_CURVES;
use crate::decode_bail;
use crate::error::ProbeResult;
use crate::utils::hash::{bit_length, sha1_hex};
use crate::x500::{DistinguishedName, part};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

const OID_SUBJECT_ALT_NAME: &str = "2.5.29.17";
const OID_ISSUER_ALT_NAME: &str = "2.5.29.18";

/// Public key algorithm family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Rsa,
    Dsa,
    Ec,
    Unknown,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Rsa => "RSA",
            KeyType::Dsa => "DSA",
            KeyType::Ec => "EC",
            KeyType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A certificate extension, kept as raw bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub oid: String,
    pub critical: bool,
    pub value: Vec<u8>,
}

/// Decoded certificate
#[derive(Debug, Clone)]
pub struct Certificate {
    sign_hash: String,
    serial_hex: String,
    subject: DistinguishedName,
    issuer: DistinguishedName,
    valid_from: DateTime<Utc>,
    valid_to: DateTime<Utc>,
    key_type: KeyType,
    key_size: u32,
    curve_oid: Option<String>,
    server_names: Vec<String>,
    thumbprint: String,
    extensions: BTreeMap<String, Extension>,
}

impl Certificate {
    /// Decode a DER certificate. Any structural problem fails the whole
    /// decode; no partially filled certificate is ever returned.
    pub fn decode(der: &[u8]) -> ProbeResult<Self> {
        let thumbprint = sha1_hex(der).to_uppercase();

        let ac = Element::decode(der)?;
        ac.expect_tag(tag::SEQUENCE)?;
        ac.expect_sub_count(3)?;
        let sign_hash = sign_hash_name(&AlgorithmIdentifier::decode(ac.sub(1)?)?)?;

        // optional [0] version comes first
        let tbs = ac.sub(0)?;
        tbs.expect_sub_count_between(6, 10)?;
        let off = usize::from(tbs.sub(0)?.tag() == 0);

        // raw bytes: some CAs encode the serial as if unsigned
        let aserial = tbs.sub(off)?;
        aserial.expect_tag(tag::INTEGER)?;
        let serial_hex = serial_to_hex(aserial.primitive_value()?);

        let mut issuer = DistinguishedName::decode(tbs.sub(off + 2)?, true)?;
        let mut subject = DistinguishedName::decode(tbs.sub(off + 4)?, true)?;

        let adates = tbs.sub(off + 3)?;
        adates.expect_tag(tag::SEQUENCE)?;
        adates.expect_sub_count(2)?;
        let valid_from = adates.sub(0)?.get_time()?;
        let valid_to = adates.sub(1)?.get_time()?;

        let aspki = tbs.sub(off + 5)?;
        aspki.expect_tag(tag::SEQUENCE)?;
        aspki.expect_sub_count(2)?;
        let kt = AlgorithmIdentifier::decode(aspki.sub(0)?)?;
        let kv = aspki.sub(1)?.get_bitstring()?;

        let mut key_type = KeyType::Unknown;
        let mut key_size = 0;
        let mut curve_oid = None;
        match kt.oid() {
            // rsaEncryption, plus keys tagged with the OAEP or PSS OIDs
            "1.2.840.113549.1.1.1" | "1.2.840.113549.1.1.7" | "1.2.840.113549.1.1.10" => {
                key_type = KeyType::Rsa;
                key_size = rsa_public_key_size(&kv)?;
            }
            "1.2.840.10040.4.1" => {
                key_type = KeyType::Dsa;
                key_size = dsa_public_key_size(kt.parameters())?;
            }
            // named curves only; explicit parameters leave the type unknown
            "1.2.840.10045.2.1" => {
                if let Some(p) = kt.parameters()
                    && p.is_universal(tag::OBJECT_IDENTIFIER)
                {
                    let oid = p.get_oid()?;
                    key_type = KeyType::Ec;
                    key_size = PKIX_CURVES.get(&oid).map_or(0, |c| c.size);
                    curve_oid = Some(oid);
                }
            }
            _ => {}
        }

        let mut extensions = BTreeMap::new();
        let mut server_names: Option<Vec<String>> = None;
        for aexts in tbs.subs().iter().skip(off + 6) {
            if !aexts.is_context(3) {
                continue;
            }
            aexts.expect_sub_count(1)?;
            let aexts = aexts.sub(0)?;
            aexts.expect_tag(tag::SEQUENCE)?;
            for aext in aexts.subs() {
                let ext = decode_extension(aext)?;
                if extensions.contains_key(&ext.oid) {
                    decode_bail!("duplicate extension {}", ext.oid);
                }
                match ext.oid.as_str() {
                    OID_SUBJECT_ALT_NAME => {
                        let alt = AltNames::decode(&ext.value)?;
                        if let Some(dn) = alt.name
                            && subject.is_empty()
                        {
                            subject = dn;
                        }
                        if !alt.dns_names.is_empty() {
                            server_names = Some(alt.dns_names);
                        }
                    }
                    OID_ISSUER_ALT_NAME => {
                        let alt = AltNames::decode(&ext.value)?;
                        if let Some(dn) = alt.name
                            && issuer.is_empty()
                        {
                            issuer = dn;
                        }
                    }
                    _ => {}
                }
                extensions.insert(ext.oid.clone(), ext);
            }
        }

        let mut cn: Option<&str> = None;
        for p in subject.parts() {
            if p.friendly_type() == part::COMMON_NAME {
                if cn.is_some() {
                    decode_bail!("multiple CN in subject DN");
                }
                cn = p.value();
            }
        }
        let server_names = match server_names {
            Some(names) => names,
            None => cn.map(|c| vec![c.to_string()]).unwrap_or_default(),
        };

        Ok(Self {
            sign_hash,
            serial_hex,
            subject,
            issuer,
            valid_from,
            valid_to,
            key_type,
            key_size,
            curve_oid,
            server_names,
            thumbprint,
            extensions,
        })
    }

    /// Hash function of the certificate signature, "UNKNOWN" if unrecognized
    pub fn sign_hash(&self) -> &str {
        &self.sign_hash
    }

    /// Serial number, uppercase hex with no leading zero bytes
    pub fn serial_hex(&self) -> &str {
        &self.serial_hex
    }

    pub fn subject(&self) -> &DistinguishedName {
        &self.subject
    }

    pub fn issuer(&self) -> &DistinguishedName {
        &self.issuer
    }

    pub fn valid_from(&self) -> DateTime<Utc> {
        self.valid_from
    }

    pub fn valid_to(&self) -> DateTime<Utc> {
        self.valid_to
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Modulus size (RSA), prime size (DSA) or curve order size (EC);
    /// 0 when not known
    pub fn key_size(&self) -> u32 {
        self.key_size
    }

    pub fn curve_oid(&self) -> Option<&str> {
        self.curve_oid.as_deref()
    }

    /// Curve name if registered, else the curve OID
    pub fn curve_name(&self) -> Option<&str> {
        self.curve_oid
            .as_deref()
            .map(|oid| PKIX_CURVES.get(oid).map_or(oid, |c| c.name.as_str()))
    }

    /// SAN dNSNames, or the subject CN when there are none
    pub fn server_names(&self) -> &[String] {
        &self.server_names
    }

    /// SHA-1 of the DER encoding, uppercase hex
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }

    pub fn extensions(&self) -> impl Iterator<Item = &Extension> {
        self.extensions.values()
    }

    pub fn extension(&self, oid: &str) -> Option<&Extension> {
        self.extensions.get(oid)
    }
}

fn serial_to_hex(sv: &[u8]) -> String {
    let start = sv.iter().position(|&b| b != 0).unwrap_or(sv.len());
    if start == sv.len() {
        "00".to_string()
    } else {
        hex::encode_upper(&sv[start..])
    }
}

fn decode_extension(aext: &Element) -> ProbeResult<Extension> {
    aext.expect_tag(tag::SEQUENCE)?;
    aext.expect_sub_count_between(2, 3)?;
    let oid = aext.sub(0)?.get_oid()?;
    let (critical, av) = if aext.subs().len() == 2 {
        (false, aext.sub(1)?)
    } else {
        (aext.sub(1)?.get_boolean()?, aext.sub(2)?)
    };
    Ok(Extension {
        oid,
        critical,
        value: av.get_octet_string()?.to_vec(),
    })
}

/// Interesting parts of a GeneralNames value
struct AltNames {
    dns_names: Vec<String>,
    /// The directoryName, only when exactly one is present
    name: Option<DistinguishedName>,
}

impl AltNames {
    fn decode(ext_value: &[u8]) -> ProbeResult<Self> {
        let ae = Element::decode(ext_value)?;
        ae.expect_tag(tag::SEQUENCE)?;
        ae.expect_constructed()?;
        let mut dns_names = Vec::new();
        let mut found_dn = false;
        let mut name = None;
        for agn in ae.subs() {
            if agn.class() != TagClass::Context {
                continue;
            }
            match agn.tag() {
                2 => dns_names.push(agn.get_string_as(tag::IA5_STRING)?),
                // Name is a CHOICE, so the [4] tag is explicit
                4 => {
                    agn.expect_sub_count(1)?;
                    name = if found_dn {
                        None
                    } else {
                        Some(DistinguishedName::decode(agn.sub(0)?, false)?)
                    };
                    found_dn = true;
                }
                _ => {}
            }
        }
        Ok(Self { dns_names, name })
    }
}

fn rsa_public_key_size(kv: &[u8]) -> ProbeResult<u32> {
    let ae = Element::decode(kv)?;
    ae.expect_tag(tag::SEQUENCE)?;
    ae.expect_sub_count(2)?;
    let v = ae.sub(0)?.get_integer_bytes()?;
    if v[0] >= 0x80 {
        decode_bail!("Invalid RSA modulus (negative)");
    }
    let bit_len = bit_length(v);
    if bit_len < 512 {
        decode_bail!("Invalid RSA modulus ({} bits)", bit_len);
    }
    if v[v.len() - 1] & 0x01 == 0 {
        decode_bail!("Invalid RSA modulus (even)");
    }
    Ok(bit_len)
}

/// Size of p from Dss-Parms; 0 when parameters are inherited from the CA
fn dsa_public_key_size(params: Option<&Element>) -> ProbeResult<u32> {
    let Some(adp) = params else {
        return Ok(0);
    };
    adp.expect_tag(tag::SEQUENCE)?;
    adp.expect_sub_count(3)?;
    for ai in adp.subs() {
        ai.get_integer_bytes()?;
    }
    let v = adp.sub(0)?.get_integer_bytes()?;
    if v[0] >= 0x80 {
        decode_bail!("Invalid DSA prime (negative)");
    }
    // FIPS 186-1 allowed 512..1024 in steps of 64; later revisions use
    // multiples of 1024
    let bit_len = bit_length(v);
    let good_len = if bit_len < 1024 {
        bit_len >= 512 && bit_len % 64 == 0
    } else {
        bit_len % 1024 == 0
    };
    if !good_len {
        decode_bail!("Invalid DSA prime ({} bits)", bit_len);
    }
    if v[v.len() - 1] & 0x01 == 0 {
        decode_bail!("Invalid DSA prime (even)");
    }
    Ok(bit_len)
}

fn sign_hash_name(ai: &AlgorithmIdentifier) -> ProbeResult<String> {
    let name = match ai.oid() {
        // RSA PKCS#1 v1.5
        "1.2.840.113549.1.1.2" => "MD2",
        "1.2.840.113549.1.1.4" => "MD5",
        "1.2.840.113549.1.1.5" => "SHA-1",
        "1.2.840.113549.1.1.14" => "SHA-224",
        "1.2.840.113549.1.1.11" => "SHA-256",
        "1.2.840.113549.1.1.12" => "SHA-384",
        "1.2.840.113549.1.1.13" => "SHA-512",

        // RSA-PSS: hashAlgorithm [0] defaults to SHA-1
        "1.2.840.113549.1.1.10" => {
            let Some(apss) = ai.parameters() else {
                return Ok("SHA-1".into());
            };
            apss.expect_sub_count_between(0, 4)?;
            match apss.subs().first() {
                Some(a0) if a0.is_context(0) => {
                    a0.expect_sub_count(1)?;
                    return Ok(hash_name(AlgorithmIdentifier::decode(a0.sub(0)?)?.oid()).into());
                }
                _ => "SHA-1",
            }
        }

        // DSA (RFC 3279, RFC 5758)
        "1.2.840.10040.4.1" => return hash_from_params(ai, "DSA"),
        "1.2.840.10040.4.3" => "SHA-1",
        "2.16.840.1.101.3.4.3.1" => "SHA-224",
        "2.16.840.1.101.3.4.3.2" => "SHA-256",

        // ECDSA (ANSI X9.62)
        "1.2.840.10045.4.1" => "SHA-1",
        "1.2.840.10045.4.3" => return hash_from_params(ai, "ECDSA"),
        "1.2.840.10045.4.3.1" => "SHA-224",
        "1.2.840.10045.4.3.2" => "SHA-256",
        "1.2.840.10045.4.3.3" => "SHA-384",
        "1.2.840.10045.4.3.4" => "SHA-512",

        _ => "UNKNOWN",
    };
    Ok(name.to_string())
}

fn hash_from_params(ai: &AlgorithmIdentifier, what: &str) -> ProbeResult<String> {
    let Some(p) = ai.parameters() else {
        decode_bail!("Missing hash function for {}", what);
    };
    Ok(hash_name(AlgorithmIdentifier::decode(p)?.oid()).to_string())
}

fn hash_name(oid: &str) -> &'static str {
    match oid {
        "1.3.14.3.2.26" => "SHA-1",
        "1.2.840.113549.2.2" => "MD2",
        "1.2.840.113549.2.4" => "MD4",
        "1.2.840.113549.2.5" => "MD5",
        "2.16.840.1.101.3.4.2.1" => "SHA-256",
        "2.16.840.1.101.3.4.2.2" => "SHA-384",
        "2.16.840.1.101.3.4.2.3" => "SHA-512",
        "2.16.840.1.101.3.4.2.4" => "SHA-224",
        "2.16.840.1.101.3.4.2.5" => "SHA-512-224",
        "2.16.840.1.101.3.4.2.6" => "SHA-512-256",
        "2.16.840.1.101.3.4.2.7" => "SHA-3/224",
        "2.16.840.1.101.3.4.2.8" => "SHA-3/256",
        "2.16.840.1.101.3.4.2.9" => "SHA-3/384",
        "2.16.840.1.101.3.4.2.10" => "SHA-3/512",
        "2.16.840.1.101.3.4.2.11" => "SHAKE-128",
        "2.16.840.1.101.3.4.2.12" => "SHAKE-256",
        "1.2.643.2.2.30.1" => "GOST-R-34.11-94",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_to_hex() {
        assert_eq!(serial_to_hex(&[0x00, 0x8F, 0x01]), "8F01");
        assert_eq!(serial_to_hex(&[0x00]), "00");
        assert_eq!(serial_to_hex(&[]), "00");
        // wrongly "negative" serials are read as unsigned
        assert_eq!(serial_to_hex(&[0xC5, 0x10]), "C510");
    }

    #[test]
    fn test_pss_hash_from_params() {
        let sha256 = AlgorithmIdentifier::new("2.16.840.1.101.3.4.2.1", None).to_asn1().unwrap();
        let params = Element::sequence(vec![Element::explicit(0, sha256)]);
        let ai = AlgorithmIdentifier::new("1.2.840.113549.1.1.10", Some(params));
        assert_eq!(sign_hash_name(&ai).unwrap(), "SHA-256");

        let default = AlgorithmIdentifier::new("1.2.840.113549.1.1.10", Some(Element::sequence(vec![])));
        assert_eq!(sign_hash_name(&default).unwrap(), "SHA-1");
    }

    #[test]
    fn test_sign_hash_table() {
        let name = |oid: &str| sign_hash_name(&AlgorithmIdentifier::new(oid, None)).unwrap();
        assert_eq!(name("1.2.840.113549.1.1.4"), "MD5");
        assert_eq!(name("1.2.840.10045.4.3.3"), "SHA-384");
        assert_eq!(name("1.3.101.112"), "UNKNOWN");
        assert!(sign_hash_name(&AlgorithmIdentifier::new("1.2.840.10045.4.3", None)).is_err());
    }

    #[test]
    fn test_rsa_key_checks() {
        let key = |modulus: &[u8]| {
            Element::sequence(vec![Element::unsigned_integer(modulus), Element::integer(65537)])
                .encode()
        };
        let mut m = vec![0xC1; 128];
        m[127] = 0x01;
        assert_eq!(rsa_public_key_size(&key(&m)).unwrap(), 1024);
        m[127] = 0x02;
        assert!(rsa_public_key_size(&key(&m)).is_err());
        assert!(rsa_public_key_size(&key(&[0xC1; 32])).is_err());
    }

    #[test]
    fn test_dsa_size_classes() {
        let params = |plen: usize| {
            let mut p = vec![0xFF; plen];
            p[0] = 0x80;
            Element::sequence(vec![
                Element::unsigned_integer(&p),
                Element::integer(7),
                Element::integer(2),
            ])
        };
        assert_eq!(dsa_public_key_size(Some(&params(96))).unwrap(), 768);
        assert_eq!(dsa_public_key_size(Some(&params(256))).unwrap(), 2048);
        assert!(dsa_public_key_size(Some(&params(160))).is_err());
        assert_eq!(dsa_public_key_size(None).unwrap(), 0);
    }
}
