// Certificate and chain decoding on synthetic DER built with the ASN.1
// constructors

mod common;

use chrono::{TimeZone, Utc};
use common::{ECDSA_WITH_SHA384, MD5_WITH_RSA, TestCert, TestKey};
use sslprobe::asn1::Element;
use sslprobe::certificates::{Certificate, CertificateChain, KeyType};
use sslprobe::utils::hash::sha1_hex;
use sslprobe::x500::DistinguishedName;

#[test]
fn test_rsa_leaf_fields() {
    let mut cert = TestCert::new("CN=www.example.com,O=Example\\, Inc.,C=US", "CN=Example CA,C=US");
    cert.serial = 0x00C0FFEE;
    cert.key = TestKey::Rsa(3072);
    cert.dns_names = &["www.example.com", "example.com"];
    let der = cert.to_der();

    let c = Certificate::decode(&der).unwrap();
    assert_eq!(c.sign_hash(), "SHA-256");
    assert_eq!(c.serial_hex(), "C0FFEE");
    assert_eq!(c.subject().to_string(), "CN=www.example.com,O=Example\\, Inc.,C=US");
    assert_eq!(c.issuer().to_string(), "CN=Example CA,C=US");
    assert_eq!(c.valid_from(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    assert_eq!(c.valid_to(), Utc.with_ymd_and_hms(2034, 1, 1, 0, 0, 0).unwrap());
    assert_eq!(c.key_type(), KeyType::Rsa);
    assert_eq!(c.key_size(), 3072);
    assert_eq!(c.server_names(), ["www.example.com", "example.com"]);
    assert_eq!(c.thumbprint(), sha1_hex(&der).to_uppercase());
    assert!(!c.is_self_issued());
    assert!(c.extension("2.5.29.17").is_some());
}

#[test]
fn test_common_name_fallback_and_generalized_time() {
    let mut cert = TestCert::new("CN=legacy.example,OU=Ops", "CN=legacy.example,OU=Ops");
    cert.not_after = Utc.with_ymd_and_hms(2050, 6, 1, 12, 0, 0).unwrap();
    let c = Certificate::decode(&cert.to_der()).unwrap();
    assert_eq!(c.server_names(), ["legacy.example"]);
    assert!(c.is_self_issued());
    assert_eq!(c.valid_to(), Utc.with_ymd_and_hms(2050, 6, 1, 12, 0, 0).unwrap());
}

#[test]
fn test_ec_key() {
    let mut cert = TestCert::new("CN=ec.example", "CN=EC CA");
    cert.sign_oid = ECDSA_WITH_SHA384;
    cert.key = TestKey::P256;
    let c = Certificate::decode(&cert.to_der()).unwrap();
    assert_eq!(c.sign_hash(), "SHA-384");
    assert_eq!(c.key_type(), KeyType::Ec);
    assert_eq!(c.key_size(), 256);
    assert_eq!(c.curve_oid(), Some("1.2.840.10045.3.1.7"));
    assert_eq!(c.curve_name(), Some("ansix9p256r1 (P-256)"));
}

#[test]
fn test_rejects_short_rsa_modulus() {
    let mut cert = TestCert::new("CN=tiny.example", "CN=tiny.example");
    cert.key = TestKey::Rsa(256);
    assert!(Certificate::decode(&cert.to_der()).is_err());
}

#[test]
fn test_rejects_trailing_garbage() {
    let mut der = TestCert::new("CN=a.example", "CN=a.example").to_der();
    der.push(0);
    assert!(Certificate::decode(&der).is_err());
}

#[test]
fn test_chain_aggregates() {
    let mut leaf = TestCert::new("CN=shop.example", "CN=Intermediate");
    leaf.sign_oid = MD5_WITH_RSA;
    let intermediate = TestCert::new("CN=Intermediate", "CN=Root");
    let root = TestCert::new("CN=Root", "CN=Root");
    let ders = vec![leaf.to_der(), intermediate.to_der(), root.to_der()];

    let chain = CertificateChain::new(ders.clone());
    assert_eq!(chain.len(), 3);
    assert!(chain.is_decodable());
    assert!(chain.names_match());
    assert!(chain.includes_root());
    // the self-issued root does not count
    assert_eq!(chain.sign_hashes().unwrap(), ["MD5", "SHA-256"]);
    assert_eq!(chain.end_entity().unwrap().subject().to_string(), "CN=shop.example");

    let concat: Vec<u8> = ders.concat();
    assert_eq!(chain.hash(), sha1_hex(&concat));

    let broken = CertificateChain::new(vec![ders[0].clone(), ders[2].clone()]);
    assert!(broken.is_decodable());
    assert!(!broken.names_match());
}

#[test]
fn test_chain_with_undecodable_entry() {
    let good = TestCert::new("CN=ok.example", "CN=ok.example").to_der();
    let chain = CertificateChain::new(vec![good, vec![0x30, 0x03, 0x02, 0x01, 0x00]]);
    assert!(!chain.is_decodable());
    assert!(chain.sign_hashes().is_none());
    assert!(chain.entries()[0].certificate().is_some());
    assert!(chain.entries()[1].decode_error().is_some());
}

#[test]
fn test_distinguished_name_round_trip() {
    let dn = DistinguishedName::parse("CN=Jos\u{e9},OU=R&D+O=Acme,L=Paris,C=FR").unwrap();
    let der = dn.to_asn1().unwrap().encode();
    let decoded = DistinguishedName::decode(&Element::decode(&der).unwrap(), false).unwrap();
    assert_eq!(decoded, dn);
    assert_eq!(decoded.to_string(), dn.to_string());
    // multi-valued RDN is refused in certificate fields
    assert!(DistinguishedName::decode(&Element::decode(&der).unwrap(), true).is_err());
}
