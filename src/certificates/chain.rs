// Certificate chain as sent by a server, with per-chain aggregates

use super::Certificate;
use crate::utils::hash::{sha1_hex, sha1_hex_concat};
use std::collections::BTreeSet;

/// One chain element: the raw certificate and its decoded form or the
/// reason it could not be decoded
#[derive(Debug, Clone)]
pub struct ChainEntry {
    pub der: Vec<u8>,
    pub thumbprint: String,
    pub decoded: Result<Certificate, String>,
}

impl ChainEntry {
    pub fn certificate(&self) -> Option<&Certificate> {
        self.decoded.as_ref().ok()
    }

    pub fn decode_error(&self) -> Option<&str> {
        self.decoded.as_ref().err().map(String::as_str)
    }
}

/// Certificate chain in server order (end-entity first)
#[derive(Debug, Clone)]
pub struct CertificateChain {
    entries: Vec<ChainEntry>,
    decodable: bool,
    names_match: bool,
    includes_root: bool,
    sign_hashes: Option<Vec<String>>,
    hash: String,
}

impl CertificateChain {
    /// Build from DER certificates in the order the server sent them
    pub fn new(chain: Vec<Vec<u8>>) -> Self {
        let entries: Vec<ChainEntry> = chain
            .into_iter()
            .map(|der| {
                let decoded = Certificate::decode(&der).map_err(|e| e.to_string());
                ChainEntry {
                    thumbprint: sha1_hex(&der).to_uppercase(),
                    decoded,
                    der,
                }
            })
            .collect();
        let hash = sha1_hex_concat(entries.iter().map(|e| e.der.as_slice()));

        let certs: Option<Vec<&Certificate>> = entries.iter().map(ChainEntry::certificate).collect();
        let (decodable, names_match, includes_root, sign_hashes) = match certs {
            Some(certs) if !certs.is_empty() => {
                let mut hashes = BTreeSet::new();
                let mut names_match = true;
                for (i, c) in certs.iter().enumerate() {
                    if !c.is_self_issued() {
                        hashes.insert(c.sign_hash().to_string());
                    }
                    if i > 0 && c.subject() != certs[i - 1].issuer() {
                        names_match = false;
                    }
                }
                let includes_root = certs.last().is_some_and(|c| c.is_self_issued());
                (true, names_match, includes_root, Some(hashes.into_iter().collect()))
            }
            _ => (false, false, false, None),
        };

        Self {
            entries,
            decodable,
            names_match,
            includes_root,
            sign_hashes,
            hash,
        }
    }

    /// Entries, end-entity first
    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn end_entity(&self) -> Option<&Certificate> {
        self.entries.first().and_then(ChainEntry::certificate)
    }

    /// Non-empty and every certificate decoded
    pub fn is_decodable(&self) -> bool {
        self.decodable
    }

    /// Each certificate's subject is the issuer of the previous one
    pub fn names_match(&self) -> bool {
        self.names_match
    }

    /// Last certificate is self-issued
    pub fn includes_root(&self) -> bool {
        self.includes_root
    }

    /// Sorted signature hash names over non-self-issued certificates;
    /// None unless the chain is decodable
    pub fn sign_hashes(&self) -> Option<&[String]> {
        self.sign_hashes.as_deref()
    }

    /// SHA-1 over the concatenated DER certificates, lowercase hex
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undecodable_chain() {
        let chain = CertificateChain::new(vec![vec![0x30, 0x00], b"junk".to_vec()]);
        assert_eq!(chain.len(), 2);
        assert!(!chain.is_decodable());
        assert!(!chain.names_match());
        assert!(!chain.includes_root());
        assert!(chain.sign_hashes().is_none());
        assert!(chain.entries()[1].decode_error().is_some());
        assert_eq!(chain.entries()[1].thumbprint, sha1_hex(b"junk").to_uppercase());
    }

    #[test]
    fn test_empty_chain_and_hash() {
        let chain = CertificateChain::new(Vec::new());
        assert!(chain.is_empty());
        assert!(!chain.is_decodable());
        assert_eq!(chain.hash(), sha1_hex(b""));
    }

    #[test]
    fn test_hash_follows_server_order() {
        let a = CertificateChain::new(vec![b"one".to_vec(), b"two".to_vec()]);
        let b = CertificateChain::new(vec![b"two".to_vec(), b"one".to_vec()]);
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.hash(), sha1_hex(b"onetwo"));
    }
}
