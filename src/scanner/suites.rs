// Cipher suites supported for one protocol version

use crate::ciphers::CIPHER_DB;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the server picks a suite among those the client offers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuiteSelection {
    /// First suite in the client list wins
    Client,
    /// Server order wins whatever the client sends
    Server,
    /// Neither, or not measurable
    Complex,
}

impl SuiteSelection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuiteSelection::Client => "client",
            SuiteSelection::Server => "server",
            SuiteSelection::Complex => "complex",
        }
    }

    /// Wording used in the text report
    pub fn description(&self) -> &'static str {
        match self {
            SuiteSelection::Client => "uses client preferences",
            SuiteSelection::Server => "enforce server preferences",
            SuiteSelection::Complex => "complex",
        }
    }
}

impl fmt::Display for SuiteSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Suites accepted by the server for a version. With server selection the
/// list is in server preference order, otherwise numerically sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedCipherSuites {
    pub suites: Vec<u16>,
    pub selection: SuiteSelection,
    /// Same DHE parameters seen on more than one connection
    pub kx_reuse_dh: bool,
    /// Same ECDHE parameters seen on more than one connection
    pub kx_reuse_ecdh: bool,
}

impl SupportedCipherSuites {
    pub fn new(suites: Vec<u16>) -> Self {
        Self {
            suites,
            selection: SuiteSelection::Complex,
            kx_reuse_dh: false,
            kx_reuse_ecdh: false,
        }
    }

    /// Registered ECDHE suites, in list order
    pub fn known_ec_suites(&self) -> Vec<u16> {
        self.suites
            .iter()
            .copied()
            .filter(|&s| CIPHER_DB.get(s).is_some_and(|cs| cs.is_ecdhe))
            .collect()
    }

    /// All suites reordered as registered non-ECDHE first, then registered
    /// ECDHE, then unregistered ones, so that a truncated list keeps the
    /// suites usable without the curves extension
    pub fn known_suites_low_ec(&self) -> Vec<u16> {
        let mut out = Vec::with_capacity(self.suites.len());
        out.extend(
            self.suites
                .iter()
                .filter(|&&s| CIPHER_DB.get(s).is_some_and(|cs| !cs.is_ecdhe)),
        );
        out.extend(
            self.suites
                .iter()
                .filter(|&&s| CIPHER_DB.get(s).is_some_and(|cs| cs.is_ecdhe)),
        );
        out.extend(self.suites.iter().filter(|&&s| !CIPHER_DB.contains(s)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ec_partitions() {
        // ECDHE_RSA_WITH_AES_128_CBC_SHA, unknown id, RSA_WITH_AES_128_CBC_SHA
        let scs = SupportedCipherSuites::new(vec![0xC013, 0xFEFE, 0x002F]);
        assert_eq!(scs.known_ec_suites(), vec![0xC013]);
        assert_eq!(scs.known_suites_low_ec(), vec![0x002F, 0xC013, 0xFEFE]);
        assert_eq!(scs.selection, SuiteSelection::Complex);
    }

    #[test]
    fn test_equality_covers_selection() {
        let a = SupportedCipherSuites::new(vec![0x002F]);
        let mut b = a.clone();
        assert_eq!(a, b);
        b.selection = SuiteSelection::Server;
        assert_ne!(a, b);
    }

    #[test]
    fn test_selection_strings() {
        assert_eq!(SuiteSelection::Server.to_string(), "server");
        assert_eq!(SuiteSelection::Client.description(), "uses client preferences");
        assert_eq!(serde_json::to_string(&SuiteSelection::Complex).unwrap(), "\"complex\"");
    }
}
