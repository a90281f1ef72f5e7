// Ciphers module - Cipher suite definitions and registry
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

pub mod registry;

pub use registry::{CIPHER_DB, CipherDatabase};

use std::fmt;

/// Encryption strength class of a cipher suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CipherStrength {
    Clear,
    Weak,
    Medium,
    Strong,
}

impl CipherStrength {
    pub fn from_digit(d: u8) -> Option<Self> {
        match d {
            0 => Some(CipherStrength::Clear),
            1 => Some(CipherStrength::Weak),
            2 => Some(CipherStrength::Medium),
            3 => Some(CipherStrength::Strong),
            _ => None,
        }
    }

    /// Column value used in the text report
    pub fn digit(&self) -> u8 {
        match self {
            CipherStrength::Clear => 0,
            CipherStrength::Weak => 1,
            CipherStrength::Medium => 2,
            CipherStrength::Strong => 3,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CipherStrength::Clear => "no encryption",
            CipherStrength::Weak => "weak encryption (40-bit)",
            CipherStrength::Medium => "medium encryption (56-bit)",
            CipherStrength::Strong => "strong encryption (96-bit or more)",
        }
    }
}

impl fmt::Display for CipherStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Type of the key the server must own for a suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerKeyType {
    Rsa,
    Dsa,
    Dh,
    Ec,
    None,
}

impl ServerKeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerKeyType::Rsa => "RSA",
            ServerKeyType::Dsa => "DSA",
            ServerKeyType::Dh => "DH",
            ServerKeyType::Ec => "EC",
            ServerKeyType::None => "none",
        }
    }
}

impl fmt::Display for ServerKeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registered SSLv3/TLS cipher suite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherSuite {
    pub id: u16,
    pub name: String,
    pub strength: CipherStrength,
    pub is_cbc: bool,
    pub is_rc4: bool,
    pub is_dhe: bool,
    pub is_ecdhe: bool,
    pub is_rsa_export: bool,
    pub is_srp: bool,
    pub is_psk: bool,
    pub server_key_type: ServerKeyType,
}

impl CipherSuite {
    pub fn has_forward_secrecy(&self) -> bool {
        self.is_dhe || self.is_ecdhe || self.is_srp
    }

    /// No server authentication at all (DH_anon, ECDH_anon)
    pub fn is_anonymous(&self) -> bool {
        !(self.is_srp || self.is_psk) && self.server_key_type == ServerKeyType::None
    }
}

/// Name of a suite id, synthetic for unregistered ids
pub fn suite_name(id: u16) -> String {
    match CIPHER_DB.get(id) {
        Some(cs) => cs.name.clone(),
        None => format!("UNKNOWN_SUITE:0x{:04X}", id),
    }
}

pub const SSL_CK_RC4_128_WITH_MD5: u32 = 0x010080;
pub const SSL_CK_RC4_128_EXPORT40_WITH_MD5: u32 = 0x020080;
pub const SSL_CK_RC2_128_CBC_WITH_MD5: u32 = 0x030080;
pub const SSL_CK_RC2_128_CBC_EXPORT40_WITH_MD5: u32 = 0x040080;
pub const SSL_CK_IDEA_128_CBC_WITH_MD5: u32 = 0x050080;
pub const SSL_CK_DES_64_CBC_WITH_MD5: u32 = 0x060040;
pub const SSL_CK_DES_192_EDE3_CBC_WITH_MD5: u32 = 0x0700C0;

/// All SSLv2 suites, in numerical order
pub const SSL2_SUITES: [u32; 7] = [
    SSL_CK_RC4_128_WITH_MD5,
    SSL_CK_RC4_128_EXPORT40_WITH_MD5,
    SSL_CK_RC2_128_CBC_WITH_MD5,
    SSL_CK_RC2_128_CBC_EXPORT40_WITH_MD5,
    SSL_CK_IDEA_128_CBC_WITH_MD5,
    SSL_CK_DES_64_CBC_WITH_MD5,
    SSL_CK_DES_192_EDE3_CBC_WITH_MD5,
];

/// Name of a 24-bit SSLv2 suite
pub fn ssl2_suite_name(id: u32) -> String {
    let name = match id {
        SSL_CK_RC4_128_WITH_MD5 => "RC4_128_WITH_MD5",
        SSL_CK_RC4_128_EXPORT40_WITH_MD5 => "RC4_128_EXPORT40_WITH_MD5",
        SSL_CK_RC2_128_CBC_WITH_MD5 => "RC2_128_CBC_WITH_MD5",
        SSL_CK_RC2_128_CBC_EXPORT40_WITH_MD5 => "RC2_128_CBC_EXPORT40_WITH_MD5",
        SSL_CK_IDEA_128_CBC_WITH_MD5 => "IDEA_128_CBC_WITH_MD5",
        SSL_CK_DES_64_CBC_WITH_MD5 => "DES_64_CBC_WITH_MD5",
        SSL_CK_DES_192_EDE3_CBC_WITH_MD5 => "DES_192_EDE3_CBC_WITH_MD5",
        _ => return format!("UNKNOWN_SUITE:0x{:06X}", id),
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        let dhe = CIPHER_DB.get(0x0033).unwrap();
        assert!(dhe.has_forward_secrecy());
        assert!(!dhe.is_anonymous());

        let anon = CIPHER_DB.get(0x0034).unwrap();
        assert!(anon.is_anonymous());

        let psk = CIPHER_DB.get(0x008C).unwrap();
        assert!(psk.is_psk);
        assert!(!psk.is_anonymous());
        assert!(!psk.has_forward_secrecy());
    }

    #[test]
    fn test_names() {
        assert_eq!(suite_name(0x002F), "RSA_WITH_AES_128_CBC_SHA");
        assert_eq!(suite_name(0xFEFE), "UNKNOWN_SUITE:0xFEFE");
        assert_eq!(ssl2_suite_name(0x0700C0), "DES_192_EDE3_CBC_WITH_MD5");
        assert_eq!(ssl2_suite_name(0x080080), "UNKNOWN_SUITE:0x080080");
    }

    #[test]
    fn test_strength_strings() {
        assert_eq!(CipherStrength::Weak.to_string(), "weak encryption (40-bit)");
        assert!(CipherStrength::Clear < CipherStrength::Strong);
        assert_eq!(CipherStrength::from_digit(4), None);
    }
}
