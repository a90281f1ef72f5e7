// Cipher suite registry - Parses cipher-suites.txt

use super::{CipherStrength, CipherSuite, ServerKeyType};
use anyhow::{Context, Result};
use lazy_static::lazy_static;
use std::collections::BTreeMap;
use std::sync::Arc;

lazy_static! {
    /// Global cipher suite registry, checked for consistency when built
    pub static ref CIPHER_DB: Arc<CipherDatabase> = Arc::new(
        CipherDatabase::load().expect("Failed to load cipher suite registry")
    );
}

/// All known SSLv3/TLS suites, ordered by id
#[derive(Debug)]
pub struct CipherDatabase {
    by_id: BTreeMap<u16, CipherSuite>,
}

impl CipherDatabase {
    /// Load registry from embedded data
    pub fn load() -> Result<Self> {
        Self::parse(include_str!("../../data/cipher-suites.txt"))
    }

    /// Parse cipher-suites.txt format
    /// Format: ID STRENGTH ENC KX KEY NAME
    pub fn parse(data: &str) -> Result<Self> {
        let mut by_id = BTreeMap::new();
        for (line_num, line) in data.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let cs = Self::parse_line(line)
                .with_context(|| format!("cipher-suites.txt line {}", line_num + 1))?;
            check_name_convention(&cs)?;
            if by_id.contains_key(&cs.id) {
                anyhow::bail!("Duplicate suite: 0x{:04X}", cs.id);
            }
            by_id.insert(cs.id, cs);
        }
        Ok(Self { by_id })
    }

    fn parse_line(line: &str) -> Result<CipherSuite> {
        let ww: Vec<&str> = line.split_whitespace().collect();
        if ww.len() != 6 {
            anyhow::bail!("Bad cipher suite descriptor: {}", line);
        }
        let id = u16::from_str_radix(ww[0], 16).context("Bad suite identifier")?;

        let strength = ww[1]
            .parse::<u8>()
            .ok()
            .and_then(CipherStrength::from_digit)
            .with_context(|| format!("Bad encryption strength: {}", ww[1]))?;

        let (is_cbc, is_rc4) = match ww[2] {
            "c" => (true, false),
            "r" => (false, true),
            "-" => (false, false),
            other => anyhow::bail!("Bad encryption flags: {}", other),
        };

        let mut is_dhe = false;
        let mut is_ecdhe = false;
        let mut is_srp = false;
        let mut is_rsa_export = false;
        match ww[3] {
            "d" => is_dhe = true,
            "e" => is_ecdhe = true,
            "s" => is_srp = true,
            "x" => is_rsa_export = true,
            "-" => {}
            other => anyhow::bail!("Bad key exchange flags: {}", other),
        }

        let (server_key_type, is_psk) = match ww[4] {
            "r" => (ServerKeyType::Rsa, false),
            "d" => (ServerKeyType::Dsa, false),
            "h" => (ServerKeyType::Dh, false),
            "e" => (ServerKeyType::Ec, false),
            "p" => (ServerKeyType::None, true),
            "q" => (ServerKeyType::Rsa, true),
            "n" => (ServerKeyType::None, false),
            other => anyhow::bail!("Bad server key type: {}", other),
        };

        Ok(CipherSuite {
            id,
            name: ww[5].to_string(),
            strength,
            is_cbc,
            is_rc4,
            is_dhe,
            is_ecdhe,
            is_rsa_export,
            is_srp,
            is_psk,
            server_key_type,
        })
    }

    pub fn get(&self, id: u16) -> Option<&CipherSuite> {
        self.by_id.get(&id)
    }

    pub fn contains(&self, id: u16) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Registered ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.by_id.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Recompute the flags from the suite name and compare with the table
fn check_name_convention(cs: &CipherSuite) -> Result<()> {
    let name = cs.name.as_str();
    let strength = if name.contains("_NULL_") {
        CipherStrength::Clear
    } else if name.contains("DES40") || name.contains("_40_") {
        CipherStrength::Weak
    } else if name.contains("_DES_") {
        CipherStrength::Medium
    } else {
        CipherStrength::Strong
    };

    let mut expected = CipherSuite {
        id: cs.id,
        name: cs.name.clone(),
        strength,
        is_cbc: name.contains("_CBC_"),
        is_rc4: name.contains("RC4"),
        is_dhe: false,
        is_ecdhe: false,
        is_rsa_export: false,
        is_srp: false,
        is_psk: false,
        server_key_type: ServerKeyType::None,
    };
    let e = &mut expected;
    if name.starts_with("RSA_PSK") {
        e.is_psk = true;
        e.server_key_type = ServerKeyType::Rsa;
    } else if name.starts_with("RSA_EXPORT") {
        e.is_rsa_export = true;
        e.server_key_type = ServerKeyType::Rsa;
    } else if name.starts_with("RSA_") {
        e.server_key_type = ServerKeyType::Rsa;
    } else if name.starts_with("DHE_PSK") {
        e.is_dhe = true;
        e.is_psk = true;
    } else if name.starts_with("DHE_DSS") {
        e.is_dhe = true;
        e.server_key_type = ServerKeyType::Dsa;
    } else if name.starts_with("DHE_RSA") {
        e.is_dhe = true;
        e.server_key_type = ServerKeyType::Rsa;
    } else if name.starts_with("DH_anon") {
        e.is_dhe = true;
    } else if name.starts_with("DH_") {
        e.server_key_type = ServerKeyType::Dh;
    } else if name.starts_with("ECDHE_PSK") {
        e.is_ecdhe = true;
        e.is_psk = true;
    } else if name.starts_with("ECDHE_ECDSA") {
        e.is_ecdhe = true;
        e.server_key_type = ServerKeyType::Ec;
    } else if name.starts_with("ECDHE_RSA") {
        e.is_ecdhe = true;
        e.server_key_type = ServerKeyType::Rsa;
    } else if name.starts_with("ECDH_anon") {
        e.is_ecdhe = true;
    } else if name.starts_with("ECDH_") {
        e.server_key_type = ServerKeyType::Ec;
    } else if name.starts_with("PSK_DHE") {
        e.is_dhe = true;
        e.is_psk = true;
    } else if name.starts_with("PSK_") || name.starts_with("KRB5_") {
        e.is_psk = true;
    } else if name.starts_with("SRP_") {
        e.is_srp = true;
    } else {
        anyhow::bail!("Weird name: {}", name);
    }

    if expected != *cs {
        tracing::error!("table: {:?}", cs);
        tracing::error!("name:  {:?}", expected);
        anyhow::bail!("Wrong classification: {}", name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_table_is_consistent() {
        let db = CipherDatabase::load().unwrap();
        assert!(db.len() > 300);
        assert!(!db.contains(0x0000));
        assert!(!db.contains(0x00FF));
        let cs = db.get(0xC02F).unwrap();
        assert_eq!(cs.name, "ECDHE_RSA_WITH_AES_128_GCM_SHA256");
        assert!(cs.is_ecdhe);
        assert_eq!(cs.server_key_type, ServerKeyType::Rsa);
    }

    #[test]
    fn test_misclassified_line_is_rejected() {
        // DHE suite without the DHE flag
        let err = CipherDatabase::parse("0033 3 c - r DHE_RSA_WITH_AES_128_CBC_SHA\n").unwrap_err();
        assert!(format!("{:#}", err).contains("Wrong classification"));
        // wrong strength
        assert!(CipherDatabase::parse("0009 3 c - r RSA_WITH_DES_CBC_SHA\n").is_err());
    }

    #[test]
    fn test_malformed_lines() {
        assert!(CipherDatabase::parse("0001 0 - - r\n").is_err());
        assert!(CipherDatabase::parse("0001 5 - - r RSA_WITH_NULL_MD5\n").is_err());
        assert!(CipherDatabase::parse("0001 0 - - z RSA_WITH_NULL_MD5\n").is_err());
        assert!(CipherDatabase::parse("FFFF 3 - - r TLS_FOO\n").is_err());
        let dup = "0001 0 - - r RSA_WITH_NULL_MD5\n0001 0 - - r RSA_WITH_NULL_MD5\n";
        assert!(CipherDatabase::parse(dup).is_err());
    }
}
