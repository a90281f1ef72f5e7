// Warnings derived from a finished report

use super::Report;
use crate::ciphers::{CIPHER_DB, CipherStrength};
use crate::protocols::SSLV3;
use std::collections::BTreeMap;

/// Certificate signature hashes considered weak
const WEAK_SIGN_HASHES: [&str; 4] = ["MD2", "MD5", "SHA-1", "UNKNOWN"];

/// Compute the warning list, keyed (and so sorted) by warning id
pub fn analyse(report: &Report) -> BTreeMap<&'static str, &'static str> {
    let mut warnings = BTreeMap::new();

    if let Some(ssl2) = &report.ssl2_suites {
        if ssl2.is_empty() {
            warnings.insert("PV005", "Server claims to support SSL 2.0, but with no cipher suite");
        } else {
            warnings.insert("PV002", "Server supports SSL 2.0.");
        }
    }
    if report.suites.contains_key(&SSLV3) {
        warnings.insert("PV003", "Server supports SSL 3.0.");
    }
    if report.unknown_ske {
        warnings.insert("SK001", "Some Server Key Exchange messages could not be processed.");
    }
    if (1..2048).contains(&report.min_dh_size) {
        warnings.insert("SK002", "Server uses DH parameters smaller than 2048 bits.");
    }
    if (1..192).contains(&report.min_ec_size) {
        warnings.insert("SK003", "Server chooses ECDH parameters smaller than 192 bits.");
    }
    if (1..192).contains(&report.min_ec_size_ext) {
        warnings.insert("SK004", "Server supports ECDH parameters smaller than 192 bits (if requested).");
    }
    if report.needs_short_hello {
        warnings.insert("PV001", "Server needs short ClientHello.");
    }
    if report.no_extensions {
        warnings.insert("PV004", "Server does not tolerate extensions.");
    }
    if report.deflate_compress {
        warnings.insert("CP001", "Server supports compression.");
    }

    let mut clear = false;
    let mut weak = false;
    let mut medium = false;
    let mut unknown = false;
    let mut rc4 = false;
    let mut no_fs = false;
    for id in report.suites.values().flat_map(|scs| scs.suites.iter()) {
        match CIPHER_DB.get(*id) {
            Some(cs) => {
                match cs.strength {
                    CipherStrength::Clear => clear = true,
                    CipherStrength::Weak => weak = true,
                    CipherStrength::Medium => medium = true,
                    CipherStrength::Strong => {}
                }
                rc4 |= cs.is_rc4;
                no_fs |= !cs.has_forward_secrecy();
            }
            None => unknown = true,
        }
    }
    if clear {
        warnings.insert("CS001", "Server supports unencrypted cipher suites.");
    }
    if weak {
        warnings.insert("CS002", "Server supports very weak cipher suites (40 bits).");
    }
    if medium {
        warnings.insert("CS003", "Server supports weak cipher suites (56 bits).");
    }
    if unknown {
        warnings.insert("CS004", "Server supports unrecognized cipher suites (unknown strength).");
    }
    if rc4 {
        warnings.insert("CS005", "Server supports RC4.");
    }
    if no_fs {
        warnings.insert("CS006", "Server supports cipher suites with no forward secrecy.");
    }
    if !report.secure_renegotiation {
        warnings.insert("RN001", "Server does not support secure renegotiation.");
    }

    let weak_sign_hash = report
        .chains()
        .filter_map(|chain| chain.sign_hashes())
        .flatten()
        .any(|h| WEAK_SIGN_HASHES.contains(&h.as_str()));
    if weak_sign_hash {
        warnings.insert(
            "XC001",
            "Server certificate was signed with a weak/deprecated/unknown hash function.",
        );
    }

    warnings
}
