// Protocols module - SSL/TLS wire constants and handshake codecs
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

pub mod handshake;
pub mod hlist;
pub mod parser;
pub mod record;
pub mod server_hello;
pub mod ssl2;

pub use handshake::ClientHelloBuilder;
pub use record::RecordLayer;
pub use server_hello::HandshakeTestResult;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Internal code for SSLv2 (the v2 hello itself carries 0x0002)
pub const SSLV2: u16 = 0x0200;
pub const SSLV3: u16 = 0x0300;
pub const TLS10: u16 = 0x0301;
pub const TLS11: u16 = 0x0302;
pub const TLS12: u16 = 0x0303;

// Record content types
pub const CHANGE_CIPHER_SPEC: u8 = 20;
pub const ALERT: u8 = 21;
pub const HANDSHAKE: u8 = 22;
pub const APPLICATION: u8 = 23;

// Handshake message types
pub const HELLO_REQUEST: u8 = 0;
pub const CLIENT_HELLO: u8 = 1;
pub const SERVER_HELLO: u8 = 2;
pub const CERTIFICATE: u8 = 11;
pub const SERVER_KEY_EXCHANGE: u8 = 12;
pub const CERTIFICATE_REQUEST: u8 = 13;
pub const SERVER_HELLO_DONE: u8 = 14;

// Signaling cipher suite values
pub const EMPTY_RENEGOTIATION_INFO_SCSV: u16 = 0x00FF;
pub const FALLBACK_SCSV: u16 = 0x5600;

// Extension types
pub const EXT_SERVER_NAME: u16 = 0x0000;
pub const EXT_SUPPORTED_CURVES: u16 = 0x000A;
pub const EXT_EC_POINT_FORMATS: u16 = 0x000B;
pub const EXT_SIGNATURE_ALGORITHMS: u16 = 0x000D;
pub const EXT_ENCRYPT_THEN_MAC: u16 = 0x0016;
pub const EXT_RENEGOTIATION_INFO: u16 = 0xFF01;

// Pseudo curve ids for explicit curve parameters (RFC 4492)
pub const EXPLICIT_PRIME: u16 = 0xFF01;
pub const EXPLICIT_CHAR2: u16 = 0xFF02;

/// Maximum plaintext record payload
pub const MAX_RECORD_LEN: usize = 16384;

/// Display name of a protocol version code
pub fn version_name(version: u16) -> String {
    match version {
        SSLV2 => "SSLv2".to_string(),
        SSLV3 => "SSLv3".to_string(),
        v if v >> 8 == 3 => format!("TLSv1.{}", (v & 0xFF) - 1),
        v => format!("UNKNOWN_VERSION:0x{:04X}", v),
    }
}

/// Protocol versions the prober can negotiate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum Protocol {
    SSLv2,
    SSLv3,
    TLS10,
    TLS11,
    TLS12,
}

impl Protocol {
    /// Version code as used by the record layer
    pub fn version(&self) -> u16 {
        match self {
            Protocol::SSLv2 => SSLV2,
            Protocol::SSLv3 => SSLV3,
            Protocol::TLS10 => TLS10,
            Protocol::TLS11 => TLS11,
            Protocol::TLS12 => TLS12,
        }
    }

    pub fn from_version(version: u16) -> Option<Self> {
        match version {
            SSLV2 => Some(Protocol::SSLv2),
            SSLV3 => Some(Protocol::SSLv3),
            TLS10 => Some(Protocol::TLS10),
            TLS11 => Some(Protocol::TLS11),
            TLS12 => Some(Protocol::TLS12),
            _ => None,
        }
    }

    pub fn all() -> Vec<Protocol> {
        vec![
            Protocol::SSLv2,
            Protocol::SSLv3,
            Protocol::TLS10,
            Protocol::TLS11,
            Protocol::TLS12,
        ]
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&version_name(self.version()))
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '.' | '_' | '-'))
            .collect::<String>()
            .to_ascii_lowercase();
        match norm.as_str() {
            "ssl2" | "sslv2" | "ssl20" => Ok(Protocol::SSLv2),
            "ssl3" | "sslv3" | "ssl30" => Ok(Protocol::SSLv3),
            "tls1" | "tlsv1" | "tls10" | "tlsv10" => Ok(Protocol::TLS10),
            "tls11" | "tlsv11" => Ok(Protocol::TLS11),
            "tls12" | "tlsv12" => Ok(Protocol::TLS12),
            _ => Err(format!("Unknown protocol: {}", s)),
        }
    }
}
