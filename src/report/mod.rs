// Report module - Analysis results, warnings and renderings
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

pub mod analysis;
pub mod json;
pub mod text;

pub use analysis::analyse;
pub use json::{generate_json, write_json_file};
pub use text::{generate_text, write_text_file};

use crate::certificates::CertificateChain;
use crate::data::TlsCurve;
use crate::scanner::SupportedCipherSuites;
use crate::utils::hash::sha1_hex_concat;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeMap;

/// What the server's hello random says about its clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerTime {
    /// Server sends zero in the time field
    #[default]
    NotSent,
    /// Values are all over the place
    Random,
    /// Average offset to the local clock, in milliseconds
    Offset(i64),
}

impl ServerTime {
    /// Average the per-connection offsets; a mean absolute deviation
    /// above this many milliseconds means the field is random
    pub const RANDOM_DEVIATION_MS: i64 = 8_000_000;

    pub fn from_offsets(claims_no_time: bool, offsets: &[i64]) -> Self {
        if claims_no_time {
            return ServerTime::NotSent;
        }
        if offsets.is_empty() {
            return ServerTime::Random;
        }
        let n = offsets.len() as i64;
        let sum: i64 = offsets.iter().sum();
        let avg = (sum + n / 2) / n;
        let dev: i64 = offsets.iter().map(|t| (t - avg).abs()).sum();
        let dev = (dev + n / 2) / n;
        if dev > Self::RANDOM_DEVIATION_MS {
            ServerTime::Random
        } else {
            ServerTime::Offset(avg)
        }
    }

    /// Local time shifted by the offset
    pub fn server_clock(&self) -> Option<DateTime<Utc>> {
        match self {
            ServerTime::Offset(ms) => TimeDelta::try_milliseconds(*ms).and_then(|d| Utc::now().checked_add_signed(d)),
            _ => None,
        }
    }
}

/// Date format used throughout both renderings
pub(crate) fn format_date(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Everything learned about one server
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub connection_name: String,
    pub connection_port: u16,
    pub sni: Option<String>,
    /// SSLv2 suites, when the server answered an SSLv2 hello
    pub ssl2_suites: Option<Vec<u32>>,
    pub ssl2_chain: Option<CertificateChain>,
    /// Supported suites per SSLv3+ version
    pub suites: BTreeMap<u16, SupportedCipherSuites>,
    pub supports_v2_hello: bool,
    pub needs_short_hello: bool,
    pub no_extensions: bool,
    pub deflate_compress: bool,
    pub server_time: ServerTime,
    pub secure_renegotiation: bool,
    pub encrypt_then_mac: bool,
    /// Smallest DH modulus seen, 0 if none
    pub min_dh_size: u32,
    /// Smallest EC size without the curves extension, 0 if none
    pub min_ec_size: u32,
    /// Smallest EC size with the curves extension, 0 if none
    pub min_ec_size_ext: u32,
    pub kx_reuse_dh: bool,
    pub kx_reuse_ecdh: bool,
    /// Named curves the server used, by id
    pub named_curves: Vec<TlsCurve>,
    /// ECDHE suites usable without the curves extension
    pub spontaneous_ec: Vec<u16>,
    /// Curves the server picked on its own
    pub spontaneous_named_curves: Vec<TlsCurve>,
    pub curve_explicit_prime: u32,
    pub curve_explicit_char2: u32,
    pub unknown_ske: bool,
    /// Include PEM certificates in the renderings
    pub show_pem: bool,
    chains: BTreeMap<String, CertificateChain>,
}

impl Report {
    pub fn new(connection_name: impl Into<String>, connection_port: u16) -> Self {
        Self {
            connection_name: connection_name.into(),
            connection_port,
            ..Default::default()
        }
    }

    pub fn set_cipher_suites(&mut self, version: u16, suites: SupportedCipherSuites) {
        self.suites.insert(version, suites);
    }

    /// Record a chain sent by the server; identical chains are kept once.
    /// Returns true if the chain was new.
    pub fn add_server_chain(&mut self, chain: &[Vec<u8>]) -> bool {
        let hash = sha1_hex_concat(chain.iter().map(Vec::as_slice));
        if self.chains.contains_key(&hash) {
            return false;
        }
        self.chains.insert(hash, CertificateChain::new(chain.to_vec()));
        true
    }

    /// Distinct SSLv3+ chains, ordered by chain hash
    pub fn chains(&self) -> impl Iterator<Item = &CertificateChain> {
        self.chains.values()
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    pub fn is_spontaneous(&self, curve: &TlsCurve) -> bool {
        self.spontaneous_named_curves.iter().any(|c| c.id == curve.id)
    }

    /// Warnings by id
    pub fn warnings(&self) -> BTreeMap<&'static str, &'static str> {
        analyse(self)
    }
}
