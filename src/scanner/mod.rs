// Scanner module - Adaptive probing engine
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// One analysis run is a sequence of short-lived connections, each carrying
// a single ClientHello. The first phase finds a hello shape the server
// tolerates (record size, version, extensions); later phases enumerate
// suites per version, preference order, V2 hello support and curves.

pub mod config;
pub mod preference;
pub mod suites;

pub use config::{ProbeConfig, SniMode};
pub use suites::{SuiteSelection, SupportedCipherSuites};

use crate::Result;
use crate::certificates::CertificateChain;
use crate::ciphers::CIPHER_DB;
use crate::data::{TLS_CURVES, TlsCurve};
use crate::error::ProbeError;
use crate::protocols::ssl2::Ssl2Result;
use crate::protocols::{
    ClientHelloBuilder, EMPTY_RENEGOTIATION_INFO_SCSV, EXPLICIT_CHAR2, EXPLICIT_PRIME, FALLBACK_SCSV,
    HandshakeTestResult, RecordLayer, SSLV2, SSLV3, version_name,
};
use crate::report::{Report, ServerTime};
use crate::utils::debug::{DebugLog, DebugStream, open_log, write_separator};
use crate::utils::network::{BoxedStream, Target, open_connection};
use anyhow::Context;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Record sizes tried in turn while looking for a tolerated hello
const RECORD_LENGTHS: [usize; 3] = [8192, 1024, 256];

/// Key exchange parameter fingerprint: times seen, and the suite that
/// carried it last
type KxHashes = BTreeMap<String, (u32, u16)>;

/// Drives one analysis run and accumulates its findings
pub struct Prober {
    config: ProbeConfig,
    target: Target,
    debug_log: Option<DebugLog>,
    /// Suites to probe for in every version
    candidates: Vec<u16>,
    hello: ClientHelloBuilder,
    report: Report,

    max_record_len: usize,
    with_extensions: bool,
    got_ssl_answer: bool,
    got_read_timeout: bool,
    last_alert: Option<u8>,

    server_compress: bool,
    claims_no_time: bool,
    time_offsets: Vec<i64>,
    min_dh_size: u32,
    min_ec_size: u32,
    min_ec_size_ext: u32,
    named_curves: BTreeMap<u16, TlsCurve>,
    curve_explicit_prime: u32,
    curve_explicit_char2: u32,
    unknown_ske: bool,
    secure_renegotiation: bool,
    encrypt_then_mac: bool,
}

impl Prober {
    pub fn new(config: ProbeConfig) -> Result<Self> {
        config.validate()?;
        let debug_log = match &config.debug_log {
            Some(path) => {
                Some(open_log(path).with_context(|| format!("Could not open log file {}", path.display()))?)
            }
            None => None,
        };

        let candidates = if config.all_suites {
            (1..=0xFFFF)
                .filter(|&s| s != EMPTY_RENEGOTIATION_INFO_SCSV && s != FALLBACK_SCSV)
                .collect()
        } else {
            CIPHER_DB.ids().filter(|&s| s != 0).collect()
        };

        let mut hello = ClientHelloBuilder::new();
        hello.set_server_name(config.server_name())?;
        hello.set_max_version(config.max_version.version());
        if config.add_ec_ext {
            hello.set_supported_curves(Some(TLS_CURVES.ids().collect()));
        }

        let mut report = Report::new(config.host.clone(), config.port);
        report.sni = config.server_name();

        Ok(Self {
            target: config.target(),
            config,
            debug_log,
            candidates,
            hello,
            report,
            max_record_len: RECORD_LENGTHS[0],
            with_extensions: true,
            got_ssl_answer: false,
            got_read_timeout: false,
            last_alert: None,
            server_compress: false,
            claims_no_time: false,
            time_offsets: Vec::new(),
            min_dh_size: 0,
            min_ec_size: 0,
            min_ec_size_ext: 0,
            named_curves: BTreeMap::new(),
            curve_explicit_prime: 0,
            curve_explicit_char2: 0,
            unknown_ske: false,
            secure_renegotiation: false,
            encrypt_then_mac: false,
        })
    }

    /// Run every phase and return the filled report. Transport failures
    /// and a server that never completes a handshake abort the run.
    pub async fn run(mut self) -> Result<Report> {
        info!("Analyzing {}", self.target);

        let has_ssl2 = self.probe_ssl2().await?;
        if self.config.max_version.version() < SSLV3 {
            if !has_ssl2 {
                anyhow::bail!("No SSLv2 support, not testing higher versions");
            }
            return Ok(self.finish(Vec::new(), Vec::new()));
        }

        self.find_tolerated_hello().await?;
        let ec = self.enumerate_versions().await?;

        let (spontaneous_ec, spontaneous_curves) = match &ec {
            Some((version, suites)) if self.config.add_ec_ext && self.with_extensions => {
                self.probe_spontaneous_ec(*version, suites).await?
            }
            Some((_, suites)) => (suites.clone(), self.named_curves.values().cloned().collect()),
            None => (Vec::new(), self.named_curves.values().cloned().collect()),
        };
        if let Some((version, suites)) = &ec {
            if self.with_extensions {
                self.enumerate_curves(*version, suites).await?;
            }
        }

        Ok(self.finish(spontaneous_ec, spontaneous_curves))
    }

    fn wrap(&self, stream: BoxedStream) -> BoxedStream {
        match &self.debug_log {
            Some(log) => {
                write_separator(log);
                Box::new(DebugStream::new(stream, log.clone()))
            }
            None => stream,
        }
    }

    /// SSLv2 hello offering all SSLv2 suites. Returns whether the server
    /// answered with at least one suite.
    async fn probe_ssl2(&mut self) -> Result<bool> {
        if self.config.min_version.version() > SSLV2 {
            return Ok(false);
        }
        info!("Testing SSLv2");
        let stream = open_connection(&self.target, self.config.proxy.as_ref(), self.config.connection_wait).await?;
        let mut stream = self.wrap(stream);
        match Ssl2Result::test_server(&mut stream, self.config.read_timeout).await {
            Ok(r) => {
                debug!("SSLv2 server hello: {} suite(s)", r.cipher_suites.len());
                let has_ssl2 = !r.cipher_suites.is_empty();
                self.report.ssl2_chain = Some(CertificateChain::new(vec![r.certificate]));
                self.report.ssl2_suites = Some(r.cipher_suites);
                Ok(has_ssl2)
            }
            Err(e) => {
                debug!("No SSLv2 answer: {}", e);
                Ok(false)
            }
        }
    }

    /// Shrink the record, then the version, then drop extensions until
    /// some hello gets a handshake through
    async fn find_tolerated_hello(&mut self) -> Result<()> {
        let config_max = self.config.max_version.version();
        'shapes: loop {
            for len in RECORD_LENGTHS {
                self.max_record_len = len;
                if self.try_connect().await? || self.got_read_timeout {
                    break 'shapes;
                }
            }
            let v = self.hello.max_version();
            if v > SSLV3 {
                self.hello.set_max_version(v - 1);
                continue;
            }
            if self.with_extensions {
                info!("Retrying without extensions");
                self.with_extensions = false;
                self.hello.disable_extensions();
                self.hello.set_max_version(config_max);
                continue;
            }

            if self.got_ssl_answer {
                if let Some(code) = self.last_alert {
                    return Err(ProbeError::Alert(code).into());
                }
            }
            let mut msg = "Could not initiate a handshake (not SSL/TLS?)".to_string();
            if self.got_read_timeout {
                msg.push_str(" [read timeout]");
            }
            anyhow::bail!(msg);
        }

        if self.max_record_len < RECORD_LENGTHS[0] {
            self.report.needs_short_hello = true;
        }
        if !self.with_extensions {
            self.report.no_extensions = true;
        }
        Ok(())
    }

    /// Suites per hello at the current record size, at least one
    fn suites_per_hello(&self) -> Result<usize> {
        Ok(self.hello.compute_max_suite_count(self.max_record_len)?.unwrap_or(1).max(1))
    }

    /// Send the candidates in hello-sized chunks until one gets accepted
    async fn try_connect(&mut self) -> Result<bool> {
        let num = self.suites_per_hello()?;
        debug!(
            "trying version={}, extensions={}, maxLen={} ({} suites per hello)",
            version_name(self.hello.max_version()),
            self.with_extensions,
            self.max_record_len,
            num
        );
        let candidates = self.candidates.clone();
        for chunk in candidates.chunks(num) {
            self.hello.set_cipher_suites(chunk.to_vec())?;
            if self.do_connect().await?.is_some() {
                return Ok(true);
            }
            if self.got_read_timeout {
                return Ok(false);
            }
        }
        Ok(false)
    }

    /// For each version from the lowest allowed up to the tolerated one,
    /// enumerate suites and check V2 hello acceptance. Returns the highest
    /// version with ECDHE suites, and those suites.
    async fn enumerate_versions(&mut self) -> Result<Option<(u16, Vec<u16>)>> {
        let max = self.hello.max_version();
        let start = self.config.min_version.version().max(SSLV3);
        let mut ec = None;
        for v in start..=max {
            self.hello.set_max_version(v);
            let Some(scs) = self.get_supported_cipher_suites().await? else {
                continue;
            };
            info!("{}: {} suite(s), {} selection", version_name(v), scs.suites.len(), scs.selection);

            let ec_suites = scs.known_ec_suites();
            if !ec_suites.is_empty() {
                ec = Some((v, ec_suites));
            }
            self.report.kx_reuse_dh |= scs.kx_reuse_dh;
            self.report.kx_reuse_ecdh |= scs.kx_reuse_ecdh;
            let low_ec = scs.known_suites_low_ec();
            self.report.set_cipher_suites(v, scs);

            // V2 format hello, capped at 127 bytes, so no extensions
            let saved = self.hello.record_version();
            self.hello.set_record_version(SSLV2);
            self.hello.set_cipher_suites(low_ec)?;
            if self.do_connect().await?.is_some() {
                self.report.supports_v2_hello = true;
            }
            self.hello.set_record_version(saved);
        }
        Ok(ec)
    }

    /// Which suites are accepted, in which order, and whether key exchange
    /// parameters get reused
    async fn get_supported_cipher_suites(&mut self) -> Result<Option<SupportedCipherSuites>> {
        let num = self.suites_per_hello()?;
        debug!("suites: version={} ({} suites per hello)", version_name(self.hello.max_version()), num);

        let mut kx = KxHashes::new();
        let mut supported = BTreeSet::new();
        let candidates = self.candidates.clone();
        for chunk in candidates.chunks(num) {
            supported.extend(self.supported_among(chunk, Some(&mut kx)).await?);
        }
        if supported.is_empty() {
            return Ok(None);
        }
        let supported: Vec<u16> = supported.into_iter().collect();
        let mut scs = SupportedCipherSuites::new(supported.clone());

        // Order can only be measured when all suites fit in one hello
        if supported.len() <= num {
            let first = self.supported_among(&supported, Some(&mut kx)).await?;
            let offered = preference::reversed_prefix(&supported, first.len());
            let second = self.supported_among(&offered, Some(&mut kx)).await?;
            scs.selection = preference::classify(&first, &offered, &second);
            if scs.selection == SuiteSelection::Server {
                scs.suites = first;
            }
        }

        for &(count, suite) in kx.values() {
            if count == 1 {
                continue;
            }
            if let Some(cs) = CIPHER_DB.get(suite) {
                if cs.is_dhe {
                    scs.kx_reuse_dh = true;
                } else if cs.is_ecdhe {
                    scs.kx_reuse_ecdh = true;
                }
            }
        }
        Ok(Some(scs))
    }

    /// Offer `suites`, remove whatever the server picks, and repeat. The
    /// result is in selection order; a picked suite that was not offered
    /// ends the list.
    async fn supported_among(&mut self, suites: &[u16], mut kx: Option<&mut KxHashes>) -> Result<Vec<u16>> {
        let mut remaining: BTreeSet<u16> = suites.iter().copied().collect();
        let mut picked = Vec::new();
        loop {
            let offer: Vec<u16> = suites.iter().copied().filter(|s| remaining.contains(s)).collect();
            self.hello.set_cipher_suites(offer)?;
            let Some(tr) = self.do_connect().await? else {
                break;
            };
            if tr.version != self.hello.max_version() {
                break;
            }
            let u = tr.selected_cipher_suite;
            if !tr.failed_after_hello {
                picked.push(u);
            }
            if !tr.cipher_suite_in_client_list {
                warn!("Server selected suite 0x{:04X} which was not offered", u);
                break;
            }
            if let (Some(hash), Some(kx)) = (&tr.kx_hash, kx.as_deref_mut()) {
                let entry = kx.entry(hash.clone()).or_insert((0, u));
                entry.0 += 1;
                entry.1 = u;
            }
            remaining.remove(&u);
            if remaining.is_empty() {
                break;
            }
        }
        Ok(picked)
    }

    /// Drop the curves extension and see which ECDHE suites and curves
    /// the server still uses
    async fn probe_spontaneous_ec(&mut self, version: u16, ec_suites: &[u16]) -> Result<(Vec<u16>, Vec<TlsCurve>)> {
        info!("spontaneous EC support, version={}, {} suite(s)", version_name(version), ec_suites.len());
        let previous = std::mem::take(&mut self.named_curves);
        self.hello.set_max_version(version);
        self.hello.set_supported_curves(None);
        let suites = self.supported_among(ec_suites, None).await?;
        let spontaneous: Vec<TlsCurve> = self.named_curves.values().cloned().collect();
        let mut merged = previous;
        merged.append(&mut self.named_curves);
        self.named_curves = merged;
        Ok((suites, spontaneous))
    }

    /// Offer all known curves, drop the one the server picks, repeat; then
    /// the two explicit curve markers
    async fn enumerate_curves(&mut self, version: u16, ec_suites: &[u16]) -> Result<()> {
        info!("elliptic curve enumeration, version={}, {} suite(s)", version_name(version), ec_suites.len());
        self.hello.set_max_version(version);
        self.hello.set_cipher_suites(ec_suites.to_vec())?;

        let mut remaining: BTreeSet<u16> = TLS_CURVES.ids().collect();
        while !remaining.is_empty() {
            self.hello.set_supported_curves(Some(remaining.iter().copied().collect()));
            let Some(tr) = self.do_connect().await? else {
                break;
            };
            let Some(curve) = tr.curve else {
                break;
            };
            if !remaining.remove(&curve.id) {
                break;
            }
            debug!("server picked {}", curve.curve.name);
        }

        for explicit in [EXPLICIT_PRIME, EXPLICIT_CHAR2] {
            self.hello.set_supported_curves(Some(vec![explicit]));
            self.do_connect().await?;
        }
        Ok(())
    }

    /// One handshake attempt with the current hello. Only a connection
    /// failure is an error; anything the server does is an outcome.
    async fn do_connect(&mut self) -> Result<Option<HandshakeTestResult>> {
        let stream = open_connection(&self.target, self.config.proxy.as_ref(), self.config.connection_wait).await?;
        let stream = self.wrap(stream);
        let read_timeout = if self.got_ssl_answer { None } else { self.config.read_timeout };
        let mut rec = RecordLayer::new(stream, read_timeout);
        let has_ec_ext = self.hello.supported_curves().is_some_and(|c| !c.is_empty());

        match self.hello.run_test(&mut rec).await {
            Ok(tr) => {
                self.got_ssl_answer = true;
                self.absorb(&tr, has_ec_ext);
                Ok(Some(tr))
            }
            Err(ProbeError::Alert(code)) => {
                debug!("alert {}", code);
                self.got_ssl_answer = true;
                self.last_alert = Some(code);
                Ok(None)
            }
            Err(ProbeError::Timeout) => {
                debug!("read timeout");
                self.got_read_timeout = true;
                Ok(None)
            }
            Err(e) => {
                debug!("handshake failed: {}", e);
                Ok(None)
            }
        }
    }

    /// Fold the side observations of a successful handshake into the
    /// running totals
    fn absorb(&mut self, tr: &HandshakeTestResult, has_ec_ext: bool) {
        if tr.deflate_compress {
            self.server_compress = true;
        }
        if let Some(chain) = tr.certificate_chain.as_ref().filter(|c| !c.is_empty()) {
            if self.report.add_server_chain(chain) {
                debug!("new certificate chain, {} certificate(s)", chain.len());
            }
        }
        if tr.time_millis == 0 {
            self.claims_no_time = true;
        } else {
            self.time_offsets.push(tr.time_millis - chrono::Utc::now().timestamp_millis());
        }
        if tr.dh_size != 0 && (self.min_dh_size == 0 || tr.dh_size < self.min_dh_size) {
            self.min_dh_size = tr.dh_size;
        }
        if tr.ec_size != 0 {
            let min = if has_ec_ext { &mut self.min_ec_size_ext } else { &mut self.min_ec_size };
            if *min == 0 || tr.ec_size < *min {
                *min = tr.ec_size;
            }
        }
        if let Some(curve) = &tr.curve {
            self.named_curves.insert(curve.id, curve.clone());
        }
        if tr.curve_explicit_prime {
            self.curve_explicit_prime = tr.ec_size;
        } else if tr.curve_explicit_char2 {
            self.curve_explicit_char2 = tr.ec_size;
        }
        if tr.unknown_ske {
            self.unknown_ske = true;
        }
        if tr.renegotiation_info.is_some() {
            self.secure_renegotiation = true;
        }
        if tr.does_etm {
            self.encrypt_then_mac = true;
        }
    }

    fn finish(mut self, spontaneous_ec: Vec<u16>, spontaneous_curves: Vec<TlsCurve>) -> Report {
        let r = &mut self.report;
        r.deflate_compress = self.server_compress;
        r.server_time = ServerTime::from_offsets(self.claims_no_time, &self.time_offsets);
        r.secure_renegotiation = self.secure_renegotiation;
        r.encrypt_then_mac = self.encrypt_then_mac;
        r.min_dh_size = self.min_dh_size;
        r.min_ec_size = self.min_ec_size;
        r.min_ec_size_ext = self.min_ec_size_ext;
        r.named_curves = self.named_curves.into_values().collect();
        r.spontaneous_ec = spontaneous_ec;
        r.spontaneous_named_curves = spontaneous_curves;
        r.curve_explicit_prime = self.curve_explicit_prime;
        r.curve_explicit_char2 = self.curve_explicit_char2;
        r.unknown_ske = self.unknown_ske;
        info!("Analysis of {} complete: {} chain(s)", self.target, r.chain_count());
        self.report
    }
}
