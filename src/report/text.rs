// Text Output Module - human-readable report

use super::{Report, ServerTime, format_date};
use crate::Result;
use crate::certificates::ChainEntry;
use crate::ciphers::{CIPHER_DB, ssl2_suite_name, suite_name};
use crate::protocols::{SSLV2, version_name};
use crate::utils::hash::to_pem;
use colored::*;
use std::fmt::Write;
use std::path::Path;

const SEPARATOR: &str = "=========================================";

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}

/// Reuse flags are printed with a leading space on "no"
fn reuse(b: bool) -> &'static str {
    if b { "yes" } else { " no" }
}

struct Painter {
    color: bool,
}

impl Painter {
    fn heading(&self, text: &str) -> String {
        if self.color {
            text.cyan().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn warning(&self, text: &str) -> String {
        if self.color {
            text.yellow().bold().to_string()
        } else {
            text.to_string()
        }
    }
}

fn write_cert(out: &mut String, entry: &ChainEntry, order: usize, with_pem: bool) -> std::fmt::Result {
    writeln!(out, "thumbprint: {}", entry.thumbprint)?;
    match &entry.decoded {
        Err(msg) => writeln!(out, "UNDECODABLE: {}", msg)?,
        Ok(cert) => {
            writeln!(out, "serial:     {}", cert.serial_hex())?;
            writeln!(out, "subject:    {}", cert.subject())?;
            writeln!(out, "issuer:     {}", cert.issuer())?;
            writeln!(out, "valid from: {}", format_date(&cert.valid_from()))?;
            writeln!(out, "valid to:   {}", format_date(&cert.valid_to()))?;
            writeln!(out, "key type:   {}", cert.key_type())?;
            writeln!(out, "key size:   {}", cert.key_size())?;
            if let Some(curve) = cert.curve_name() {
                writeln!(out, "key curve:  {}", curve)?;
            }
            writeln!(out, "sign hash:  {}", cert.sign_hash())?;
            if cert.is_self_issued() {
                writeln!(out, "(self-issued)")?;
            }
            if order == 0 {
                write!(out, "server names:")?;
                if cert.server_names().is_empty() {
                    writeln!(out, " NONE")?;
                } else {
                    writeln!(out)?;
                    for name in cert.server_names() {
                        writeln!(out, "   {}", name)?;
                    }
                }
            }
        }
    }
    if with_pem {
        out.push_str(&to_pem(&entry.der));
    }
    Ok(())
}

fn write_suites(out: &mut String, report: &Report) -> std::fmt::Result {
    if let Some(ssl2) = report.ssl2_suites.as_ref().filter(|s| !s.is_empty()) {
        writeln!(out, "  {}", version_name(SSLV2))?;
        for &s in ssl2 {
            writeln!(out, "     {}", ssl2_suite_name(s))?;
        }
    }

    let mut last = None;
    for (&v, scs) in &report.suites {
        write!(out, "  {}:", version_name(v))?;
        if last == Some(scs) {
            writeln!(out, " idem")?;
            continue;
        }
        last = Some(scs);
        writeln!(out)?;
        writeln!(out, "     server selection: {}", scs.selection.description())?;
        for &s in &scs.suites {
            let (strength, fs, anon, kt) = match CIPHER_DB.get(s) {
                Some(cs) => (
                    cs.strength.digit().to_string(),
                    if cs.has_forward_secrecy() { "f" } else { "-" },
                    if cs.is_anonymous() { "A" } else { "-" },
                    cs.server_key_type.as_str(),
                ),
                None => ("?".to_string(), "?", "?", "?"),
            };
            writeln!(out, "     {}{}{} (key: {:>4})  {}", strength, fs, anon, kt, suite_name(s))?;
        }
    }
    Ok(())
}

fn write_chains(out: &mut String, report: &Report, p: &Painter) -> std::fmt::Result {
    if let Some(entry) = report.ssl2_chain.as_ref().and_then(|c| c.entries().first()) {
        writeln!(out, "{}", p.heading("+++++ SSLv2 certificate"))?;
        write_cert(out, entry, 0, report.show_pem)?;
    }
    let heading = format!("+++++ SSLv3/TLS: {} certificate chain(s)", report.chain_count());
    writeln!(out, "{}", p.heading(&heading))?;
    for chain in report.chains() {
        writeln!(out, "+++ chain: length={}", chain.len())?;
        if let Some(hashes) = chain.sign_hashes() {
            writeln!(out, "names match:        {}", yes_no(chain.names_match()))?;
            writeln!(out, "includes root:      {}", yes_no(chain.includes_root()))?;
            write!(out, "signature hash(es):")?;
            for h in hashes {
                write!(out, " {}", h)?;
            }
            writeln!(out)?;
        } else if chain.is_empty() {
            writeln!(out, "CHAIN IS EMPTY")?;
        } else {
            writeln!(out, "CHAIN PROCESSING ERROR")?;
        }
        for (i, entry) in chain.entries().iter().enumerate() {
            writeln!(out, "+ certificate order: {}", i)?;
            write_cert(out, entry, i, report.show_pem)?;
        }
    }
    Ok(())
}

fn write_properties(out: &mut String, report: &Report) -> std::fmt::Result {
    writeln!(out, "Server compression support: {}", yes_no(report.deflate_compress))?;
    match report.server_time {
        ServerTime::NotSent => writeln!(out, "Server does not send its system time.")?,
        ServerTime::Random => writeln!(out, "Server sends a random system time.")?,
        ServerTime::Offset(ms) => {
            let clock = report.server_time.server_clock().map(|dt| format_date(&dt)).unwrap_or_default();
            writeln!(out, "Server time: {} (offset: {} ms)", clock, ms)?;
        }
    }
    writeln!(out, "Secure renegotiation support: {}", yes_no(report.secure_renegotiation))?;
    writeln!(out, "Encrypt-then-MAC support (RFC 7366): {}", yes_no(report.encrypt_then_mac))?;
    writeln!(out, "SSLv2 ClientHello format (for SSLv3+): {}", yes_no(report.supports_v2_hello))?;
    if report.min_dh_size > 0 {
        writeln!(out, "Minimum DH size: {}", report.min_dh_size)?;
        writeln!(out, "DH parameter reuse: {}", reuse(report.kx_reuse_dh))?;
    }
    if report.min_ec_size > 0 {
        writeln!(out, "Minimum EC size (no extension):   {}", report.min_ec_size)?;
    }
    if report.min_ec_size_ext > 0 {
        writeln!(out, "Minimum EC size (with extension): {}", report.min_ec_size_ext)?;
        if report.min_ec_size == 0 {
            writeln!(out, "Server does not use EC without the client extension")?;
        }
    }
    if report.min_ec_size > 0 || report.min_ec_size_ext > 0 {
        writeln!(out, "ECDH parameter reuse: {}", reuse(report.kx_reuse_ecdh))?;
    }
    if !report.named_curves.is_empty() {
        writeln!(out, "Supported curves (size and name) ('*' = selected by server):")?;
        for nc in &report.named_curves {
            let mark = if report.is_spontaneous(nc) { "*" } else { " " };
            writeln!(out, "  {} {:>3}  {}", mark, nc.curve.size, nc.curve.name)?;
        }
        if report.curve_explicit_prime > 0 {
            writeln!(out, "  explicit prime, size = {}", report.curve_explicit_prime)?;
        }
        if report.curve_explicit_char2 > 0 {
            writeln!(out, "  explicit char2, size = {}", report.curve_explicit_char2)?;
        }
    }
    Ok(())
}

fn render(report: &Report, p: &Painter) -> std::result::Result<String, std::fmt::Error> {
    let mut out = String::new();
    writeln!(out, "Connection: {}:{}", report.connection_name, report.connection_port)?;
    match &report.sni {
        Some(sni) => writeln!(out, "SNI: {}", sni)?,
        None => writeln!(out, "No SNI sent")?,
    }
    write_suites(&mut out, report)?;
    writeln!(out, "{}", SEPARATOR)?;
    write_chains(&mut out, report, p)?;
    writeln!(out, "{}", SEPARATOR)?;
    write_properties(&mut out, report)?;
    writeln!(out, "{}", SEPARATOR)?;

    let warnings = report.warnings();
    if warnings.is_empty() {
        writeln!(out, "No warning.")?;
    }
    for (id, text) in warnings {
        writeln!(out, "{}: {}", p.warning(&format!("WARN[{}]", id)), text)?;
    }
    Ok(out)
}

/// Generate the text report; `color` adds terminal colors to headings
/// and warnings
pub fn generate_text(report: &Report, color: bool) -> Result<String> {
    Ok(render(report, &Painter { color })?)
}

/// Write the uncolored text report to a file
pub fn write_text_file(report: &Report, path: &Path) -> Result<()> {
    std::fs::write(path, generate_text(report, false)?)?;
    Ok(())
}
