// JSON Output Module

use super::{Report, ServerTime, format_date};
use crate::Result;
use crate::certificates::{CertificateChain, ChainEntry};
use crate::ciphers::{CIPHER_DB, ssl2_suite_name, suite_name};
use crate::protocols::version_name;
use crate::utils::hash::to_pem;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportView<'a> {
    connection_name: &'a str,
    connection_port: u16,
    #[serde(rename = "SNI")]
    sni: Option<&'a str>,
    #[serde(rename = "SSLv2", skip_serializing_if = "Option::is_none")]
    ssl2: Option<Ssl2View>,
    /// One entry per version name; names sort in version order
    #[serde(flatten)]
    versions: BTreeMap<String, VersionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ssl2_cert: Option<CertView<'a>>,
    ssl3_chains: Vec<ChainView<'a>>,
    deflate_compress: bool,
    server_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_time_offset_millis: Option<i64>,
    secure_renegotiation: bool,
    #[serde(rename = "rfc7366EtM")]
    rfc7366_etm: bool,
    ssl2_hello_format: bool,
    #[serde(rename = "minDHSize", skip_serializing_if = "Option::is_none")]
    min_dh_size: Option<u32>,
    #[serde(rename = "kxReuseDH", skip_serializing_if = "Option::is_none")]
    kx_reuse_dh: Option<bool>,
    #[serde(rename = "minECSize", skip_serializing_if = "Option::is_none")]
    min_ec_size: Option<u32>,
    #[serde(rename = "minECSizeExt", skip_serializing_if = "Option::is_none")]
    min_ec_size_ext: Option<u32>,
    #[serde(rename = "kxReuseECDH", skip_serializing_if = "Option::is_none")]
    kx_reuse_ecdh: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    named_curves: Option<Vec<CurveView>>,
    warnings: Vec<WarningView>,
}

#[derive(Serialize)]
struct Ssl2View {
    suites: Vec<Ssl2SuiteView>,
}

#[derive(Serialize)]
struct Ssl2SuiteView {
    id: u32,
    name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionView {
    suite_selection: &'static str,
    suites: Vec<SuiteView>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SuiteView {
    id: u16,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    strength: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    forward_secrecy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    anonymous: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_key_type: Option<&'static str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChainView<'a> {
    length: usize,
    decoded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    names_match: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    includes_root: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sign_hashes: Option<&'a [String]>,
    certificates: Vec<CertView<'a>>,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct CertView<'a> {
    thumbprint: &'a str,
    decodable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    decode_error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    serial_hex: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    valid_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    valid_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_curve: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sign_hash: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    self_issued: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_names: Option<&'a [String]>,
    #[serde(rename = "PEM", skip_serializing_if = "Option::is_none")]
    pem: Option<String>,
}

#[derive(Serialize)]
struct CurveView {
    name: String,
    size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    spontaneous: Option<bool>,
}

#[derive(Serialize)]
struct WarningView {
    id: &'static str,
    text: &'static str,
}

impl<'a> CertView<'a> {
    /// Server names are only listed for the end-entity certificate
    fn new(entry: &'a ChainEntry, order: usize, with_pem: bool) -> Self {
        let mut view = CertView {
            thumbprint: &entry.thumbprint,
            decodable: entry.certificate().is_some(),
            decode_error: entry.decode_error(),
            pem: with_pem.then(|| to_pem(&entry.der)),
            ..Default::default()
        };
        if let Some(cert) = entry.certificate() {
            view.serial_hex = Some(cert.serial_hex());
            view.subject = Some(cert.subject().to_string());
            view.issuer = Some(cert.issuer().to_string());
            view.valid_from = Some(format_date(&cert.valid_from()));
            view.valid_to = Some(format_date(&cert.valid_to()));
            view.key_type = Some(cert.key_type().as_str());
            view.key_size = Some(cert.key_size());
            view.key_curve = cert.curve_name();
            view.sign_hash = Some(cert.sign_hash());
            view.self_issued = Some(cert.is_self_issued());
            if order == 0 {
                view.server_names = Some(cert.server_names());
            }
        }
        view
    }
}

impl<'a> ChainView<'a> {
    fn new(chain: &'a CertificateChain, with_pem: bool) -> Self {
        let decoded = chain.is_decodable();
        ChainView {
            length: chain.len(),
            decoded,
            names_match: decoded.then(|| chain.names_match()),
            includes_root: decoded.then(|| chain.includes_root()),
            sign_hashes: chain.sign_hashes(),
            certificates: chain
                .entries()
                .iter()
                .enumerate()
                .map(|(i, e)| CertView::new(e, i, with_pem))
                .collect(),
        }
    }
}

fn version_view(suites: &crate::scanner::SupportedCipherSuites) -> VersionView {
    VersionView {
        suite_selection: suites.selection.as_str(),
        suites: suites
            .suites
            .iter()
            .map(|&id| {
                let cs = CIPHER_DB.get(id);
                SuiteView {
                    id,
                    name: suite_name(id),
                    strength: cs.map(|c| c.strength.digit()),
                    forward_secrecy: cs.map(|c| c.has_forward_secrecy()),
                    anonymous: cs.map(|c| c.is_anonymous()),
                    server_key_type: cs.map(|c| c.server_key_type.as_str()),
                }
            })
            .collect(),
    }
}

fn report_view(report: &Report) -> ReportView<'_> {
    let ssl2 = report
        .ssl2_suites
        .as_ref()
        .filter(|s| !s.is_empty())
        .map(|suites| Ssl2View {
            suites: suites
                .iter()
                .map(|&id| Ssl2SuiteView {
                    id,
                    name: ssl2_suite_name(id),
                })
                .collect(),
        });

    let (server_time, server_time_offset_millis) = match report.server_time {
        ServerTime::NotSent => ("none".to_string(), None),
        ServerTime::Random => ("random".to_string(), None),
        ServerTime::Offset(ms) => {
            let clock = report.server_time.server_clock().map(|dt| format_date(&dt)).unwrap_or_default();
            (clock, Some(ms))
        }
    };

    let has_ec = report.min_ec_size > 0 || report.min_ec_size_ext > 0;
    let has_curves =
        !report.named_curves.is_empty() || report.curve_explicit_prime > 0 || report.curve_explicit_char2 > 0;
    let named_curves = has_curves.then(|| {
        let mut curves: Vec<CurveView> = report
            .named_curves
            .iter()
            .map(|c| CurveView {
                name: c.curve.name.clone(),
                size: c.curve.size,
                spontaneous: Some(report.is_spontaneous(c)),
            })
            .collect();
        if report.curve_explicit_prime > 0 {
            curves.push(CurveView {
                name: "explicitPrime".to_string(),
                size: report.curve_explicit_prime,
                spontaneous: None,
            });
        }
        if report.curve_explicit_char2 > 0 {
            curves.push(CurveView {
                name: "explicitChar2".to_string(),
                size: report.curve_explicit_char2,
                spontaneous: None,
            });
        }
        curves
    });

    ReportView {
        connection_name: &report.connection_name,
        connection_port: report.connection_port,
        sni: report.sni.as_deref(),
        ssl2,
        versions: report
            .suites
            .iter()
            .map(|(&v, scs)| (version_name(v), version_view(scs)))
            .collect(),
        ssl2_cert: report
            .ssl2_chain
            .as_ref()
            .and_then(|c| c.entries().first())
            .map(|e| CertView::new(e, 0, report.show_pem)),
        ssl3_chains: report.chains().map(|c| ChainView::new(c, report.show_pem)).collect(),
        deflate_compress: report.deflate_compress,
        server_time,
        server_time_offset_millis,
        secure_renegotiation: report.secure_renegotiation,
        rfc7366_etm: report.encrypt_then_mac,
        ssl2_hello_format: report.supports_v2_hello,
        min_dh_size: (report.min_dh_size > 0).then_some(report.min_dh_size),
        kx_reuse_dh: (report.min_dh_size > 0).then_some(report.kx_reuse_dh),
        min_ec_size: (report.min_ec_size > 0).then_some(report.min_ec_size),
        min_ec_size_ext: (report.min_ec_size_ext > 0).then_some(report.min_ec_size_ext),
        kx_reuse_ecdh: has_ec.then_some(report.kx_reuse_ecdh),
        named_curves,
        warnings: report
            .warnings()
            .into_iter()
            .map(|(id, text)| WarningView { id, text })
            .collect(),
    }
}

/// Generate JSON output from a report
pub fn generate_json(report: &Report, pretty: bool) -> Result<String> {
    let view = report_view(report);
    if pretty {
        Ok(serde_json::to_string_pretty(&view)?)
    } else {
        Ok(serde_json::to_string(&view)?)
    }
}

/// Write JSON to file
pub fn write_json_file(report: &Report, path: &Path, pretty: bool) -> Result<()> {
    let json = generate_json(report, pretty)?;
    std::fs::write(path, json)?;
    Ok(())
}
