// ServerHello to ServerHelloDone parsing

use super::parser::HandshakeMessage;
use super::record::RecordLayer;
use super::*;
use crate::ciphers::{CIPHER_DB, ServerKeyType};
use crate::data::{TLS_CURVES, TlsCurve};
use crate::error::ProbeResult;
use crate::probe_bail;
use crate::utils::hash::{HashValue, adjusted_bit_length, bit_length, hash_values};
use std::collections::HashSet;
use tokio::io::{AsyncRead, AsyncWrite};

/// Outcome of one handshake attempt, from the ServerHello up to the
/// ServerHelloDone
#[derive(Debug, Clone, Default)]
pub struct HandshakeTestResult {
    /// Version selected in the ServerHello
    pub version: u16,
    /// Version of the incoming records
    pub record_version: Option<u16>,
    /// Server time from the random, in milliseconds (0 when hidden)
    pub time_millis: i64,
    pub session_id: Vec<u8>,
    pub selected_cipher_suite: u16,
    pub cipher_suite_in_client_list: bool,
    pub deflate_compress: bool,
    /// Contents of the renegotiation_info extension, if sent
    pub renegotiation_info: Option<Vec<u8>>,
    pub does_etm: bool,
    /// DER certificates in the order sent, if a Certificate was seen
    pub certificate_chain: Option<Vec<Vec<u8>>>,
    pub dh_size: u32,
    pub ec_size: u32,
    /// Fingerprint of the key exchange parameters
    pub kx_hash: Option<String>,
    pub curve: Option<TlsCurve>,
    pub curve_explicit_prime: bool,
    pub curve_explicit_char2: bool,
    pub unknown_ske: bool,
    /// A message after the ServerHello could not be processed
    pub failed_after_hello: bool,
}

impl HandshakeTestResult {
    /// Read the server flight. Errors before the ServerHello is complete
    /// are returned; errors after it only set `failed_after_hello`.
    pub async fn parse<S>(rec: &mut RecordLayer<S>) -> ProbeResult<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        rec.set_expected_type(HANDSHAKE);
        let mut tr = Self::default();

        let mut sh = HandshakeMessage::read(rec).await?;
        if sh.msg_type() != SERVER_HELLO {
            probe_bail!("Not a ServerHello");
        }
        tr.parse_server_hello(&mut sh)?;

        if let Err(e) = tr.parse_flight(rec).await {
            tracing::debug!("failed after ServerHello: {}", e);
            tr.failed_after_hello = true;
        }
        tr.record_version = rec.in_version();
        Ok(tr)
    }

    fn parse_server_hello(&mut self, sh: &mut HandshakeMessage) -> ProbeResult<()> {
        self.version = sh.read2()?;
        let random = sh.read_blob_fixed(32)?;
        self.time_millis =
            1000 * u32::from_be_bytes([random[0], random[1], random[2], random[3]]) as i64;
        self.session_id = sh.read_blob_var(1)?;
        if self.session_id.len() > 32 {
            probe_bail!("Oversized session ID");
        }
        self.selected_cipher_suite = sh.read2()?;
        self.deflate_compress = match sh.read1()? {
            0 => false,
            1 => true,
            cm => probe_bail!("Unknown compression method: {}", cm),
        };

        if !sh.end_of_struct() {
            sh.open_var(2)?;
            let mut seen = HashSet::new();
            while !sh.end_of_struct() {
                let ext_type = sh.read2()?;
                if !seen.insert(ext_type) {
                    probe_bail!("Duplicate extension: {}", ext_type);
                }
                sh.open_var(2)?;
                match ext_type {
                    // empty acknowledgement
                    EXT_SERVER_NAME => {}
                    EXT_RENEGOTIATION_INFO => self.renegotiation_info = Some(sh.read_blob_var(1)?),
                    EXT_ENCRYPT_THEN_MAC => self.does_etm = true,
                    // sent after seeing our list, so not informative
                    EXT_SUPPORTED_CURVES | EXT_EC_POINT_FORMATS => sh.skip_remainder()?,
                    other => probe_bail!("Unknown extension: {}", other),
                }
                sh.close(false)?;
            }
            sh.close(false)?;
        }
        sh.close(false)
    }

    async fn parse_flight<S>(&mut self, rec: &mut RecordLayer<S>) -> ProbeResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let mut hm = HandshakeMessage::read(rec).await?;
            match hm.msg_type() {
                CERTIFICATE => self.parse_certificate(&mut hm)?,
                SERVER_KEY_EXCHANGE => self.parse_server_key_exchange(&mut hm)?,
                // CA names are not used
                CERTIFICATE_REQUEST => hm.close(true)?,
                SERVER_HELLO_DONE => {
                    hm.close(false)?;
                    return Ok(());
                }
                _ => hm.close(true)?,
            }
        }
    }

    fn parse_certificate(&mut self, hm: &mut HandshakeMessage) -> ProbeResult<()> {
        if self.certificate_chain.is_some() {
            probe_bail!("Duplicate Certificate message");
        }
        let mut chain = Vec::new();
        hm.open_var(3)?;
        while !hm.end_of_struct() {
            chain.push(hm.read_blob_var(3)?);
        }
        hm.close(false)?;
        hm.close(false)?;
        self.certificate_chain = Some(chain);
        Ok(())
    }

    /// Signature trailer; TLS 1.2 adds the hash/sign identifiers
    fn skip_signature(&self, hm: &mut HandshakeMessage) -> ProbeResult<()> {
        if self.version >= TLS12 {
            hm.read2()?;
        }
        hm.read_blob_var(2)?;
        Ok(())
    }

    fn parse_server_key_exchange(&mut self, hm: &mut HandshakeMessage) -> ProbeResult<()> {
        let Some(cs) = CIPHER_DB.get(self.selected_cipher_suite) else {
            self.unknown_ske = true;
            return hm.close(true);
        };

        if cs.is_dhe {
            if cs.is_psk {
                // key hint
                hm.read_blob_var(2)?;
            }
            let p = hm.read_blob_var(2)?;
            self.dh_size = bit_length(&p);
            let g = hm.read_blob_var(2)?;
            let y = hm.read_blob_var(2)?;
            if cs.server_key_type != ServerKeyType::None {
                self.skip_signature(hm)?;
            }
            self.kx_hash = Some(hash_values(&[
                HashValue::Int(0),
                HashValue::Bytes(&p),
                HashValue::Bytes(&g),
                HashValue::Bytes(&y),
            ]));
        } else if cs.is_ecdhe {
            if cs.is_psk {
                hm.read_blob_var(2)?;
            }
            let mut id = 0u16;
            let mut p = None;
            let (mut bf1, mut bf2, mut bf3) = (None, None, None);
            let (mut a, mut b, mut g, mut order, mut cofactor) = (None, None, None, None, None);

            let ptype = hm.read1()?;
            match ptype {
                // explicit_prime
                1 => {
                    p = Some(hm.read_blob_var(1)?);
                    a = Some(hm.read_blob_var(1)?);
                    b = Some(hm.read_blob_var(1)?);
                    g = Some(hm.read_blob_var(1)?);
                    let o = hm.read_blob_var(1)?;
                    self.ec_size = adjusted_bit_length(&o);
                    order = Some(o);
                    cofactor = Some(hm.read_blob_var(1)?);
                    self.curve_explicit_prime = true;
                }
                // explicit_char2
                2 => {
                    hm.read2()?;
                    match hm.read1()? {
                        // trinomial
                        1 => bf1 = Some(hm.read_blob_var(1)?),
                        // pentanomial
                        2 => {
                            bf1 = Some(hm.read_blob_var(1)?);
                            bf2 = Some(hm.read_blob_var(1)?);
                            bf3 = Some(hm.read_blob_var(1)?);
                        }
                        _ => {
                            self.unknown_ske = true;
                            return hm.close(true);
                        }
                    }
                    a = Some(hm.read_blob_var(1)?);
                    b = Some(hm.read_blob_var(1)?);
                    g = Some(hm.read_blob_var(1)?);
                    let o = hm.read_blob_var(1)?;
                    self.ec_size = adjusted_bit_length(&o);
                    order = Some(o);
                    cofactor = Some(hm.read_blob_var(1)?);
                    self.curve_explicit_char2 = true;
                }
                // named_curve
                3 => {
                    id = hm.read2()?;
                    match TLS_CURVES.get(id) {
                        Some(curve) => {
                            self.ec_size = curve.curve.size;
                            self.curve = Some(curve.clone());
                        }
                        None => {
                            self.unknown_ske = true;
                            return hm.close(true);
                        }
                    }
                }
                _ => {
                    self.unknown_ske = true;
                    return hm.close(true);
                }
            }

            let q = hm.read_blob_var(1)?;
            if cs.server_key_type != ServerKeyType::None {
                self.skip_signature(hm)?;
            }
            self.kx_hash = Some(hash_values(&[
                HashValue::Int(1),
                HashValue::Int(ptype as u32),
                HashValue::Int(id as u32),
                p.as_deref().into(),
                bf1.as_deref().into(),
                bf2.as_deref().into(),
                bf3.as_deref().into(),
                a.as_deref().into(),
                b.as_deref().into(),
                g.as_deref().into(),
                order.as_deref().into(),
                cofactor.as_deref().into(),
                HashValue::Bytes(&q),
            ]));
        } else if cs.is_rsa_export {
            let modulus = hm.read_blob_var(2)?;
            let exponent = hm.read_blob_var(2)?;
            self.skip_signature(hm)?;
            self.kx_hash = Some(hash_values(&[
                HashValue::Int(2),
                HashValue::Bytes(&modulus),
                HashValue::Bytes(&exponent),
            ]));
        } else if cs.is_srp {
            let n = hm.read_blob_var(2)?;
            self.dh_size = bit_length(&n);
            let g = hm.read_blob_var(2)?;
            let s = hm.read_blob_var(1)?;
            let b = hm.read_blob_var(2)?;
            self.kx_hash = Some(hash_values(&[
                HashValue::Int(3),
                HashValue::Bytes(&n),
                HashValue::Bytes(&g),
                HashValue::Bytes(&s),
                HashValue::Bytes(&b),
            ]));
            // signature presence depends on the certificate; not decoded
            hm.skip_remainder()?;
        } else if cs.is_psk {
            // key hint
            hm.read_blob_var(2)?;
        } else {
            probe_bail!("Unexpected ServerKeyExchange");
        }
        hm.close(false)
    }
}
