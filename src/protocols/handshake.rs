// ClientHello builder and single-connection handshake test

use super::hlist::HList;
use super::record::RecordLayer;
use super::server_hello::HandshakeTestResult;
use super::ssl2::make_hello_v2_format;
use super::*;
use crate::error::{ProbeError, ProbeResult};
use rand::RngCore;
use tokio::io::{AsyncRead, AsyncWrite};

/// Largest cipher suite list accepted in a ClientHello
pub const MAX_CIPHER_SUITES: usize = 32767;

/// Check an SNI host name: printable ASCII without spaces, at most
/// 65535 bytes
pub fn validate_server_name(name: &str) -> ProbeResult<()> {
    if name.len() > 0xFFFF {
        return Err(ProbeError::Config("Invalid server name (too long)".to_string()));
    }
    if name.bytes().any(|c| !(0x21..=0x7E).contains(&c)) {
        return Err(ProbeError::Config("Invalid server name (not ASCII)".to_string()));
    }
    Ok(())
}

/// ClientHello configuration for one probe connection
#[derive(Debug, Clone)]
pub struct ClientHelloBuilder {
    max_version: u16,
    record_version: u16,
    session_id: Option<Vec<u8>>,
    cipher_suites: Vec<u16>,
    fallback_scsv: bool,
    renegotiation_scsv: bool,
    renegotiation_extension: bool,
    encrypt_then_mac: bool,
    supported_curves: Option<Vec<u16>>,
    deflate: bool,
    server_name: Option<String>,
}

impl Default for ClientHelloBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientHelloBuilder {
    /// Defaults: TLS 1.2 max, SSLv3 record version, deflate offered,
    /// renegotiation and encrypt-then-MAC extensions on, no SCSV, no
    /// session id, no curves, no SNI
    pub fn new() -> Self {
        Self {
            max_version: TLS12,
            record_version: SSLV3,
            session_id: None,
            cipher_suites: Vec::new(),
            fallback_scsv: false,
            renegotiation_scsv: false,
            renegotiation_extension: true,
            encrypt_then_mac: true,
            supported_curves: None,
            deflate: true,
            server_name: None,
        }
    }

    /// Back to defaults; the server name is kept
    pub fn reset(&mut self) {
        let server_name = self.server_name.take();
        *self = Self::new();
        self.server_name = server_name;
    }

    pub fn max_version(&self) -> u16 {
        self.max_version
    }

    pub fn set_max_version(&mut self, version: u16) -> &mut Self {
        self.max_version = version;
        self
    }

    pub fn record_version(&self) -> u16 {
        self.record_version
    }

    /// Versions below SSLv3 select the SSLv2-format ClientHello
    pub fn set_record_version(&mut self, version: u16) -> &mut Self {
        self.record_version = version;
        self
    }

    pub fn set_session_id(&mut self, sid: Option<Vec<u8>>) -> ProbeResult<&mut Self> {
        if let Some(s) = &sid
            && s.len() > 32
        {
            return Err(ProbeError::Config("Invalid session ID length".to_string()));
        }
        self.session_id = sid;
        Ok(self)
    }

    pub fn cipher_suites(&self) -> &[u16] {
        &self.cipher_suites
    }

    pub fn set_cipher_suites(&mut self, suites: Vec<u16>) -> ProbeResult<&mut Self> {
        if suites.len() > MAX_CIPHER_SUITES {
            return Err(ProbeError::Config("Too many cipher suites".to_string()));
        }
        self.cipher_suites = suites;
        Ok(self)
    }

    pub fn set_fallback_scsv(&mut self, enabled: bool) -> &mut Self {
        self.fallback_scsv = enabled;
        self
    }

    pub fn set_renegotiation_scsv(&mut self, enabled: bool) -> &mut Self {
        self.renegotiation_scsv = enabled;
        self
    }

    pub fn set_renegotiation_extension(&mut self, enabled: bool) -> &mut Self {
        self.renegotiation_extension = enabled;
        self
    }

    pub fn set_encrypt_then_mac(&mut self, enabled: bool) -> &mut Self {
        self.encrypt_then_mac = enabled;
        self
    }

    pub fn supported_curves(&self) -> Option<&[u16]> {
        self.supported_curves.as_deref()
    }

    pub fn set_supported_curves(&mut self, curves: Option<Vec<u16>>) -> &mut Self {
        self.supported_curves = curves;
        self
    }

    pub fn set_deflate(&mut self, enabled: bool) -> &mut Self {
        self.deflate = enabled;
        self
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    pub fn set_server_name(&mut self, name: Option<String>) -> ProbeResult<&mut Self> {
        if let Some(n) = &name {
            validate_server_name(n)?;
        }
        self.server_name = name;
        Ok(self)
    }

    /// Drop SNI, the renegotiation extension and the curve extensions.
    /// Signature algorithms (TLS 1.2) and encrypt-then-MAC stay.
    pub fn disable_extensions(&mut self) {
        self.server_name = None;
        self.renegotiation_extension = false;
        self.supported_curves = None;
    }

    /// Largest number of suites for which the ClientHello plus its record
    /// header fits in `max_record_len` bytes; None if even one suite
    /// does not fit
    pub fn compute_max_suite_count(&self, max_record_len: usize) -> ProbeResult<Option<usize>> {
        let mut a = 1;
        if self.make_client_hello(&vec![0; a])?.len() + 5 > max_record_len {
            return Ok(None);
        }
        // record header 5, handshake header 4, fixed fields 37, list length 2
        let mut b = (1 + (max_record_len.saturating_sub(48) >> 1)).min(MAX_CIPHER_SUITES);
        while b - a > 1 {
            let c = (a + b) >> 1;
            if self.make_client_hello(&vec![0; c])?.len() + 5 <= max_record_len {
                a = c;
            } else {
                b = c;
            }
        }
        Ok(Some(a))
    }

    /// Complete ClientHello handshake message (header included) carrying
    /// the given suites
    pub fn make_client_hello(&self, suites: &[u16]) -> ProbeResult<Vec<u8>> {
        let mut chs = HList::new(0xFFFFFF);
        chs.put_u16(self.max_version)?;

        let mut random = [0u8; 32];
        let now = chrono::Utc::now().timestamp() as u32;
        random[..4].copy_from_slice(&now.to_be_bytes());
        rand::thread_rng().fill_bytes(&mut random[4..]);
        chs.put_slice(&random)?;

        match &self.session_id {
            Some(sid) => {
                chs.put_u8(sid.len() as u8)?;
                chs.put_slice(sid)?;
            }
            None => chs.put_u8(0)?,
        }

        let mut all: Vec<u16> = suites.to_vec();
        if self.renegotiation_scsv {
            all.push(EMPTY_RENEGOTIATION_INFO_SCSV);
        }
        if self.fallback_scsv {
            all.push(FALLBACK_SCSV);
        }
        chs.put_u16((all.len() << 1) as u16)?;
        for s in all {
            chs.put_u16(s)?;
        }

        if self.deflate {
            chs.put_slice(&[2, 1, 0])?;
        } else {
            chs.put_slice(&[1, 0])?;
        }

        let mut exs = HList::new(0xFFFF);
        if self.max_version >= TLS12 {
            exs.put_u16(EXT_SIGNATURE_ALGORITHMS)?;
            exs.put_u16(38)?;
            exs.put_u16(36)?;
            for sign in (1..=3u8).rev() {
                for hash in (1..=6u8).rev() {
                    exs.put_u8(hash)?;
                    exs.put_u8(sign)?;
                }
            }
        }
        if let Some(name) = &self.server_name {
            let mut host = HList::new(0xFFFF);
            host.put_slice(name.as_bytes())?;
            let mut entries = HList::new(0xFFFF);
            entries.put_u8(0)?;
            entries.put_list(&host)?;
            let mut data = HList::new(0xFFFF);
            data.put_list(&entries)?;
            exs.put_u16(EXT_SERVER_NAME)?;
            exs.put_list(&data)?;
        }
        if self.renegotiation_extension {
            exs.put_u16(EXT_RENEGOTIATION_INFO)?;
            exs.put_u16(1)?;
            exs.put_u8(0)?;
        }
        if self.encrypt_then_mac {
            exs.put_u16(EXT_ENCRYPT_THEN_MAC)?;
            exs.put_u16(0)?;
        }
        if let Some(curves) = self.supported_curves.as_deref().filter(|c| !c.is_empty()) {
            let mut list = HList::new(0xFFFF);
            for &id in curves {
                list.put_u16(id)?;
            }
            let mut data = HList::new(0xFFFF);
            data.put_list(&list)?;
            exs.put_u16(EXT_SUPPORTED_CURVES)?;
            exs.put_list(&data)?;

            // uncompressed, ansiX962_compressed_prime, ansiX962_compressed_char2
            let mut formats = HList::new(0xFF);
            formats.put_slice(&[0, 1, 2])?;
            let mut data = HList::new(0xFFFF);
            data.put_list(&formats)?;
            exs.put_u16(EXT_EC_POINT_FORMATS)?;
            exs.put_list(&data)?;
        }
        if !exs.is_empty() {
            chs.put_list(&exs)?;
        }

        let body = chs.to_vec();
        let mut msg = Vec::with_capacity(body.len() + 1);
        msg.push(CLIENT_HELLO);
        msg.extend_from_slice(&body);
        Ok(msg)
    }

    /// Send the ClientHello and read the answer up to ServerHelloDone.
    /// A fatal alert from the server comes back as `ProbeError::Alert`.
    pub async fn run_test<S>(&self, rec: &mut RecordLayer<S>) -> ProbeResult<HandshakeTestResult>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        rec.set_out_type(HANDSHAKE).await?;
        rec.set_out_version(self.record_version);
        if self.record_version < SSLV3 {
            let suites: Vec<u32> = self.cipher_suites.iter().map(|&s| s as u32).collect();
            let hello = make_hello_v2_format(self.max_version, Some(127), &suites)?;
            rec.raw_write(&hello).await?;
        } else {
            let hello = self.make_client_hello(&self.cipher_suites)?;
            rec.write(&hello).await?;
        }
        rec.flush().await?;

        let mut tr = HandshakeTestResult::parse(rec).await?;
        tr.cipher_suite_in_client_list = self.cipher_suites.contains(&tr.selected_cipher_suite);
        Ok(tr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extensions_of(hello: &[u8]) -> Vec<u8> {
        // type(1) len(3) version(2) random(32) sid(1+n) suites(2+n) comp(1+n)
        let mut off = 4 + 2 + 32;
        off += 1 + hello[off] as usize;
        off += 2 + u16::from_be_bytes([hello[off], hello[off + 1]]) as usize;
        off += 1 + hello[off] as usize;
        hello[off..].to_vec()
    }

    #[test]
    fn test_default_hello_layout() {
        let b = ClientHelloBuilder::new();
        let hello = b.make_client_hello(&[0x002F, 0x0035]).unwrap();
        assert_eq!(hello[0], CLIENT_HELLO);
        let len = u32::from_be_bytes([0, hello[1], hello[2], hello[3]]) as usize;
        assert_eq!(len, hello.len() - 4);
        assert_eq!(&hello[4..6], &[3, 3]);
        assert_eq!(hello[38], 0);
        assert_eq!(&hello[39..45], &[0, 4, 0x00, 0x2F, 0x00, 0x35]);
        assert_eq!(&hello[45..48], &[2, 1, 0]);

        let exts = extensions_of(&hello);
        // sig_algs (42) + reneg (5) + EtM (4)
        assert_eq!(u16::from_be_bytes([exts[0], exts[1]]) as usize, 42 + 5 + 4);
        assert_eq!(&exts[2..8], &[0x00, 0x0D, 0x00, 0x26, 0x00, 0x24]);
        assert_eq!(&exts[8..10], &[6, 3]);
        assert_eq!(&exts[42..44], &[1, 1]);
        assert_eq!(&exts[44..49], &[0xFF, 0x01, 0x00, 0x01, 0x00]);
        assert_eq!(&exts[49..53], &[0x00, 0x16, 0x00, 0x00]);
    }

    #[test]
    fn test_sni_and_curves() {
        let mut b = ClientHelloBuilder::new();
        b.set_max_version(TLS10)
            .set_encrypt_then_mac(false)
            .set_renegotiation_extension(false)
            .set_supported_curves(Some(vec![23, 24]));
        b.set_server_name(Some("a.b".to_string())).unwrap();
        let exts = extensions_of(&b.make_client_hello(&[0x002F]).unwrap());
        assert_eq!(
            &exts[2..14],
            &[0x00, 0x00, 0x00, 0x08, 0x00, 0x06, 0x00, 0x00, 0x03, b'a', b'.', b'b']
        );
        assert_eq!(&exts[14..24], &[0x00, 0x0A, 0x00, 0x06, 0x00, 0x04, 0x00, 23, 0x00, 24]);
        assert_eq!(&exts[24..], &[0x00, 0x0B, 0x00, 0x04, 0x03, 0, 1, 2]);
    }

    #[test]
    fn test_no_extension_block_when_empty() {
        let mut b = ClientHelloBuilder::new();
        b.set_max_version(SSLV3).set_encrypt_then_mac(false).set_deflate(false);
        b.disable_extensions();
        let hello = b.make_client_hello(&[0x000A]).unwrap();
        assert_eq!(hello.len(), 4 + 2 + 32 + 1 + 4 + 2);
    }

    #[test]
    fn test_scsv_are_appended() {
        let mut b = ClientHelloBuilder::new();
        b.set_renegotiation_scsv(true).set_fallback_scsv(true);
        let hello = b.make_client_hello(&[0x002F]).unwrap();
        assert_eq!(&hello[39..47], &[0, 6, 0x00, 0x2F, 0x00, 0xFF, 0x56, 0x00]);
    }

    #[test]
    fn test_server_name_validation() {
        let mut b = ClientHelloBuilder::new();
        assert!(b.set_server_name(Some("bad name".to_string())).is_err());
        assert!(b.set_server_name(Some("caf\u{e9}".to_string())).is_err());
        assert!(b.set_server_name(Some("x".repeat(0x10000))).is_err());
        assert!(b.set_server_name(Some("ok.example".to_string())).is_ok());
        assert!(b.set_session_id(Some(vec![0; 33])).is_err());
    }

    #[test]
    fn test_compute_max_suite_count_is_tight() {
        let b = ClientHelloBuilder::new();
        for budget in [256, 1024, 8192] {
            let n = b.compute_max_suite_count(budget).unwrap().unwrap();
            assert!(b.make_client_hello(&vec![0; n]).unwrap().len() + 5 <= budget);
            assert!(b.make_client_hello(&vec![0; n + 1]).unwrap().len() + 5 > budget);
        }
        assert_eq!(b.compute_max_suite_count(60).unwrap(), None);
    }
}
