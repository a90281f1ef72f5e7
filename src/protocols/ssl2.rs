// SSLv2 ClientHello and ServerHello

use super::record::with_timeout;
use crate::ciphers::SSL2_SUITES;
use crate::error::{ProbeError, ProbeResult};
use crate::probe_bail;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Version field of an SSLv2 ClientHello
pub const SSL2_HELLO_VERSION: u16 = 0x0002;

const CHALLENGE_LEN: usize = 16;

/// Build an SSLv2-format ClientHello (two-byte header, no session id,
/// 16-byte challenge). Suites are written on 3 bytes; `max_len` caps the
/// total length by dropping trailing suites.
pub fn make_hello_v2_format(version: u16, max_len: Option<usize>, suites: &[u32]) -> ProbeResult<Vec<u8>> {
    let count = match max_len {
        Some(max) => suites.len().min(max.saturating_sub(27) / 3),
        None => suites.len(),
    };
    let total = 27 + 3 * count;
    if count == 0 || total > 32769 {
        return Err(ProbeError::Config("Invalid V2 hello length".to_string()));
    }

    let mut hello = Vec::with_capacity(total);
    hello.extend_from_slice(&(0x8000 | (total - 2) as u16).to_be_bytes());
    hello.push(0x01);
    hello.extend_from_slice(&version.to_be_bytes());
    hello.extend_from_slice(&((count * 3) as u16).to_be_bytes());
    // session id length, challenge length
    hello.extend_from_slice(&[0, 0, 0, CHALLENGE_LEN as u8]);
    for &cs in &suites[..count] {
        hello.extend_from_slice(&cs.to_be_bytes()[1..]);
    }
    hello.extend_from_slice(&[0x54; CHALLENGE_LEN]);
    Ok(hello)
}

/// What an SSLv2 server answered: its suites and certificate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ssl2Result {
    pub cipher_suites: Vec<u32>,
    pub certificate: Vec<u8>,
}

impl Ssl2Result {
    /// Send an SSLv2 ClientHello offering every SSLv2 suite and decode
    /// the ServerHello
    pub async fn test_server<S>(stream: &mut S, read_timeout: Option<Duration>) -> ProbeResult<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let hello = make_hello_v2_format(SSL2_HELLO_VERSION, None, &SSL2_SUITES)?;
        stream.write_all(&hello).await?;
        stream.flush().await?;
        Self::read_server_hello(stream, read_timeout).await
    }

    async fn read_server_hello<S>(stream: &mut S, read_timeout: Option<Duration>) -> ProbeResult<Self>
    where
        S: AsyncRead + Unpin,
    {
        let mut header = [0u8; 2];
        with_timeout(read_timeout, stream.read_exact(&mut header)).await?;
        let len = u16::from_be_bytes(header) as usize;
        if len & 0x8000 == 0 {
            probe_bail!("not a SSLv2 record");
        }
        let len = len & 0x7FFF;
        if len < 11 {
            probe_bail!("not a SSLv2 server hello");
        }

        // type, session-id-hit, certificate type, version, three lengths
        let mut fixed = [0u8; 11];
        with_timeout(read_timeout, stream.read_exact(&mut fixed)).await?;
        if fixed[0] != 0x04 {
            probe_bail!("not a SSLv2 server hello");
        }
        let cert_len = u16::from_be_bytes([fixed[5], fixed[6]]) as usize;
        let cs_len = u16::from_be_bytes([fixed[7], fixed[8]]) as usize;
        let conn_id_len = u16::from_be_bytes([fixed[9], fixed[10]]) as usize;
        if len != 11 + cert_len + cs_len + conn_id_len || cs_len % 3 != 0 {
            probe_bail!("not a SSLv2 server hello");
        }

        let mut rest = vec![0u8; cert_len + cs_len + conn_id_len];
        with_timeout(read_timeout, stream.read_exact(&mut rest)).await?;
        let certificate = rest[..cert_len].to_vec();
        let cipher_suites = rest[cert_len..cert_len + cs_len]
            .chunks(3)
            .map(|c| u32::from_be_bytes([0, c[0], c[1], c[2]]))
            .collect();
        Ok(Self {
            cipher_suites,
            certificate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ciphers::{SSL_CK_DES_192_EDE3_CBC_WITH_MD5, SSL_CK_RC4_128_WITH_MD5};
    use tokio::io::duplex;

    #[test]
    fn test_full_v2_hello_bytes() {
        let hello = make_hello_v2_format(SSL2_HELLO_VERSION, None, &SSL2_SUITES).unwrap();
        assert_eq!(hello.len(), 48);
        assert_eq!(&hello[..11], &[0x80, 0x2E, 0x01, 0x00, 0x02, 0x00, 0x15, 0x00, 0x00, 0x00, 0x10]);
        assert_eq!(&hello[11..14], &[0x01, 0x00, 0x80]);
        assert_eq!(&hello[29..32], &[0x07, 0x00, 0xC0]);
        assert!(hello[32..].iter().all(|&b| b == 0x54));
    }

    #[test]
    fn test_length_cap() {
        let suites: Vec<u32> = (1..=100).collect();
        let hello = make_hello_v2_format(0x0303, Some(127), &suites).unwrap();
        assert_eq!(hello.len(), 27 + 3 * 33);
        assert_eq!(&hello[3..5], &[0x03, 0x03]);
        assert_eq!(&hello[11..14], &[0x00, 0x00, 0x01]);
        assert!(make_hello_v2_format(0x0303, Some(20), &suites).is_err());
        assert!(make_hello_v2_format(0x0303, None, &[]).is_err());
    }

    fn server_hello(cert: &[u8], suites: &[u32]) -> Vec<u8> {
        let len = 11 + cert.len() + 3 * suites.len() + 16;
        let mut out = (0x8000u16 | len as u16).to_be_bytes().to_vec();
        out.extend_from_slice(&[0x04, 0x00, 0x01, 0x00, 0x02]);
        out.extend_from_slice(&(cert.len() as u16).to_be_bytes());
        out.extend_from_slice(&((3 * suites.len()) as u16).to_be_bytes());
        out.extend_from_slice(&16u16.to_be_bytes());
        out.extend_from_slice(cert);
        for s in suites {
            out.extend_from_slice(&s.to_be_bytes()[1..]);
        }
        out.extend_from_slice(&[0xCC; 16]);
        out
    }

    #[tokio::test]
    async fn test_server_hello_parse() {
        let (mut client, mut server) = duplex(4096);
        let answer = server_hello(b"cert", &[SSL_CK_RC4_128_WITH_MD5, SSL_CK_DES_192_EDE3_CBC_WITH_MD5]);
        tokio::spawn(async move {
            let mut hello = [0u8; 48];
            server.read_exact(&mut hello).await.unwrap();
            server.write_all(&answer).await.unwrap();
        });
        let r = Ssl2Result::test_server(&mut client, Some(Duration::from_secs(5))).await.unwrap();
        assert_eq!(r.certificate, b"cert".to_vec());
        assert_eq!(r.cipher_suites, vec![SSL_CK_RC4_128_WITH_MD5, SSL_CK_DES_192_EDE3_CBC_WITH_MD5]);
    }

    #[tokio::test]
    async fn test_non_v2_answer_is_rejected() {
        let (mut client, mut server) = duplex(4096);
        server.write_all(&[0x15, 0x03, 0x01, 0x00, 0x02, 0x02, 0x28]).await.unwrap();
        let err = Ssl2Result::test_server(&mut client, None).await.unwrap_err();
        assert!(err.to_string().contains("not a SSLv2"));

        let (mut client, mut server) = duplex(4096);
        let mut bad = server_hello(b"", &[SSL_CK_RC4_128_WITH_MD5]);
        // suite list length not a multiple of 3
        bad.remove(13);
        bad[1] -= 1;
        bad[10] = 0x02;
        server.write_all(&bad).await.unwrap();
        assert!(Ssl2Result::test_server(&mut client, None).await.is_err());
    }
}
