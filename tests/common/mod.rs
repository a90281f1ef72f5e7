// Shared helpers for integration tests: certificate construction and a
// scripted SSL/TLS server on the loopback interface

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use sslprobe::asn1::{Element, TagClass};
use sslprobe::certificates::AlgorithmIdentifier;
use sslprobe::x500::DistinguishedName;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const SHA256_WITH_RSA: &str = "1.2.840.113549.1.1.11";
pub const SHA1_WITH_RSA: &str = "1.2.840.113549.1.1.5";
pub const MD5_WITH_RSA: &str = "1.2.840.113549.1.1.4";
pub const ECDSA_WITH_SHA384: &str = "1.2.840.10045.4.3.3";
const OID_SUBJECT_ALT_NAME: &str = "2.5.29.17";

/// Subject public key for test certificates
#[derive(Debug, Clone, Copy)]
pub enum TestKey {
    /// RSA with a modulus of the given size in bits (multiple of 8)
    Rsa(usize),
    /// EC key on P-256
    P256,
}

impl TestKey {
    fn to_asn1(self) -> Element {
        match self {
            TestKey::Rsa(bits) => {
                let mut modulus = vec![0xC5; bits / 8];
                if let Some(last) = modulus.last_mut() {
                    *last = 0x01;
                }
                let key = Element::sequence(vec![Element::unsigned_integer(&modulus), Element::integer(65537)]);
                Element::sequence(vec![
                    AlgorithmIdentifier::new("1.2.840.113549.1.1.1", Some(Element::null()))
                        .to_asn1()
                        .unwrap(),
                    Element::bit_string(&key.encode()),
                ])
            }
            TestKey::P256 => {
                let mut point = vec![0x04];
                point.extend_from_slice(&[0x5A; 64]);
                Element::sequence(vec![
                    AlgorithmIdentifier::new("1.2.840.10045.2.1", Some(Element::oid("1.2.840.10045.3.1.7").unwrap()))
                        .to_asn1()
                        .unwrap(),
                    Element::bit_string(&point),
                ])
            }
        }
    }
}

/// Parameters of a synthetic certificate
#[derive(Debug, Clone)]
pub struct TestCert<'a> {
    pub subject: &'a str,
    pub issuer: &'a str,
    pub serial: u64,
    pub sign_oid: &'a str,
    pub key: TestKey,
    pub dns_names: &'a [&'a str],
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl<'a> TestCert<'a> {
    pub fn new(subject: &'a str, issuer: &'a str) -> Self {
        Self {
            subject,
            issuer,
            serial: 0x1234,
            sign_oid: SHA256_WITH_RSA,
            key: TestKey::Rsa(2048),
            dns_names: &[],
            not_before: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            not_after: Utc.with_ymd_and_hms(2034, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    /// DER encoding; the signature value is filler
    pub fn to_der(&self) -> Vec<u8> {
        let sign_alg = AlgorithmIdentifier::new(self.sign_oid, None).to_asn1().unwrap();
        let mut tbs = vec![
            Element::explicit(0, Element::integer(2)),
            Element::integer(self.serial),
            sign_alg.clone(),
            DistinguishedName::parse(self.issuer).unwrap().to_asn1().unwrap(),
            Element::sequence(vec![Element::time(&self.not_before), Element::time(&self.not_after)]),
            DistinguishedName::parse(self.subject).unwrap().to_asn1().unwrap(),
            self.key.to_asn1(),
        ];
        if !self.dns_names.is_empty() {
            let names = Element::sequence(
                self.dns_names
                    .iter()
                    .map(|n| Element::primitive(TagClass::Context, 2, n.as_bytes()))
                    .collect(),
            );
            let san = Element::sequence(vec![
                Element::oid(OID_SUBJECT_ALT_NAME).unwrap(),
                Element::octet_string(names.encode()),
            ]);
            tbs.push(Element::explicit(3, Element::sequence(vec![san])));
        }
        Element::sequence(vec![Element::sequence(tbs), sign_alg, Element::bit_string(&[0xAB; 64])]).encode()
    }
}

/// Behavior of the scripted server
#[derive(Debug, Clone)]
pub struct FakeServer {
    /// Highest version the server negotiates
    pub max_version: u16,
    /// The only suite the server accepts
    pub suite: u16,
    /// Answer SSLv2 hellos with a ServerHello listing no suite
    pub empty_ssl2: bool,
    /// Accept ClientHellos in SSLv2 format
    pub accept_v2_hello: bool,
    /// Select `suite` even when the client did not offer it
    pub always: bool,
    /// Certificates sent in the Certificate message
    pub chain: Vec<Vec<u8>>,
}

impl FakeServer {
    /// Bind on an ephemeral loopback port and serve connections until the
    /// test ends
    pub async fn spawn(self) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let server = self.clone();
                tokio::spawn(async move {
                    let _ = server.serve(stream).await;
                });
            }
        });
        port
    }

    async fn serve(&self, mut stream: TcpStream) -> std::io::Result<()> {
        let mut header = [0u8; 5];
        stream.read_exact(&mut header).await?;

        let reply = if header[0] & 0x80 != 0 {
            let len = (usize::from(header[0] & 0x7F) << 8) | usize::from(header[1]);
            let mut body = vec![0u8; len - 3];
            stream.read_exact(&mut body).await?;
            let version = u16::from_be_bytes([header[3], header[4]]);
            self.answer_v2(version, &body)
        } else if header[0] == 22 {
            let hello = read_handshake_message(&mut stream, header).await?;
            self.answer_client_hello(&hello)
        } else {
            None
        };

        if let Some(reply) = reply {
            stream.write_all(&reply).await?;
            stream.flush().await?;
            // hold the connection until the client is done with it
            let mut sink = [0u8; 256];
            while stream.read(&mut sink).await? > 0 {}
        }
        Ok(())
    }

    fn answer_v2(&self, version: u16, body: &[u8]) -> Option<Vec<u8>> {
        if version == 0x0002 {
            if !self.empty_ssl2 {
                return None;
            }
            // no certificate, no suite, 16-byte connection id
            let mut out = (0x8000u16 | 27).to_be_bytes().to_vec();
            out.extend_from_slice(&[0x04, 0x00, 0x01, 0x00, 0x02, 0, 0, 0, 0, 0, 16]);
            out.extend_from_slice(&[0x42; 16]);
            return Some(out);
        }
        if !self.accept_v2_hello {
            return None;
        }
        let cs_len = usize::from(u16::from_be_bytes([body[0], body[1]]));
        let offered = body[6..6 + cs_len]
            .chunks(3)
            .any(|c| c[0] == 0 && u16::from_be_bytes([c[1], c[2]]) == self.suite);
        Some(self.flight_or_alert(version, offered || self.always))
    }

    fn answer_client_hello(&self, hello: &[u8]) -> Option<Vec<u8>> {
        if hello.first() != Some(&1) {
            return None;
        }
        let version = u16::from_be_bytes([hello[4], hello[5]]);
        let mut off = 4 + 2 + 32;
        off += 1 + usize::from(hello[off]);
        let cs_len = usize::from(u16::from_be_bytes([hello[off], hello[off + 1]]));
        let offered = hello[off + 2..off + 2 + cs_len]
            .chunks(2)
            .any(|c| u16::from_be_bytes([c[0], c[1]]) == self.suite);
        Some(self.flight_or_alert(version, offered || self.always))
    }

    fn flight_or_alert(&self, client_version: u16, offered: bool) -> Vec<u8> {
        let version = client_version.min(self.max_version);
        if !offered {
            // fatal handshake_failure
            let mut out = vec![21];
            out.extend_from_slice(&version.to_be_bytes());
            out.extend_from_slice(&[0, 2, 2, 40]);
            return out;
        }

        let mut sh = version.to_be_bytes().to_vec();
        let now = Utc::now().timestamp() as u32;
        sh.extend_from_slice(&now.to_be_bytes());
        sh.extend_from_slice(&[0x17; 28]);
        sh.push(0);
        sh.extend_from_slice(&self.suite.to_be_bytes());
        sh.push(0);

        let mut certs = Vec::new();
        for der in &self.chain {
            certs.extend_from_slice(&u24(der.len()));
            certs.extend_from_slice(der);
        }
        let mut cm = u24(certs.len()).to_vec();
        cm.extend_from_slice(&certs);

        let mut flight = handshake_message(2, &sh);
        flight.extend_from_slice(&handshake_message(11, &cm));
        flight.extend_from_slice(&handshake_message(14, &[]));

        let mut out = vec![22];
        out.extend_from_slice(&version.to_be_bytes());
        out.extend_from_slice(&(flight.len() as u16).to_be_bytes());
        out.extend_from_slice(&flight);
        out
    }
}

/// Reassemble one handshake message that may span several records
async fn read_handshake_message(stream: &mut TcpStream, mut header: [u8; 5]) -> std::io::Result<Vec<u8>> {
    let mut msg = Vec::new();
    loop {
        let len = usize::from(u16::from_be_bytes([header[3], header[4]]));
        let mut frag = vec![0u8; len];
        stream.read_exact(&mut frag).await?;
        msg.extend_from_slice(&frag);
        if msg.len() >= 4 {
            let want = 4 + ((usize::from(msg[1]) << 16) | (usize::from(msg[2]) << 8) | usize::from(msg[3]));
            if msg.len() >= want {
                return Ok(msg);
            }
        }
        stream.read_exact(&mut header).await?;
    }
}

fn u24(n: usize) -> [u8; 3] {
    [(n >> 16) as u8, (n >> 8) as u8, n as u8]
}

fn handshake_message(msg_type: u8, body: &[u8]) -> Vec<u8> {
    let mut out = vec![msg_type];
    out.extend_from_slice(&u24(body.len()));
    out.extend_from_slice(body);
    out
}
