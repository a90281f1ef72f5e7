// Proxy support - HTTP CONNECT tunnel, optionally over TLS to the proxy

use super::network::{BoxedStream, resolve_target};
use crate::Result;
use crate::error::ProbeError;
use anyhow::Context;
use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Default port of an HTTP proxy when none is given
pub const DEFAULT_PROXY_PORT: u16 = 3128;

/// Proxy configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    /// Talk TLS to the proxy itself
    pub tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyConfig {
    /// Parse proxy string (host[:port] or user:pass@host[:port])
    pub fn parse(proxy_str: &str) -> Result<Self> {
        let (username, password, hostport) = match proxy_str.rsplit_once('@') {
            Some((auth, hostport)) => match auth.split_once(':') {
                Some((u, p)) => (Some(u.to_string()), Some(p.to_string()), hostport),
                None => (Some(auth.to_string()), None, hostport),
            },
            None => (None, None, proxy_str),
        };
        let (host, port) = Self::parse_hostport(hostport)?;
        Ok(Self {
            host,
            port,
            tls: false,
            username,
            password,
        })
    }

    /// Parse host:port string; IPv6 literals go in brackets
    fn parse_hostport(hostport: &str) -> Result<(String, u16)> {
        if let Some(rest) = hostport.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').context("Unterminated IPv6 literal")?;
            let port = match tail.strip_prefix(':') {
                Some(p) => p.parse::<u16>().context("Invalid proxy port")?,
                None => DEFAULT_PROXY_PORT,
            };
            return Ok((host.to_string(), port));
        }
        match hostport.rsplit_once(':') {
            Some((host, port_str)) => {
                let port = port_str.parse::<u16>().context("Invalid proxy port")?;
                Ok((host.to_string(), port))
            }
            None => Ok((hostport.to_string(), DEFAULT_PROXY_PORT)),
        }
    }
}

/// Open a tunnel to the target through the proxy
pub async fn connect_via_proxy(proxy: &ProxyConfig, target_host: &str, target_port: u16) -> Result<BoxedStream> {
    let addr = resolve_target(&proxy.host, proxy.port).await?;
    let tcp = TcpStream::connect(addr)
        .await
        .with_context(|| format!("Could not connect to proxy {}:{}", proxy.host, proxy.port))?;
    tcp.set_nodelay(true)?;

    if proxy.tls {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();
        let connector = tokio_rustls::TlsConnector::from(Arc::new(config));
        let server_name = rustls::pki_types::ServerName::try_from(proxy.host.clone())
            .map_err(|_| anyhow::anyhow!("Invalid proxy name: {}", proxy.host))?;
        let mut tls = connector
            .connect(server_name, tcp)
            .await
            .context("TLS handshake with proxy failed")?;
        do_connect(&mut tls, proxy, target_host, target_port).await?;
        Ok(Box::new(tls))
    } else {
        let mut tcp = tcp;
        do_connect(&mut tcp, proxy, target_host, target_port).await?;
        Ok(Box::new(tcp))
    }
}

async fn do_connect<S>(stream: &mut S, proxy: &ProxyConfig, host: &str, port: u16) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = build_connect_request(host, port, &proxy.username, &proxy.password);
    stream.write_all(request.as_bytes()).await?;
    stream.flush().await?;
    let mut reader = ResponseReader::new(stream);
    reader.parse_response().await?;
    Ok(())
}

/// Build HTTP CONNECT request
fn build_connect_request(host: &str, port: u16, username: &Option<String>, password: &Option<String>) -> String {
    let dest = if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    };
    let mut request = format!("CONNECT {dest} HTTP/1.0\r\nHost: {dest}\r\n");

    if let (Some(user), Some(pass)) = (username, password) {
        use base64::{Engine as _, engine::general_purpose};
        let credentials = format!("{}:{}", user, pass);
        let encoded = general_purpose::STANDARD.encode(credentials.as_bytes());
        request.push_str(&format!("Proxy-Authorization: Basic {}\r\n", encoded));
    }

    request.push_str("\r\n");
    request
}

/// Byte-at-a-time reader for the proxy answer, so that nothing past the
/// header block is consumed. CR LF is folded into LF.
struct ResponseReader<'a, S> {
    stream: &'a mut S,
    delayed: Option<u8>,
}

impl<'a, S: AsyncRead + Unpin> ResponseReader<'a, S> {
    fn new(stream: &'a mut S) -> Self {
        Self { stream, delayed: None }
    }

    async fn next_char(&mut self) -> std::result::Result<u8, ProbeError> {
        if let Some(c) = self.delayed.take() {
            return Ok(c);
        }
        let c = self.stream.read_u8().await?;
        if c == b'\r' {
            let n = self.stream.read_u8().await?;
            if n != b'\n' {
                self.delayed = Some(n);
                return Ok(b'\r');
            }
            return Ok(b'\n');
        }
        Ok(c)
    }

    fn unexpected(c: u8) -> ProbeError {
        ProbeError::Proxy(format!("Unexpected character U+{:04X}", c))
    }

    async fn expect_str(&mut self, s: &str) -> std::result::Result<(), ProbeError> {
        for &b in s.as_bytes() {
            let c = self.next_char().await?;
            if c != b {
                return Err(Self::unexpected(c));
            }
        }
        Ok(())
    }

    /// Skip any digits, then expect `sep`
    async fn skip_digits_until(&mut self, sep: u8) -> std::result::Result<(), ProbeError> {
        loop {
            let c = self.next_char().await?;
            if c.is_ascii_digit() {
                continue;
            }
            if c != sep {
                return Err(Self::unexpected(c));
            }
            return Ok(());
        }
    }

    async fn digits(&mut self, count: usize) -> std::result::Result<u32, ProbeError> {
        let mut x = 0u32;
        for _ in 0..count {
            let c = self.next_char().await?;
            if !c.is_ascii_digit() {
                return Err(Self::unexpected(c));
            }
            x = x * 10 + (c - b'0') as u32;
        }
        Ok(x)
    }

    async fn parse_response(&mut self) -> std::result::Result<u32, ProbeError> {
        self.expect_str("HTTP/").await?;
        self.digits(1).await?;
        self.skip_digits_until(b'.').await?;
        self.digits(1).await?;
        self.skip_digits_until(b' ').await?;
        let code = self.digits(3).await?;
        if !(200..300).contains(&code) {
            return Err(ProbeError::Proxy(format!("Server rejected attempt with code {}", code)));
        }

        // drain headers up to the empty line
        let mut last_was_newline = false;
        loop {
            let c = self.next_char().await?;
            if c == b'\n' {
                if last_was_newline {
                    return Ok(code);
                }
                last_was_newline = true;
            } else {
                last_was_newline = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[test]
    fn test_parse_proxy_simple() {
        let proxy = ProxyConfig::parse("localhost:8080").unwrap();
        assert_eq!(proxy.host, "localhost");
        assert_eq!(proxy.port, 8080);
        assert!(proxy.username.is_none());
        assert!(!proxy.tls);
    }

    #[test]
    fn test_parse_proxy_with_auth() {
        let proxy = ProxyConfig::parse("user:pass@proxy.example.com:3128").unwrap();
        assert_eq!(proxy.host, "proxy.example.com");
        assert_eq!(proxy.port, 3128);
        assert_eq!(proxy.username.as_deref(), Some("user"));
        assert_eq!(proxy.password.as_deref(), Some("pass"));
    }

    #[test]
    fn test_parse_proxy_default_port() {
        let proxy = ProxyConfig::parse("proxy.local").unwrap();
        assert_eq!(proxy.port, DEFAULT_PROXY_PORT);
        let proxy = ProxyConfig::parse("[::1]:8888").unwrap();
        assert_eq!(proxy.host, "::1");
        assert_eq!(proxy.port, 8888);
        assert!(ProxyConfig::parse("proxy:http").is_err());
    }

    #[test]
    fn test_build_connect_request() {
        let request = build_connect_request("example.com", 443, &None, &None);
        assert_eq!(request, "CONNECT example.com:443 HTTP/1.0\r\nHost: example.com:443\r\n\r\n");
        let request = build_connect_request("example.com", 443, &Some("u".into()), &Some("p".into()));
        assert!(request.contains("Proxy-Authorization: Basic dTpw\r\n"));
    }

    async fn answer(text: &[u8]) -> std::result::Result<u32, ProbeError> {
        let (mut client, mut server) = duplex(1024);
        server.write_all(text).await.unwrap();
        drop(server);
        ResponseReader::new(&mut client).parse_response().await
    }

    #[tokio::test]
    async fn test_connect_response() {
        let code = answer(b"HTTP/1.1 200 Connection established\r\nVia: x\r\n\r\n").await.unwrap();
        assert_eq!(code, 200);
        // bare LF line endings
        assert!(answer(b"HTTP/1.0 204 OK\n\n").await.is_ok());

        let err = answer(b"HTTP/1.1 407 Auth\r\n\r\n").await.unwrap_err();
        assert!(err.to_string().contains("code 407"));
        assert!(answer(b"SSH-2.0-OpenSSH\r\n").await.is_err());
        // headers never terminated
        assert!(answer(b"HTTP/1.1 200 OK\r\nVia: x\r\n").await.is_err());
    }

    #[tokio::test]
    async fn test_nothing_past_headers_is_consumed() {
        let (mut client, mut server) = duplex(1024);
        server.write_all(b"HTTP/1.0 200 OK\r\n\r\n\x16\x03").await.unwrap();
        ResponseReader::new(&mut client).parse_response().await.unwrap();
        let mut rest = [0u8; 2];
        client.read_exact(&mut rest).await.unwrap();
        assert_eq!(rest, [0x16, 0x03]);
    }
}
