// Network utilities - target parsing, resolution and connection setup

use super::proxy::{ProxyConfig, connect_via_proxy};
use crate::Result;
use anyhow::Context;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Byte stream towards the server, whatever the transport
pub trait ProbeStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ProbeStream for T {}

pub type BoxedStream = Box<dyn ProbeStream>;

/// Default port of the analyzed server
pub const DEFAULT_PORT: u16 = 443;

/// Server to analyze
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub hostname: String,
    pub port: u16,
}

impl Target {
    /// Parse `host`, `host:port` or `[ipv6]:port`
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            anyhow::bail!("Empty target");
        }
        let (hostname, port) = if let Some(rest) = input.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').context("Unterminated IPv6 literal")?;
            let port = match tail.strip_prefix(':') {
                Some(p) => parse_port(p)?,
                None if tail.is_empty() => DEFAULT_PORT,
                None => anyhow::bail!("Invalid target: {}", input),
            };
            (host.to_string(), port)
        } else if input.matches(':').count() > 1 {
            // bare IPv6 address
            (input.to_string(), DEFAULT_PORT)
        } else if let Some((host, port_str)) = input.rsplit_once(':') {
            (host.to_string(), parse_port(port_str)?)
        } else {
            (input.to_string(), DEFAULT_PORT)
        };
        if hostname.is_empty() {
            anyhow::bail!("Invalid target: {}", input);
        }
        Ok(Self { hostname, port })
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.hostname.contains(':') {
            write!(f, "[{}]:{}", self.hostname, self.port)
        } else {
            write!(f, "{}:{}", self.hostname, self.port)
        }
    }
}

/// Parse port from string
pub fn parse_port(port_str: &str) -> Result<u16> {
    port_str.parse::<u16>().context("Invalid port number")
}

/// First address the name resolves to
pub async fn resolve_target(host: &str, port: u16) -> Result<SocketAddr> {
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("DNS lookup failed for {}", host))?;
    addrs
        .next()
        .with_context(|| format!("No IP addresses found for {}", host))
}

/// Open a fresh connection to the target, after the optional inter-connection
/// delay, directly or through an HTTP proxy
pub async fn open_connection(target: &Target, proxy: Option<&ProxyConfig>, wait: Option<Duration>) -> Result<BoxedStream> {
    if let Some(wait) = wait {
        tokio::time::sleep(wait).await;
    }
    match proxy {
        Some(proxy) => connect_via_proxy(proxy, &target.hostname, target.port).await,
        None => {
            let addr = resolve_target(&target.hostname, target.port).await?;
            let stream = TcpStream::connect(addr)
                .await
                .with_context(|| format!("Could not connect to {}", target))?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream))
        }
    }
}
