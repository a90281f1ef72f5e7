// CLI module - Command line interface and argument parsing
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use clap::Parser;
use std::path::Path;
use std::time::Duration;

mod connection_args;
mod output_args;

pub use connection_args::ConnectionArgs;
pub use output_args::OutputArgs;

use crate::protocols::Protocol;
use crate::scanner::{ProbeConfig, SniMode};
use crate::utils::network::Target;
use crate::utils::proxy::ProxyConfig;

/// sslprobe - SSL/TLS server analyzer
///
/// Connects many times to the server with hand-built ClientHello messages
/// and reports supported versions, cipher suites, certificates, key
/// exchange parameters and the resulting warnings.
#[derive(Parser, Debug, Clone)]
#[command(author, version, long_about = None)]
#[command(name = "sslprobe")]
#[command(about = "SSL/TLS server analyzer (SSLv2 to TLS 1.2)", long_about = None)]
pub struct Args {
    /// Server to analyze
    #[arg(value_name = "HOST[:PORT]")]
    pub target: String,

    /// Server name for the SNI extension ("-" to send none)
    #[arg(long = "sni", value_name = "NAME")]
    pub sni: Option<String>,

    /// Try all 65533 possible suite ids, not only the registered ones
    #[arg(long = "all")]
    pub all_suites: bool,

    /// Lowest version to test (ssl2, ssl3, tls10, tls11, tls12)
    #[arg(long = "min", value_name = "VERSION", default_value = "ssl2")]
    pub min_version: Protocol,

    /// Highest version to test
    #[arg(long = "max", value_name = "VERSION", default_value = "tls12")]
    pub max_version: Protocol,

    /// Always send the supported curves extension (default)
    #[arg(long = "ec", overrides_with = "no_ec")]
    pub ec: bool,

    /// Send the supported curves extension only when probing curves
    #[arg(long = "no-ec", overrides_with = "ec")]
    pub no_ec: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

impl Args {
    /// Build the probe configuration
    pub fn to_config(&self) -> anyhow::Result<ProbeConfig> {
        let target = Target::parse(&self.target)?;
        let proxy = match &self.connection.proxy {
            Some(spec) => {
                let mut proxy = ProxyConfig::parse(spec)?;
                proxy.tls = self.connection.proxy_ssl;
                Some(proxy)
            }
            None => None,
        };
        let read_timeout = match self.connection.read_timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let mut config = ProbeConfig::new(target.hostname, target.port)
            .with_version_range(self.min_version, self.max_version)
            .with_sni(self.sni.as_deref().map_or(SniMode::Auto, SniMode::parse))
            .with_all_suites(self.all_suites)
            .with_ec_extension(!self.no_ec)
            .with_proxy(proxy)
            .with_read_timeout(read_timeout)
            .with_connection_wait(self.connection.wait.map(Duration::from_millis))
            .with_debug_log(self.output.log.clone());
        config.verbose = self.output.verbose;
        config.validate()?;
        Ok(config)
    }

    pub fn json_to_stdout(&self) -> bool {
        self.output.json.as_deref() == Some(Path::new("-"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("sslprobe").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["example.com"]);
        let config = args.to_config().unwrap();
        assert_eq!(config.host, "example.com");
        assert_eq!(config.port, 443);
        assert_eq!(config.min_version, Protocol::SSLv2);
        assert_eq!(config.max_version, Protocol::TLS12);
        assert_eq!(config.sni, SniMode::Auto);
        assert!(config.add_ec_ext);
        assert_eq!(config.read_timeout, Some(Duration::from_secs(20)));
        assert!(args.output.text_to_stdout());
        assert!(!args.json_to_stdout());
    }

    #[test]
    fn test_full_command_line() {
        let args = parse(&[
            "--sni", "-", "--all", "--min", "tls1.0", "--max", "TLSv1.1", "--no-ec", "-t", "0", "-w", "250",
            "--proxy", "proxy.local:8080", "--proxy-ssl", "--json", "-", "--certs", "-v", "[::1]:8443",
        ]);
        let config = args.to_config().unwrap();
        assert_eq!(config.host, "::1");
        assert_eq!(config.port, 8443);
        assert_eq!(config.sni, SniMode::None);
        assert!(config.all_suites);
        assert_eq!(config.min_version, Protocol::TLS10);
        assert_eq!(config.max_version, Protocol::TLS11);
        assert!(!config.add_ec_ext);
        assert_eq!(config.read_timeout, None);
        assert_eq!(config.connection_wait, Some(Duration::from_millis(250)));
        let proxy = config.proxy.unwrap();
        assert_eq!(proxy.port, 8080);
        assert!(proxy.tls);
        assert!(config.verbose);
        assert!(args.output.certs);
        assert!(args.json_to_stdout());
        assert!(!args.output.text_to_stdout());
    }

    #[test]
    fn test_ec_flags_override() {
        assert!(!parse(&["--ec", "--no-ec", "example.com"]).to_config().unwrap().add_ec_ext);
        assert!(parse(&["--no-ec", "--ec", "example.com"]).to_config().unwrap().add_ec_ext);
    }

    #[test]
    fn test_rejected_arguments() {
        assert!(Args::try_parse_from(["sslprobe", "--min", "tls13", "example.com"]).is_err());
        assert!(Args::try_parse_from(["sslprobe", "--proxy-ssl", "example.com"]).is_err());
        assert!(parse(&["--min", "tls12", "--max", "ssl3", "example.com"]).to_config().is_err());
        assert!(parse(&["example.com:http"]).to_config().is_err());
    }
}
