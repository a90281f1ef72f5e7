// Probe configuration
//
// Everything the orchestrator needs to know about one analysis run. The CLI
// builds one from its arguments; tests build them directly.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ProbeError, ProbeResult};
use crate::protocols::Protocol;
use crate::protocols::handshake::validate_server_name;
use crate::utils::network::{DEFAULT_PORT, Target};
use crate::utils::proxy::ProxyConfig;

/// Default read timeout, applied until the server first answers
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(20);

/// Which server name goes into the SNI extension
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SniMode {
    /// Use the target host name
    #[default]
    Auto,
    /// Send no SNI extension
    None,
    /// Send this name
    Explicit(String),
}

impl SniMode {
    /// `-` suppresses SNI, anything else is sent as is
    pub fn parse(value: &str) -> Self {
        if value == "-" {
            SniMode::None
        } else {
            SniMode::Explicit(value.to_string())
        }
    }

    /// Name actually sent for the given host
    pub fn resolve(&self, host: &str) -> Option<String> {
        match self {
            SniMode::Auto => Some(host.to_string()),
            SniMode::None => None,
            SniMode::Explicit(name) => Some(name.clone()),
        }
    }
}

/// Configuration of a single analysis run
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Server host name or address
    pub host: String,
    pub port: u16,
    /// Lowest version to test
    pub min_version: Protocol,
    /// Highest version to test
    pub max_version: Protocol,
    pub sni: SniMode,
    /// Try every 16-bit suite id instead of the registered ones
    pub all_suites: bool,
    /// Announce every known curve by default
    pub add_ec_ext: bool,
    pub proxy: Option<ProxyConfig>,
    /// Read timeout until the server first answers; None waits forever
    pub read_timeout: Option<Duration>,
    /// Pause before each new connection
    pub connection_wait: Option<Duration>,
    /// Hex dump of all traffic goes there
    pub debug_log: Option<PathBuf>,
    pub verbose: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            min_version: Protocol::SSLv2,
            max_version: Protocol::TLS12,
            sni: SniMode::Auto,
            all_suites: false,
            add_ec_ext: true,
            proxy: None,
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
            connection_wait: None,
            debug_log: None,
            verbose: false,
        }
    }
}

impl ProbeConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_version_range(mut self, min: Protocol, max: Protocol) -> Self {
        self.min_version = min;
        self.max_version = max;
        self
    }

    pub fn with_sni(mut self, sni: SniMode) -> Self {
        self.sni = sni;
        self
    }

    pub fn with_all_suites(mut self, enabled: bool) -> Self {
        self.all_suites = enabled;
        self
    }

    pub fn with_ec_extension(mut self, enabled: bool) -> Self {
        self.add_ec_ext = enabled;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_connection_wait(mut self, wait: Option<Duration>) -> Self {
        self.connection_wait = wait;
        self
    }

    pub fn with_debug_log(mut self, path: Option<PathBuf>) -> Self {
        self.debug_log = path;
        self
    }

    pub fn target(&self) -> Target {
        Target {
            hostname: self.host.clone(),
            port: self.port,
        }
    }

    /// Server name for the SNI extension
    pub fn server_name(&self) -> Option<String> {
        self.sni.resolve(&self.host)
    }

    /// Reject inconsistent settings before any connection is made
    pub fn validate(&self) -> ProbeResult<()> {
        if self.host.is_empty() {
            return Err(ProbeError::Config("no host name".to_string()));
        }
        if self.min_version > self.max_version {
            return Err(ProbeError::Config(format!(
                "minimum version {} is above maximum version {}",
                self.min_version, self.max_version
            )));
        }
        if let Some(name) = self.server_name() {
            validate_server_name(&name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sni_modes() {
        assert_eq!(SniMode::parse("-"), SniMode::None);
        assert_eq!(SniMode::parse("www.example.org"), SniMode::Explicit("www.example.org".into()));

        let config = ProbeConfig::new("example.com", 443);
        assert_eq!(config.server_name().as_deref(), Some("example.com"));
        let config = config.with_sni(SniMode::None);
        assert_eq!(config.server_name(), None);
    }

    #[test]
    fn test_defaults() {
        let config = ProbeConfig::new("example.com", 8443);
        assert_eq!(config.port, 8443);
        assert_eq!(config.min_version, Protocol::SSLv2);
        assert_eq!(config.max_version, Protocol::TLS12);
        assert!(config.add_ec_ext);
        assert!(!config.all_suites);
        assert_eq!(config.read_timeout, Some(DEFAULT_READ_TIMEOUT));
        assert!(config.validate().is_ok());
        assert_eq!(config.target().to_string(), "example.com:8443");
    }

    #[test]
    fn test_validate() {
        let config = ProbeConfig::new("example.com", 443).with_version_range(Protocol::TLS12, Protocol::SSLv3);
        assert!(matches!(config.validate(), Err(ProbeError::Config(_))));

        let config = ProbeConfig::new("example.com", 443).with_sni(SniMode::Explicit("bad name".into()));
        assert!(config.validate().is_err());

        // bare IP literals are accepted as SNI values
        let config = ProbeConfig::new("192.0.2.1", 443);
        assert!(config.validate().is_ok());

        assert!(ProbeConfig::default().validate().is_err());
    }
}
