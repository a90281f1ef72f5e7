// Connection configuration arguments
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use clap::Args;

/// Connection, timing and proxy options
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Read timeout in seconds until the server first answers (0 = none)
    #[arg(short = 't', long = "read-timeout", value_name = "SECONDS", default_value = "20")]
    pub read_timeout: u64,

    /// Wait this many milliseconds before each connection
    #[arg(short = 'w', long = "wait", value_name = "MSEC")]
    pub wait: Option<u64>,

    /// Connect through an HTTP proxy (CONNECT method)
    #[arg(long = "proxy", value_name = "HOST[:PORT]")]
    pub proxy: Option<String>,

    /// Use TLS towards the proxy itself
    #[arg(long = "proxy-ssl", requires = "proxy")]
    pub proxy_ssl: bool,
}

impl Default for ConnectionArgs {
    fn default() -> Self {
        Self {
            read_timeout: 20,
            wait: None,
            proxy: None,
            proxy_ssl: false,
        }
    }
}
