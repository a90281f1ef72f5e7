// sslprobe - SSL/TLS server analyzer
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

//! sslprobe analyzes SSL/TLS servers by speaking the handshake directly:
//! it builds ClientHello messages byte by byte, parses whatever the server
//! answers up to ServerHelloDone, and never completes a key exchange. This
//! lets it see SSLv2, export and unknown cipher suites, explicit curves and
//! other things a regular TLS library refuses to negotiate.

pub mod asn1;
pub mod certificates;
pub mod ciphers;
pub mod cli;
pub mod data;
pub mod error;
pub mod protocols;
pub mod report;
pub mod scanner;
pub mod utils;
pub mod x500;

// Re-export commonly used types
pub use crate::cli::Args;
pub use crate::error::{ProbeError, ProbeResult};
pub use crate::report::Report;
pub use crate::scanner::{ProbeConfig, Prober};

/// Result type for sslprobe operations
pub type Result<T> = anyhow::Result<T>;

/// Error type for sslprobe operations
pub use anyhow::Error;
