// Error types for sslprobe
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// Every failure a single probe connection can hit is one of these variants.
// The orchestrator matches on them to decide how the enumeration continues.

use std::io;
use thiserror::Error;

/// Failure of a probe connection, a codec or a decoder
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Peer sent a fatal alert; carries the alert description code
    #[error("SSL alert received: {} ({})", alert_name(*.0), .0)]
    Alert(u8),

    /// Read deadline expired; the connection must be discarded
    #[error("Read timeout")]
    Timeout,

    /// Malformed framing or message in the handshake
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Malformed ASN.1, X.509 or distinguished-name data
    #[error("Decode error: {0}")]
    Decode(String),

    /// Transport-level I/O failure (including unexpected EOF)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// HTTP CONNECT proxy refused or mangled the tunnel
    #[error("Proxy error: {0}")]
    Proxy(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result alias for codec and decoder operations
pub type ProbeResult<T> = std::result::Result<T, ProbeError>;

impl ProbeError {
    /// True for errors that prove the peer speaks SSL/TLS
    pub fn is_alert(&self) -> bool {
        matches!(self, ProbeError::Alert(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProbeError::Timeout)
    }
}

impl From<tokio::time::error::Elapsed> for ProbeError {
    fn from(_err: tokio::time::error::Elapsed) -> Self {
        ProbeError::Timeout
    }
}

/// Symbolic name of a TLS alert description code
pub fn alert_name(code: u8) -> &'static str {
    match code {
        0 => "close_notify",
        10 => "unexpected_message",
        20 => "bad_record_mac",
        21 => "decryption_failed",
        22 => "record_overflow",
        30 => "decompression_failure",
        40 => "handshake_failure",
        41 => "no_certificate",
        42 => "bad_certificate",
        43 => "unsupported_certificate",
        44 => "certificate_revoked",
        45 => "certificate_expired",
        46 => "certificate_unknown",
        47 => "illegal_parameter",
        48 => "unknown_ca",
        49 => "access_denied",
        50 => "decode_error",
        51 => "decrypt_error",
        60 => "export_restriction",
        70 => "protocol_version",
        71 => "insufficient_security",
        80 => "internal_error",
        86 => "inappropriate_fallback",
        90 => "user_canceled",
        100 => "no_renegotiation",
        110 => "unsupported_extension",
        112 => "unrecognized_name",
        _ => "unknown",
    }
}

/// Return early with a protocol error
#[macro_export]
macro_rules! probe_bail {
    ($msg:literal $(,)?) => {
        return Err($crate::error::ProbeError::Protocol($msg.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::error::ProbeError::Protocol(format!($fmt, $($arg)*)))
    };
}

/// Return early with a decode error
#[macro_export]
macro_rules! decode_bail {
    ($msg:literal $(,)?) => {
        return Err($crate::error::ProbeError::Decode($msg.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::error::ProbeError::Decode(format!($fmt, $($arg)*)))
    };
}
