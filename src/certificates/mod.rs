// Certificates module - X.509 decoding and chain analysis
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

pub mod algorithm;
pub mod chain;
pub mod x509;

pub use algorithm::AlgorithmIdentifier;
pub use chain::{CertificateChain, ChainEntry};
pub use x509::{Certificate, Extension, KeyType};
