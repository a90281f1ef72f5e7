// ASN.1 module - Generic DER element tree, decoder and encoder
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

//! Minimal DER toolkit used by the certificate and distinguished-name
//! decoders.
//!
//! An [`Element`] is a tagged node holding either raw primitive bytes or an
//! ordered list of sub-elements. Decoding is strict DER: indefinite lengths,
//! non-minimal length or tag encodings and trailing garbage are rejected.
//! Typed accessors (`get_oid`, `get_string`, `get_time`, ...) fail with a
//! [`ProbeError::Decode`](crate::error::ProbeError::Decode) when the tag does
//! not match, so callers can stay declarative.

mod der;
mod element;
pub mod oid;
mod strings;

pub use element::{Element, TagClass};
pub use strings::is_printable;

/// Universal tag numbers
pub mod tag {
    pub const BOOLEAN: u32 = 1;
    pub const INTEGER: u32 = 2;
    pub const BIT_STRING: u32 = 3;
    pub const OCTET_STRING: u32 = 4;
    pub const NULL: u32 = 5;
    pub const OBJECT_IDENTIFIER: u32 = 6;
    pub const UTF8_STRING: u32 = 12;
    pub const SEQUENCE: u32 = 16;
    pub const SET: u32 = 17;
    pub const NUMERIC_STRING: u32 = 18;
    pub const PRINTABLE_STRING: u32 = 19;
    pub const TELETEX_STRING: u32 = 20;
    pub const IA5_STRING: u32 = 22;
    pub const UTC_TIME: u32 = 23;
    pub const GENERALIZED_TIME: u32 = 24;
    pub const VISIBLE_STRING: u32 = 26;
    pub const UNIVERSAL_STRING: u32 = 28;
    pub const BMP_STRING: u32 = 30;
}

/// Nesting limit for decoding; real certificates stay far below it
pub(crate) const MAX_DEPTH: usize = 64;
