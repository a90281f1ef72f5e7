// Data module - Embedded registry tables

pub mod curves;

pub use curves::{NamedCurve, PKIX_CURVES, PkixCurveDatabase, TLS_CURVES, TlsCurve, TlsCurveDatabase};
