// Named curve registries - Parses tls-curves.txt and pkix-curves.txt

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use std::collections::BTreeMap;
use std::sync::Arc;

lazy_static! {
    /// Curves by TLS supported_groups id
    pub static ref TLS_CURVES: Arc<TlsCurveDatabase> = Arc::new(
        TlsCurveDatabase::load().expect("Failed to load TLS curve registry")
    );

    /// Curves by certificate namedCurve OID
    pub static ref PKIX_CURVES: Arc<PkixCurveDatabase> = Arc::new(
        PkixCurveDatabase::load().expect("Failed to load PKIX curve registry")
    );
}

/// A named elliptic curve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedCurve {
    pub name: String,
    /// Bit length of the subgroup order
    pub size: u32,
}

/// Curve registered under a 16-bit TLS identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsCurve {
    pub id: u16,
    pub curve: NamedCurve,
}

/// Split `key size name...` where the name may contain spaces
fn split_line(line: &str) -> Result<(&str, u32, String)> {
    let mut it = line.split_whitespace();
    let key = it.next().context("missing key")?;
    let size = it
        .next()
        .context("missing size")?
        .parse::<u32>()
        .context("invalid size")?;
    let name = it.collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        anyhow::bail!("missing curve name");
    }
    Ok((key, size, name))
}

fn data_lines(data: &str) -> impl Iterator<Item = (usize, &str)> {
    data.lines()
        .enumerate()
        .map(|(n, l)| (n + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
}

/// TLS curve registry, ordered by id
pub struct TlsCurveDatabase {
    by_id: BTreeMap<u16, TlsCurve>,
}

impl TlsCurveDatabase {
    pub fn load() -> Result<Self> {
        Self::parse(include_str!("../../data/tls-curves.txt"))
    }

    /// Format: `id size name`
    pub fn parse(data: &str) -> Result<Self> {
        let mut by_id = BTreeMap::new();
        for (line_num, line) in data_lines(data) {
            let (key, size, name) =
                split_line(line).with_context(|| format!("tls-curves.txt line {}", line_num))?;
            let id: u16 = key
                .parse()
                .with_context(|| format!("tls-curves.txt line {}: invalid id", line_num))?;
            let curve = TlsCurve {
                id,
                curve: NamedCurve { name, size },
            };
            if by_id.insert(id, curve).is_some() {
                anyhow::bail!("tls-curves.txt line {}: duplicate curve id {}", line_num, id);
            }
        }
        Ok(Self { by_id })
    }

    pub fn get(&self, id: u16) -> Option<&TlsCurve> {
        self.by_id.get(&id)
    }

    /// All registered ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.by_id.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// PKIX curve registry, keyed by dotted OID
pub struct PkixCurveDatabase {
    by_oid: BTreeMap<String, NamedCurve>,
}

impl PkixCurveDatabase {
    pub fn load() -> Result<Self> {
        Self::parse(include_str!("../../data/pkix-curves.txt"))
    }

    /// Format: `oid size name`
    pub fn parse(data: &str) -> Result<Self> {
        let mut by_oid = BTreeMap::new();
        for (line_num, line) in data_lines(data) {
            let (oid, size, name) =
                split_line(line).with_context(|| format!("pkix-curves.txt line {}", line_num))?;
            if !crate::asn1::oid::is_valid(oid) {
                anyhow::bail!("pkix-curves.txt line {}: invalid OID {}", line_num, oid);
            }
            if by_oid.insert(oid.to_string(), NamedCurve { name, size }).is_some() {
                anyhow::bail!("pkix-curves.txt line {}: duplicate OID {}", line_num, oid);
            }
        }
        Ok(Self { by_oid })
    }

    pub fn get(&self, oid: &str) -> Option<&NamedCurve> {
        self.by_oid.get(oid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tls_registry_loads() {
        let p256 = TLS_CURVES.get(23).unwrap();
        assert_eq!(p256.curve.size, 256);
        assert_eq!(p256.curve.name, "secp256r1 (P-256)");
        assert_eq!(TLS_CURVES.ids().next(), Some(1));
        assert!(TLS_CURVES.get(0xFF01).is_none());
    }

    #[test]
    fn test_pkix_registry_loads() {
        let p384 = PKIX_CURVES.get("1.3.132.0.34").unwrap();
        assert_eq!(p384.size, 384);
        assert!(PKIX_CURVES.get("1.2.3.4").is_none());
    }

    #[test]
    fn test_parse_rejects_duplicates_and_garbage() {
        assert!(TlsCurveDatabase::parse("1 163 a\n1 163 b\n").is_err());
        assert!(TlsCurveDatabase::parse("x 163 a\n").is_err());
        assert!(PkixCurveDatabase::parse("1.2.3 12\n").is_err());
        let db = TlsCurveDatabase::parse("# comment\n\n7 232 sect233r1 (B-233)\n").unwrap();
        assert_eq!(db.len(), 1);
    }
}
