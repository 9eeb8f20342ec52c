//! Identity types for the vellum engine
//!
//! All identifiers are 64-bit for wire efficiency while maintaining
//! sufficient uniqueness for practical scene sizes. On the wire they are
//! rendered as fixed-width hex strings so that id-keyed maps serialize as
//! plain JSON objects.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Element identity - stable for the lifetime of the element
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ElementId(pub u64);

impl ElementId {
    pub const ZERO: ElementId = ElementId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        ElementId(id)
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        ElementId(u64::from_le_bytes(bytes))
    }
}

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Element({:016x})", self.0)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Group identity - a named grouping of elements
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GroupId(pub u64);

impl GroupId {
    pub const ZERO: GroupId = GroupId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        GroupId(id)
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        GroupId(u64::from_le_bytes(bytes))
    }
}

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Group({:016x})", self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Replica identity - a participating editor (tab, user, device)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ReplicaId(pub u64);

impl ReplicaId {
    pub const ZERO: ReplicaId = ReplicaId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        ReplicaId(id)
    }
}

impl fmt::Debug for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Replica({:016x})", self.0)
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

fn parse_hex_id(s: &str) -> Option<u64> {
    if s.is_empty() || s.len() > 16 {
        return None;
    }
    u64::from_str_radix(s, 16).ok()
}

macro_rules! hex_string_serde {
    ($ty:ident, $expecting:literal) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(&format_args!("{:016x}", self.0))
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                struct HexVisitor;

                impl<'de> Visitor<'de> for HexVisitor {
                    type Value = $ty;

                    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                        f.write_str($expecting)
                    }

                    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                        parse_hex_id(v)
                            .map($ty)
                            .ok_or_else(|| E::custom(format!("invalid hex id: {v:?}")))
                    }
                }

                deserializer.deserialize_str(HexVisitor)
            }
        }
    };
}

hex_string_serde!(ElementId, "a hex-encoded element id");
hex_string_serde!(GroupId, "a hex-encoded group id");
hex_string_serde!(ReplicaId, "a hex-encoded replica id");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_id_roundtrip() {
        let id = ElementId::new(0xDEADBEEF_CAFEBABE);
        let bytes = id.to_bytes();
        let recovered = ElementId::from_bytes(bytes);
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_id_hex_serde() {
        let id = ElementId::new(0xA1);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000000000a1\"");

        let back: ElementId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_id_hex_rejects_garbage() {
        assert!(serde_json::from_str::<ElementId>("\"not-hex\"").is_err());
        assert!(serde_json::from_str::<ElementId>("\"\"").is_err());
        assert!(serde_json::from_str::<GroupId>("\"112233445566778899\"").is_err());
    }
}
