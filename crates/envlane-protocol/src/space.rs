//! Space descriptor schema.
//!
//! A self-describing, recursively composable description of an observation
//! or action domain. The descriptor is what travels on the wire; runtime
//! space types live with the environment code.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Wire description of an observation or action space.
///
/// Tagged on `type`. The variant set is closed: an unknown tag is a hard
/// decode failure, never a silently dropped entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SpaceDescriptor {
    /// Bounded numeric box with per-element bounds.
    Box {
        low: Vec<f64>,
        high: Vec<f64>,
        shape: Vec<u64>,
        dtype: String,
    },
    /// `n` distinct values, `0..n`.
    Discrete { n: u64 },
    /// Cartesian product of independent discrete axes.
    MultiDiscrete { nvec: Vec<u64> },
    /// `n` independent binary flags.
    MultiBinary { n: u64 },
    /// Named child spaces; key order is part of the contract.
    Dict { spaces: DictEntries },
    /// Positional child spaces.
    Tuple { spaces: Vec<SpaceDescriptor> },
}

/// Ordered children of a `Dict` space, serialized as a JSON map.
///
/// Insertion order must survive the wire: observation entries are matched to
/// space entries by position downstream. Entries are kept as a vector and
/// written with hand-rolled map serde so ordering never depends on the map
/// implementation of the moment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DictEntries(pub Vec<(String, SpaceDescriptor)>);

impl DictEntries {
    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SpaceDescriptor)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, SpaceDescriptor)> for DictEntries {
    fn from_iter<I: IntoIterator<Item = (String, SpaceDescriptor)>>(iter: I) -> Self {
        DictEntries(iter.into_iter().collect())
    }
}

impl Serialize for DictEntries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, child) in &self.0 {
            map.serialize_entry(key, child)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DictEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = DictEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of space descriptors")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, child)) = access.next_entry::<String, SpaceDescriptor>()? {
                    entries.push((key, child));
                }
                Ok(DictEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}
