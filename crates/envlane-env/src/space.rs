//! Runtime space model.

use envlane_protocol::Dtype;

/// An observation or action domain as environment code sees it.
///
/// Most variants have a one-to-one wire form; `Text` exists only at runtime
/// and cannot be described to a remote peer.
#[derive(Debug, Clone, PartialEq)]
pub enum Space {
    /// Bounded numeric box with per-element bounds.
    Box {
        low: Vec<f64>,
        high: Vec<f64>,
        shape: Vec<u64>,
        dtype: Dtype,
    },
    /// `n` distinct values, `0..n`.
    Discrete { n: u64 },
    /// Cartesian product of independent discrete axes.
    MultiDiscrete { nvec: Vec<u64> },
    /// `n` independent binary flags.
    MultiBinary { n: u64 },
    /// Named child spaces; order is meaningful.
    Dict(Vec<(String, Space)>),
    /// Positional child spaces.
    Tuple(Vec<Space>),
    /// Variable-length text up to `max_length` characters.
    Text { max_length: u64 },
}

impl Space {
    /// Variant name for diagnostics.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Space::Box { .. } => "Box",
            Space::Discrete { .. } => "Discrete",
            Space::MultiDiscrete { .. } => "MultiDiscrete",
            Space::MultiBinary { .. } => "MultiBinary",
            Space::Dict(_) => "Dict",
            Space::Tuple(_) => "Tuple",
            Space::Text { .. } => "Text",
        }
    }
}
