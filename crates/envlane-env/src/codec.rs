//! Space schema codec.
//!
//! Converts between runtime spaces and their wire descriptors. Dispatch is
//! on the runtime variant; composite spaces recurse into their children.

use envlane_protocol::{DictEntries, Dtype, SpaceDescriptor};

use crate::space::Space;

/// Errors raised while encoding or decoding a space.
#[derive(Debug, thiserror::Error)]
pub enum SpaceCodecError {
    /// The runtime space variant has no wire form.
    #[error("unsupported space type: {0}")]
    Unsupported(&'static str),

    /// The descriptor carries a dtype outside the canonical set.
    #[error("unknown dtype '{0}' in space descriptor")]
    UnknownDtype(String),
}

/// Encode a runtime space as a wire descriptor.
///
/// A variant outside the closed wire set fails with a descriptive error;
/// the failure aborts only the call that tried to describe the space.
pub fn encode_space(space: &Space) -> Result<SpaceDescriptor, SpaceCodecError> {
    match space {
        Space::Box { low, high, shape, dtype } => Ok(SpaceDescriptor::Box {
            low: low.clone(),
            high: high.clone(),
            shape: shape.clone(),
            dtype: dtype.as_str().to_string(),
        }),
        Space::Discrete { n } => Ok(SpaceDescriptor::Discrete { n: *n }),
        Space::MultiDiscrete { nvec } => Ok(SpaceDescriptor::MultiDiscrete { nvec: nvec.clone() }),
        Space::MultiBinary { n } => Ok(SpaceDescriptor::MultiBinary { n: *n }),
        Space::Dict(entries) => {
            let spaces = entries
                .iter()
                .map(|(key, child)| Ok((key.clone(), encode_space(child)?)))
                .collect::<Result<DictEntries, SpaceCodecError>>()?;
            Ok(SpaceDescriptor::Dict { spaces })
        }
        Space::Tuple(entries) => {
            let spaces = entries
                .iter()
                .map(encode_space)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(SpaceDescriptor::Tuple { spaces })
        }
        Space::Text { .. } => Err(SpaceCodecError::Unsupported(space.variant_name())),
    }
}

/// Decode a wire descriptor into a runtime space.
pub fn decode_space(descriptor: &SpaceDescriptor) -> Result<Space, SpaceCodecError> {
    match descriptor {
        SpaceDescriptor::Box { low, high, shape, dtype } => Ok(Space::Box {
            low: low.clone(),
            high: high.clone(),
            shape: shape.clone(),
            dtype: Dtype::from_name(dtype)
                .ok_or_else(|| SpaceCodecError::UnknownDtype(dtype.clone()))?,
        }),
        SpaceDescriptor::Discrete { n } => Ok(Space::Discrete { n: *n }),
        SpaceDescriptor::MultiDiscrete { nvec } => Ok(Space::MultiDiscrete { nvec: nvec.clone() }),
        SpaceDescriptor::MultiBinary { n } => Ok(Space::MultiBinary { n: *n }),
        SpaceDescriptor::Dict { spaces } => {
            let entries = spaces
                .iter()
                .map(|(key, child)| Ok((key.to_string(), decode_space(child)?)))
                .collect::<Result<Vec<_>, SpaceCodecError>>()?;
            Ok(Space::Dict(entries))
        }
        SpaceDescriptor::Tuple { spaces } => {
            let entries = spaces
                .iter()
                .map(decode_space)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Space::Tuple(entries))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested_space() -> Space {
        Space::Dict(vec![
            (
                "position".to_string(),
                Space::Box {
                    low: vec![-2.4, -10.0],
                    high: vec![2.4, 10.0],
                    shape: vec![2],
                    dtype: Dtype::F32,
                },
            ),
            ("mode".to_string(), Space::Discrete { n: 3 }),
            (
                "flags".to_string(),
                Space::Tuple(vec![
                    Space::MultiBinary { n: 4 },
                    Space::MultiDiscrete { nvec: vec![2, 5] },
                ]),
            ),
        ])
    }

    #[test]
    fn test_every_variant_round_trips() {
        let spaces = vec![
            Space::Box {
                low: vec![0.0],
                high: vec![1.0],
                shape: vec![1],
                dtype: Dtype::F64,
            },
            Space::Discrete { n: 2 },
            Space::MultiDiscrete { nvec: vec![3, 3, 3] },
            Space::MultiBinary { n: 8 },
            nested_space(),
            Space::Tuple(vec![Space::Discrete { n: 1 }]),
        ];

        for space in spaces {
            let descriptor = encode_space(&space).unwrap();
            let decoded = decode_space(&descriptor).unwrap();
            assert_eq!(decoded, space);
        }
    }

    #[test]
    fn test_dict_order_preserved() {
        let descriptor = encode_space(&nested_space()).unwrap();
        match &descriptor {
            SpaceDescriptor::Dict { spaces } => {
                let keys: Vec<&str> = spaces.iter().map(|(k, _)| k).collect();
                assert_eq!(keys, ["position", "mode", "flags"]);
            }
            other => panic!("expected dict descriptor, got {:?}", other),
        }
    }

    #[test]
    fn test_text_is_not_encodable() {
        let err = encode_space(&Space::Text { max_length: 16 }).unwrap_err();
        assert!(err.to_string().contains("unsupported space type: Text"));
    }

    #[test]
    fn test_text_nested_in_dict_is_not_encodable() {
        let space = Space::Dict(vec![(
            "prompt".to_string(),
            Space::Text { max_length: 80 },
        )]);
        assert!(encode_space(&space).is_err());
    }

    #[test]
    fn test_unknown_dtype_fails_decode() {
        let descriptor = SpaceDescriptor::Box {
            low: vec![0.0],
            high: vec![1.0],
            shape: vec![1],
            dtype: "complex128".to_string(),
        };
        let err = decode_space(&descriptor).unwrap_err();
        assert!(matches!(err, SpaceCodecError::UnknownDtype(_)));
    }
}
