//! Canonical numeric-array encoding.
//!
//! Observations and rendered images travel as `{shape, dtype, data}`
//! objects: an explicit shape, an element type, and row-major flat data.
//! This keeps the wire format lossless and portable without a general
//! object serializer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Element type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    F32,
    F64,
    I64,
    U8,
}

impl Dtype {
    /// Wire name of the dtype.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dtype::F32 => "f32",
            Dtype::F64 => "f64",
            Dtype::I64 => "i64",
            Dtype::U8 => "u8",
        }
    }

    /// Look up a dtype by its wire name.
    pub fn from_name(name: &str) -> Option<Dtype> {
        match name {
            "f32" => Some(Dtype::F32),
            "f64" => Some(Dtype::F64),
            "i64" => Some(Dtype::I64),
            "u8" => Some(Dtype::U8),
            _ => None,
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while building or interpreting a tensor.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// Flat data length does not match the shape product.
    #[error("tensor data has {data_len} elements but shape {shape:?} implies {expected}")]
    ShapeMismatch {
        shape: Vec<u64>,
        expected: u64,
        data_len: usize,
    },

    /// The value is not a well-formed tensor object.
    #[error("value is not a tensor: {0}")]
    Malformed(String),
}

/// A numeric array in canonical wire form.
///
/// `data` is row-major. Every supported dtype is carried losslessly by JSON
/// numbers (integers up to 2^53 are exact in an f64).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub shape: Vec<u64>,
    pub dtype: Dtype,
    pub data: Vec<f64>,
}

impl Tensor {
    /// Build a tensor, validating the data length against the shape.
    pub fn new(shape: Vec<u64>, dtype: Dtype, data: Vec<f64>) -> Result<Self, TensorError> {
        let expected: u64 = shape.iter().product();
        if expected != data.len() as u64 {
            return Err(TensorError::ShapeMismatch {
                shape,
                expected,
                data_len: data.len(),
            });
        }
        Ok(Self { shape, dtype, data })
    }

    /// Number of elements implied by the shape.
    pub fn element_count(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Serialize into a JSON value for embedding in an envelope.
    pub fn to_value(&self) -> Value {
        // A struct of vectors and a unit enum cannot fail to serialize.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Interpret a JSON value as a tensor, validating its shape.
    pub fn from_value(value: &Value) -> Result<Self, TensorError> {
        let tensor: Tensor = serde_json::from_value(value.clone())
            .map_err(|e| TensorError::Malformed(e.to_string()))?;
        Tensor::new(tensor.shape, tensor.dtype, tensor.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_via_value() {
        let tensor = Tensor::new(vec![2, 2], Dtype::F32, vec![0.0, 1.5, -2.0, 3.25]).unwrap();
        let value = tensor.to_value();
        assert_eq!(value["dtype"], "f32");
        assert_eq!(value["shape"], serde_json::json!([2, 2]));

        let parsed = Tensor::from_value(&value).unwrap();
        assert_eq!(parsed, tensor);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let err = Tensor::new(vec![3], Dtype::F64, vec![1.0]).unwrap_err();
        assert!(matches!(err, TensorError::ShapeMismatch { expected: 3, .. }));
    }

    #[test]
    fn test_from_value_validates_shape() {
        let value = serde_json::json!({
            "shape": [4],
            "dtype": "u8",
            "data": [1, 2]
        });
        assert!(Tensor::from_value(&value).is_err());
    }

    #[test]
    fn test_from_value_rejects_non_tensor() {
        let err = Tensor::from_value(&serde_json::json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, TensorError::Malformed(_)));
    }

    #[test]
    fn test_scalar_shape() {
        let tensor = Tensor::new(vec![], Dtype::I64, vec![42.0]).unwrap();
        assert_eq!(tensor.element_count(), 1);
    }
}
