//! Parameter - Layer-Owned Weights
//!
//! A parameter is a tensor owned exclusively by one module, stored either
//! dense or quantized. The storage kind is fixed at construction; loading
//! state converts incoming entries to the kind the parameter already has.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

use tensormesh_core::Error;
use tensormesh_quant::{dequantize, quantize, QuantizedTensor};
use tensormesh_serialize::StateEntry;
use tensormesh_tensor::Tensor;

use crate::error::{LoadError, NnResult};

// =============================================================================
// Parameter
// =============================================================================

/// A weight or bias owned by a module.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    /// Full-precision storage.
    Dense(Tensor<f32>),
    /// Group-wise quantized storage.
    Quantized(QuantizedTensor),
}

impl Parameter {
    /// Returns the logical shape.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        match self {
            Parameter::Dense(t) => t.shape(),
            Parameter::Quantized(q) => &q.shape,
        }
    }

    /// Returns the logical number of elements.
    #[must_use]
    pub fn numel(&self) -> usize {
        match self {
            Parameter::Dense(t) => t.numel(),
            Parameter::Quantized(q) => q.numel(),
        }
    }

    /// Returns true for quantized storage.
    #[must_use]
    pub fn is_quantized(&self) -> bool {
        matches!(self, Parameter::Quantized(_))
    }

    /// Borrows the dense tensor, failing if the parameter is quantized.
    pub fn dense(&self) -> NnResult<&Tensor<f32>> {
        match self {
            Parameter::Dense(t) => Ok(t),
            Parameter::Quantized(_) => Err(Error::invalid_operation(
                "parameter holds quantized storage, dense access required",
            )
            .into()),
        }
    }

    /// Borrows the quantized tensor, failing if the parameter is dense.
    pub fn quantized(&self) -> NnResult<&QuantizedTensor> {
        match self {
            Parameter::Quantized(q) => Ok(q),
            Parameter::Dense(_) => Err(Error::invalid_operation(
                "parameter holds dense storage, quantized access required",
            )
            .into()),
        }
    }

    /// Serializes this parameter into a state entry.
    #[must_use]
    pub fn to_entry(&self) -> StateEntry {
        match self {
            Parameter::Dense(t) => StateEntry::from_dense(t),
            Parameter::Quantized(q) => StateEntry::from_quantized(q),
        }
    }

    /// Replaces this parameter's value with a state entry, converting the
    /// storage kind when the entry's kind differs.
    ///
    /// The entry must match the parameter's logical shape exactly; sharded
    /// layers slice full-shape entries before calling this. A quantized
    /// entry whose layout (`bits`, `group_size`) matches a quantized target
    /// is adopted verbatim, so its packed codes survive byte-identically;
    /// any other combination goes through decode and, for quantized
    /// targets, re-encode against the target's layout.
    pub fn assign(&mut self, entry: &StateEntry) -> Result<(), LoadError> {
        if entry.shape() != self.shape() {
            return Err(LoadError::ShapeMismatch {
                expected: self.shape().to_vec(),
                actual: entry.shape().to_vec(),
            });
        }

        match self {
            Parameter::Dense(target) => {
                let tensor = match entry {
                    StateEntry::Dense { shape, values } => {
                        Tensor::from_vec(values.clone(), shape)?
                    }
                    StateEntry::Quantized { .. } => dequantize(&rebuild_quantized(entry)?)?,
                };
                *target = tensor;
            }
            Parameter::Quantized(target) => match entry {
                StateEntry::Dense { shape, values } => {
                    let tensor = Tensor::from_vec(values.clone(), shape)?;
                    *target = quantize(&tensor, target.bits, target.group_size)?;
                }
                StateEntry::Quantized { bits, group_size, .. } => {
                    let incoming = rebuild_quantized(entry)?;
                    if *bits == target.bits && *group_size == target.group_size {
                        *target = incoming;
                    } else {
                        let tensor = dequantize(&incoming)?;
                        *target = quantize(&tensor, target.bits, target.group_size)?;
                    }
                }
            },
        }

        Ok(())
    }
}

/// Revalidates and rebuilds the `QuantizedTensor` inside a quantized entry.
pub(crate) fn rebuild_quantized(entry: &StateEntry) -> Result<QuantizedTensor, LoadError> {
    match entry {
        StateEntry::Dense { .. } => {
            Err(Error::invalid_operation("entry does not carry packed codes").into())
        }
        StateEntry::Quantized {
            shape,
            bits,
            group_size,
            packed,
            scales,
            biases,
        } => Ok(QuantizedTensor::new(
            shape.clone(),
            *bits,
            *group_size,
            packed.clone(),
            scales.clone(),
            biases.clone(),
        )?),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tensor() -> Tensor<f32> {
        Tensor::from_vec((0..16).map(|x| x as f32 * 0.5).collect(), &[2, 8]).unwrap()
    }

    #[test]
    fn test_shape_and_kind() {
        let dense = Parameter::Dense(sample_tensor());
        assert_eq!(dense.shape(), &[2, 8]);
        assert!(!dense.is_quantized());
        assert!(dense.dense().is_ok());
        assert!(dense.quantized().is_err());
    }

    #[test]
    fn test_assign_dense_to_dense() {
        let mut param = Parameter::Dense(Tensor::zeros(&[2, 8]));
        param.assign(&StateEntry::from_dense(&sample_tensor())).unwrap();
        assert_eq!(param.dense().unwrap(), &sample_tensor());
    }

    #[test]
    fn test_assign_shape_mismatch() {
        let mut param = Parameter::Dense(Tensor::zeros(&[2, 8]));
        let err = param
            .assign(&StateEntry::from_dense(&Tensor::zeros(&[4, 4])))
            .unwrap_err();
        assert!(matches!(err, LoadError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_assign_quantized_into_dense_decodes() {
        let q = quantize(&sample_tensor(), 8, 8).unwrap();
        let mut param = Parameter::Dense(Tensor::zeros(&[2, 8]));
        param.assign(&StateEntry::from_quantized(&q)).unwrap();

        let loaded = param.dense().unwrap();
        for (a, b) in loaded.as_slice().iter().zip(sample_tensor().as_slice()) {
            assert!((a - b).abs() < 0.05);
        }
    }

    #[test]
    fn test_assign_dense_into_quantized_encodes() {
        let q = quantize(&Tensor::zeros(&[2, 8]), 4, 8).unwrap();
        let mut param = Parameter::Quantized(q);
        param.assign(&StateEntry::from_dense(&sample_tensor())).unwrap();

        let stored = param.quantized().unwrap();
        assert_eq!(stored.bits, 4);
        assert_eq!(stored.group_size, 8);
    }

    #[test]
    fn test_matching_layout_adopted_verbatim() {
        let q = quantize(&sample_tensor(), 4, 8).unwrap();
        let mut param = Parameter::Quantized(quantize(&Tensor::zeros(&[2, 8]), 4, 8).unwrap());
        param.assign(&StateEntry::from_quantized(&q)).unwrap();

        assert_eq!(param.quantized().unwrap().packed, q.packed);
    }

    #[test]
    fn test_layout_mismatch_requantizes() {
        let q = quantize(&sample_tensor(), 8, 4).unwrap();
        let mut param = Parameter::Quantized(quantize(&Tensor::zeros(&[2, 8]), 4, 8).unwrap());
        param.assign(&StateEntry::from_quantized(&q)).unwrap();

        let stored = param.quantized().unwrap();
        assert_eq!(stored.bits, 4);
        assert_eq!(stored.group_size, 8);
    }
}
