//! Quantization - Float to Packed Codes
//!
//! Group-wise affine encoding of f32 tensors.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

use rayon::prelude::*;
use tensormesh_tensor::Tensor;

use crate::error::{QuantError, QuantResult};
use crate::packing::pack_codes;
use crate::types::{is_supported_bit_width, QuantizedTensor};

// =============================================================================
// Public API
// =============================================================================

/// Quantizes a tensor to `bits`-wide codes in groups of `group_size`.
///
/// The last axis is partitioned into contiguous groups. Per group the
/// codec derives `scale = (max - min) / (2^bits - 1)` and `bias = min`,
/// then encodes each element as `round((x - bias) / scale)` clamped to
/// `[0, 2^bits - 1]`. A group whose elements are all equal gets
/// `scale = 0` and all-zero codes.
///
/// # Errors
/// `InvalidBitWidth` for unsupported `bits`; `GroupSize` when `group_size`
/// is zero or does not evenly divide the last axis.
pub fn quantize(tensor: &Tensor<f32>, bits: usize, group_size: usize) -> QuantResult<QuantizedTensor> {
    if !is_supported_bit_width(bits) {
        return Err(QuantError::InvalidBitWidth(bits));
    }
    let last_axis = tensor.shape().last().copied().unwrap_or(1);
    if group_size == 0 || last_axis % group_size != 0 {
        return Err(QuantError::GroupSize {
            axis: last_axis,
            group_size,
        });
    }

    let data = tensor.as_slice();
    let num_groups = data.len() / group_size;
    let levels = ((1usize << bits) - 1) as f32;

    let encoded: Vec<(f32, f32, Vec<u8>)> = (0..num_groups)
        .into_par_iter()
        .map(|g| {
            let chunk = &data[g * group_size..(g + 1) * group_size];

            let mut min = f32::INFINITY;
            let mut max = f32::NEG_INFINITY;
            for &x in chunk {
                min = min.min(x);
                max = max.max(x);
            }

            // Degenerate groups keep scale 0 so decode returns the bias.
            let scale = if max > min { (max - min) / levels } else { 0.0 };

            let codes: Vec<u8> = if scale == 0.0 {
                vec![0u8; chunk.len()]
            } else {
                chunk
                    .iter()
                    .map(|&x| ((x - min) / scale).round().clamp(0.0, levels) as u8)
                    .collect()
            };

            (scale, min, codes)
        })
        .collect();

    let mut scales = Vec::with_capacity(num_groups);
    let mut biases = Vec::with_capacity(num_groups);
    let mut codes = Vec::with_capacity(data.len());
    for (scale, bias, group_codes) in encoded {
        scales.push(scale);
        biases.push(bias);
        codes.extend_from_slice(&group_codes);
    }

    QuantizedTensor::new(
        tensor.shape().to_vec(),
        bits,
        group_size,
        pack_codes(&codes, bits),
        scales,
        biases,
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_basic() {
        let t = Tensor::from_vec((0..8).map(|x| x as f32).collect(), &[2, 4]).unwrap();
        let q = quantize(&t, 8, 4).unwrap();

        assert_eq!(q.shape, vec![2, 4]);
        assert_eq!(q.num_groups(), 2);
        assert_eq!(q.biases, vec![0.0, 4.0]);
    }

    #[test]
    fn test_quantize_invalid_bits() {
        let t = Tensor::<f32>::zeros(&[4]);
        assert_eq!(quantize(&t, 16, 4).unwrap_err(), QuantError::InvalidBitWidth(16));
        assert_eq!(quantize(&t, 0, 4).unwrap_err(), QuantError::InvalidBitWidth(0));
    }

    #[test]
    fn test_quantize_bad_group_size() {
        let t = Tensor::<f32>::zeros(&[2, 6]);
        assert!(matches!(
            quantize(&t, 4, 4).unwrap_err(),
            QuantError::GroupSize { axis: 6, group_size: 4 }
        ));
        assert!(matches!(
            quantize(&t, 4, 0).unwrap_err(),
            QuantError::GroupSize { .. }
        ));
    }

    #[test]
    fn test_quantize_empty() {
        let t = Tensor::from_vec(Vec::new(), &[0, 4]).unwrap();
        let q = quantize(&t, 4, 4).unwrap();
        assert_eq!(q.num_groups(), 0);
        assert!(q.packed.is_empty());
    }

    #[test]
    fn test_quantize_constant_group() {
        let t = Tensor::full(&[4], 7.5f32);
        let q = quantize(&t, 4, 4).unwrap();
        assert_eq!(q.scales, vec![0.0]);
        assert_eq!(q.biases, vec![7.5]);
        assert!(q.packed.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_codes_clamped_to_range() {
        let t = Tensor::from_vec(vec![-1.0f32, 0.0, 1.0, 2.0], &[4]).unwrap();
        let q = quantize(&t, 2, 4).unwrap();
        for i in 0..4 {
            assert!(q.code(i) <= 3);
        }
        // Extremes map to the ends of the grid.
        assert_eq!(q.code(0), 0);
        assert_eq!(q.code(3), 3);
    }
}
