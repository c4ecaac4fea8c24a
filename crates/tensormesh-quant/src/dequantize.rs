//! Dequantization - Packed Codes to Float
//!
//! Group-wise affine decoding back to f32.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

use rayon::prelude::*;
use tensormesh_tensor::Tensor;

use crate::error::QuantResult;
use crate::packing::unpack_code;
use crate::types::QuantizedTensor;

// =============================================================================
// Public API
// =============================================================================

/// Decodes a quantized tensor back to f32.
///
/// Each element decodes as `code * scale + bias` for its group; groups
/// with `scale == 0` decode to `bias` for every element, so degenerate
/// groups never multiply by a zero step.
pub fn dequantize(quantized: &QuantizedTensor) -> QuantResult<Tensor<f32>> {
    let group_size = quantized.group_size;
    let bits = quantized.bits;
    let packed = &quantized.packed;

    let data: Vec<f32> = (0..quantized.num_groups())
        .into_par_iter()
        .flat_map_iter(|g| {
            let scale = quantized.scales[g];
            let bias = quantized.biases[g];
            (0..group_size).map(move |j| {
                if scale == 0.0 {
                    bias
                } else {
                    f32::from(unpack_code(packed, g * group_size + j, bits)) * scale + bias
                }
            })
        })
        .collect();

    Ok(Tensor::from_vec(data, &quantized.shape)?)
}

/// Decodes a single group into a fresh buffer.
///
/// Used by row-addressed decoders (embedding lookup) that only need a few
/// groups of a large table.
#[must_use]
pub fn dequantize_group(quantized: &QuantizedTensor, group: usize) -> Vec<f32> {
    let group_size = quantized.group_size;
    let scale = quantized.scales[group];
    let bias = quantized.biases[group];

    (0..group_size)
        .map(|j| {
            if scale == 0.0 {
                bias
            } else {
                f32::from(unpack_code(
                    &quantized.packed,
                    group * group_size + j,
                    quantized.bits,
                )) * scale
                    + bias
            }
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantize::quantize;

    #[test]
    fn test_roundtrip_error_bound() {
        for &bits in &[2usize, 3, 4, 8] {
            let original: Vec<f32> = (0..64).map(|x| (x as f32 * 0.37).sin()).collect();
            let t = Tensor::from_vec(original.clone(), &[64]).unwrap();

            let q = quantize(&t, bits, 16).unwrap();
            let restored = dequantize(&q).unwrap();

            for (i, (&orig, &deq)) in original.iter().zip(restored.as_slice().iter()).enumerate() {
                let scale = q.scales[i / 16];
                assert!(
                    (orig - deq).abs() <= scale.abs() + 1e-6,
                    "bits {bits}: |{orig} - {deq}| > {scale}"
                );
            }
        }
    }

    #[test]
    fn test_roundtrip_exact_on_grid() {
        // Values already on the 8-bit grid of [0, 255] with unit scale.
        let original: Vec<f32> = (0..=255).map(|x| x as f32).collect();
        let t = Tensor::from_vec(original.clone(), &[256]).unwrap();

        let q = quantize(&t, 8, 256).unwrap();
        let restored = dequantize(&q).unwrap();

        assert_eq!(restored.to_vec(), original);
    }

    #[test]
    fn test_constant_group_decodes_to_bias() {
        let t = Tensor::full(&[8], -2.5f32);
        let q = quantize(&t, 4, 8).unwrap();
        let restored = dequantize(&q).unwrap();
        assert!(restored.as_slice().iter().all(|&x| x == -2.5));
    }

    #[test]
    fn test_empty_roundtrip() {
        let t = Tensor::from_vec(Vec::new(), &[0, 8]).unwrap();
        let q = quantize(&t, 4, 8).unwrap();
        let restored = dequantize(&q).unwrap();
        assert_eq!(restored.shape(), &[0, 8]);
        assert!(restored.is_empty());
    }

    #[test]
    fn test_dequantize_group() {
        let t = Tensor::from_vec(vec![0.0f32, 1.0, 2.0, 3.0, 10.0, 11.0, 12.0, 13.0], &[2, 4])
            .unwrap();
        let q = quantize(&t, 8, 4).unwrap();

        let row1 = dequantize_group(&q, 1);
        for (a, b) in row1.iter().zip([10.0f32, 11.0, 12.0, 13.0].iter()) {
            assert!((a - b).abs() < 0.05);
        }
    }
}
