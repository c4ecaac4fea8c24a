//! Quantized Matrix Multiply
//!
//! Fused group-wise multiply-accumulate against packed weights. The
//! dequantized weight is never materialized: for activation row `x` and
//! weight row `w` with groups `g`,
//!
//! `x · ŵ = Σ_g ( scale_g · Σ_j code_j · x_j  +  bias_g · Σ_j x_j )`
//!
//! so the per-group activation sums are shared across every output row.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

use rayon::prelude::*;
use tensormesh_tensor::Tensor;

use crate::error::{QuantError, QuantResult};
use crate::packing::unpack_code;
use crate::types::QuantizedTensor;

// =============================================================================
// Public API
// =============================================================================

/// Computes `x @ Wᵗ (+ bias)` for a packed weight.
///
/// `x` is `[m, k]`, `weight` is logically `[n, k]` quantized along `k`,
/// the result is `[m, n]`. Numerically equivalent to multiplying by the
/// dequantized weight, up to floating-point accumulation order.
///
/// # Errors
/// `ShapeMismatch` when the weight is not 2-D, the inner dimensions
/// disagree, or the bias length is not `n`.
pub fn quantized_matmul(
    x: &Tensor<f32>,
    weight: &QuantizedTensor,
    bias: Option<&Tensor<f32>>,
) -> QuantResult<Tensor<f32>> {
    if weight.shape.len() != 2 || x.ndim() != 2 {
        return Err(QuantError::ShapeMismatch {
            expected: vec![2],
            actual: vec![x.ndim(), weight.shape.len()],
        });
    }
    let (m, k) = (x.shape()[0], x.shape()[1]);
    let (n, wk) = (weight.shape[0], weight.shape[1]);
    if k != wk {
        return Err(QuantError::ShapeMismatch {
            expected: vec![m, wk],
            actual: vec![m, k],
        });
    }
    if let Some(b) = bias {
        if b.shape() != [n] {
            return Err(QuantError::ShapeMismatch {
                expected: vec![n],
                actual: b.shape().to_vec(),
            });
        }
    }

    if m == 0 || n == 0 {
        return Ok(Tensor::zeros(&[m, n]));
    }

    let group_size = weight.group_size;
    let groups_per_row = k / group_size;
    let bits = weight.bits;
    let xdata = x.as_slice();
    let bias_data = bias.map(Tensor::as_slice);

    let mut out = vec![0.0f32; m * n];
    out.par_chunks_mut(n).enumerate().for_each(|(i, out_row)| {
        let xrow = &xdata[i * k..(i + 1) * k];

        // Per-group activation sums, shared by every output feature.
        let group_sums: Vec<f32> = (0..groups_per_row)
            .map(|g| xrow[g * group_size..(g + 1) * group_size].iter().sum())
            .collect();

        for (o, out_val) in out_row.iter_mut().enumerate() {
            let mut acc = 0.0f32;
            for g in 0..groups_per_row {
                let scale = weight.scales[o * groups_per_row + g];
                let gbias = weight.biases[o * groups_per_row + g];

                if scale != 0.0 {
                    let base = o * k + g * group_size;
                    let mut dot = 0.0f32;
                    for j in 0..group_size {
                        dot += f32::from(unpack_code(&weight.packed, base + j, bits))
                            * xrow[g * group_size + j];
                    }
                    acc += scale * dot;
                }
                acc += gbias * group_sums[g];
            }
            if let Some(b) = bias_data {
                acc += b[o];
            }
            *out_val = acc;
        }
    });

    Ok(Tensor::from_vec(out, &[m, n])?)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dequantize::dequantize;
    use crate::quantize::quantize;

    fn assert_close(a: &[f32], b: &[f32], tol: f32) {
        assert_eq!(a.len(), b.len());
        for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
            assert!((x - y).abs() <= tol, "index {i}: {x} vs {y}");
        }
    }

    #[test]
    fn test_matches_dequantized_matmul() {
        for &bits in &[2usize, 3, 4, 8] {
            let w_data: Vec<f32> = (0..32).map(|v| ((v * 7 % 13) as f32 - 6.0) * 0.25).collect();
            let w = Tensor::from_vec(w_data, &[4, 8]).unwrap();
            let x = Tensor::from_vec((0..16).map(|v| v as f32 * 0.1).collect(), &[2, 8]).unwrap();

            let q = quantize(&w, bits, 4).unwrap();

            let fused = quantized_matmul(&x, &q, None).unwrap();
            let reference = x.matmul(&dequantize(&q).unwrap().transpose().unwrap()).unwrap();

            assert_close(fused.as_slice(), reference.as_slice(), 1e-4);
        }
    }

    #[test]
    fn test_with_bias() {
        let w = Tensor::from_vec((0..8).map(|v| v as f32).collect(), &[2, 4]).unwrap();
        let x = Tensor::from_vec(vec![1.0f32, 0.0, 0.0, 0.0], &[1, 4]).unwrap();
        let bias = Tensor::from_vec(vec![100.0f32, -100.0], &[2]).unwrap();

        let q = quantize(&w, 8, 4).unwrap();
        let with_bias = quantized_matmul(&x, &q, Some(&bias)).unwrap();
        let without = quantized_matmul(&x, &q, None).unwrap();

        assert!((with_bias.as_slice()[0] - without.as_slice()[0] - 100.0).abs() < 1e-5);
        assert!((with_bias.as_slice()[1] - without.as_slice()[1] + 100.0).abs() < 1e-5);
    }

    #[test]
    fn test_shape_mismatch() {
        let w = Tensor::<f32>::zeros(&[2, 4]);
        let q = quantize(&w, 8, 4).unwrap();

        let bad_x = Tensor::<f32>::zeros(&[1, 6]);
        assert!(matches!(
            quantized_matmul(&bad_x, &q, None).unwrap_err(),
            QuantError::ShapeMismatch { .. }
        ));

        let x = Tensor::<f32>::zeros(&[1, 4]);
        let bad_bias = Tensor::<f32>::zeros(&[3]);
        assert!(quantized_matmul(&x, &q, Some(&bad_bias)).is_err());
    }

    #[test]
    fn test_constant_weight_rows() {
        // Degenerate groups (scale 0) must still contribute bias * sum(x).
        let w = Tensor::full(&[2, 4], 3.0f32);
        let x = Tensor::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], &[1, 4]).unwrap();

        let q = quantize(&w, 4, 4).unwrap();
        let y = quantized_matmul(&x, &q, None).unwrap();

        // 3 * (1 + 2 + 3 + 4) = 30 for both output features.
        assert_close(y.as_slice(), &[30.0, 30.0], 1e-5);
    }
}
