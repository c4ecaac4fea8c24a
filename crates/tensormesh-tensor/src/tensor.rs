//! Tensor - Core N-Dimensional Array Type
//!
//! The `Tensor` struct is the fundamental data structure in TensorMesh. It
//! represents an N-dimensional, row-major array of numeric values with an
//! owned, contiguous buffer.
//!
//! # Key Features
//! - Generic over element type (f32, f16, bf16, i8, ...)
//! - Always contiguous: `data.len() == product(shape)` is a hard invariant
//! - Matrix multiply, transpose and narrow for 2-D layer math
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

use core::fmt;

use tensormesh_core::dtype::{Numeric, Scalar};
use tensormesh_core::error::{Error, Result};

use crate::shape::numel;

// =============================================================================
// Tensor Struct
// =============================================================================

/// An N-dimensional array of numeric values.
///
/// Tensors own their buffer outright; cloning copies the data. Shards cut
/// from a tensor are materialized copies, so they can be handed to
/// collectives as flat buffers without view bookkeeping.
#[derive(Clone, PartialEq)]
pub struct Tensor<T: Scalar> {
    /// Underlying data buffer, row-major.
    pub(crate) data: Vec<T>,
    /// Shape of the tensor (dimensions).
    pub(crate) shape: Vec<usize>,
}

impl<T: Scalar> Tensor<T> {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Creates a new tensor from a vector with the given shape.
    ///
    /// # Returns
    /// New tensor, or `ShapeMismatch` if the shape does not describe exactly
    /// `data.len()` elements.
    pub fn from_vec(data: Vec<T>, shape: &[usize]) -> Result<Self> {
        if numel(shape) != data.len() {
            return Err(Error::shape_mismatch(&[data.len()], shape));
        }
        Ok(Self {
            data,
            shape: shape.to_vec(),
        })
    }

    /// Creates a new tensor from a slice with the given shape.
    pub fn from_slice(data: &[T], shape: &[usize]) -> Result<Self> {
        Self::from_vec(data.to_vec(), shape)
    }

    /// Creates a tensor filled with the default value (zero for numerics).
    #[must_use]
    pub fn filled_default(shape: &[usize]) -> Self {
        Self {
            data: vec![T::default(); numel(shape)],
            shape: shape.to_vec(),
        }
    }

    /// Creates a scalar tensor (0-dimensional).
    #[must_use]
    pub fn scalar(value: T) -> Self {
        Self {
            data: vec![value],
            shape: Vec::new(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the shape of the tensor.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Returns the total number of elements.
    #[must_use]
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the tensor has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the underlying buffer as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Returns the underlying buffer as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Returns a copy of the underlying buffer.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.data.clone()
    }

    /// Consumes the tensor and returns its buffer.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Returns row `i` of a 2-D tensor as a slice.
    pub fn row(&self, i: usize) -> Result<&[T]> {
        if self.ndim() != 2 {
            return Err(Error::invalid_operation("row() requires a 2-D tensor"));
        }
        let (rows, cols) = (self.shape[0], self.shape[1]);
        if i >= rows {
            return Err(Error::IndexOutOfBounds {
                index: i,
                size: rows,
            });
        }
        Ok(&self.data[i * cols..(i + 1) * cols])
    }

    // =========================================================================
    // Structural Operations
    // =========================================================================

    /// Returns a copy with a new shape describing the same number of
    /// elements.
    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        if numel(shape) != self.data.len() {
            return Err(Error::shape_mismatch(&self.shape, shape));
        }
        Ok(Self {
            data: self.data.clone(),
            shape: shape.to_vec(),
        })
    }

    /// Returns a contiguous copy of `len` indices starting at `start` along
    /// dimension `dim`.
    pub fn narrow(&self, dim: usize, start: usize, len: usize) -> Result<Self> {
        if dim >= self.ndim() {
            return Err(Error::InvalidDimension {
                index: dim,
                ndim: self.ndim(),
            });
        }
        if start + len > self.shape[dim] {
            return Err(Error::IndexOutOfBounds {
                index: start + len,
                size: self.shape[dim],
            });
        }

        let outer: usize = self.shape[..dim].iter().product();
        let inner: usize = self.shape[dim + 1..].iter().product();
        let mid = self.shape[dim];

        let mut out = Vec::with_capacity(outer * len * inner);
        for o in 0..outer {
            let base = o * mid * inner;
            let lo = base + start * inner;
            let hi = lo + len * inner;
            out.extend_from_slice(&self.data[lo..hi]);
        }

        let mut new_shape = self.shape.clone();
        new_shape[dim] = len;
        Ok(Self {
            data: out,
            shape: new_shape,
        })
    }

    /// Applies a function to every element, producing a new tensor.
    #[must_use]
    pub fn map<U: Scalar>(&self, f: impl Fn(T) -> U) -> Tensor<U> {
        Tensor {
            data: self.data.iter().copied().map(f).collect(),
            shape: self.shape.clone(),
        }
    }
}

// =============================================================================
// Numeric Operations
// =============================================================================

impl<T: Numeric> Tensor<T> {
    /// Creates a tensor filled with zeros.
    #[must_use]
    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            data: vec![T::zero(); numel(shape)],
            shape: shape.to_vec(),
        }
    }

    /// Creates a tensor filled with a constant value.
    #[must_use]
    pub fn full(shape: &[usize], value: T) -> Self {
        Self {
            data: vec![value; numel(shape)],
            shape: shape.to_vec(),
        }
    }

    /// Element-wise addition of two tensors of identical shape.
    pub fn add(&self, other: &Self) -> Result<Self> {
        if self.shape != other.shape {
            return Err(Error::shape_mismatch(&self.shape, &other.shape));
        }
        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(&a, &b)| a + b)
            .collect();
        Ok(Self {
            data,
            shape: self.shape.clone(),
        })
    }

    /// Broadcast-adds a 1-D tensor over the last axis.
    ///
    /// For `self: [.., n]` and `row: [n]`, adds `row` to every length-`n`
    /// run of the buffer. This is the bias-add used by linear layers.
    pub fn add_row(&self, row: &Self) -> Result<Self> {
        if row.ndim() != 1 {
            return Err(Error::invalid_operation("add_row requires a 1-D operand"));
        }
        let n = row.shape[0];
        if self.ndim() == 0 || self.shape[self.ndim() - 1] != n {
            return Err(Error::shape_mismatch(&self.shape, &row.shape));
        }
        let mut data = self.data.clone();
        for chunk in data.chunks_mut(n) {
            for (d, &b) in chunk.iter_mut().zip(row.data.iter()) {
                *d += b;
            }
        }
        Ok(Self {
            data,
            shape: self.shape.clone(),
        })
    }

    /// Multiplies every element by a scalar.
    #[must_use]
    pub fn mul_scalar(&self, value: T) -> Self {
        Self {
            data: self.data.iter().map(|&x| x * value).collect(),
            shape: self.shape.clone(),
        }
    }

    /// Transposes a 2-D tensor, materializing the result.
    pub fn transpose(&self) -> Result<Self> {
        if self.ndim() != 2 {
            return Err(Error::invalid_operation("transpose requires a 2-D tensor"));
        }
        let (rows, cols) = (self.shape[0], self.shape[1]);
        let mut data = vec![T::zero(); rows * cols];
        for r in 0..rows {
            for c in 0..cols {
                data[c * rows + r] = self.data[r * cols + c];
            }
        }
        Ok(Self {
            data,
            shape: vec![cols, rows],
        })
    }

    /// Matrix multiply of two 2-D tensors: `[m, k] @ [k, n] -> [m, n]`.
    pub fn matmul(&self, other: &Self) -> Result<Self> {
        if self.ndim() != 2 || other.ndim() != 2 {
            return Err(Error::invalid_operation("matmul requires 2-D tensors"));
        }
        let (m, k) = (self.shape[0], self.shape[1]);
        let (k2, n) = (other.shape[0], other.shape[1]);
        if k != k2 {
            return Err(Error::shape_mismatch(&[m, k], &[k2, n]));
        }

        let mut out = vec![T::zero(); m * n];
        // i-k-j loop order keeps the inner loop streaming over both the
        // right operand row and the output row.
        for i in 0..m {
            for p in 0..k {
                let a = self.data[i * k + p];
                let rhs_row = &other.data[p * n..(p + 1) * n];
                let out_row = &mut out[i * n..(i + 1) * n];
                for (o, &b) in out_row.iter_mut().zip(rhs_row.iter()) {
                    *o += a * b;
                }
            }
        }

        Ok(Self {
            data: out,
            shape: vec![m, n],
        })
    }
}

// =============================================================================
// Formatting
// =============================================================================

impl<T: Scalar> fmt::Debug for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("dtype", &T::DTYPE)
            .field("numel", &self.data.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec() {
        let t = Tensor::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        assert_eq!(t.shape(), &[2, 2]);
        assert_eq!(t.numel(), 4);
    }

    #[test]
    fn test_from_vec_shape_mismatch() {
        let result = Tensor::from_vec(vec![1.0f32, 2.0, 3.0], &[2, 2]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zeros() {
        let t = Tensor::<f32>::zeros(&[3, 2]);
        assert_eq!(t.shape(), &[3, 2]);
        assert!(t.as_slice().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_empty_tensor() {
        let t = Tensor::from_vec(Vec::<f32>::new(), &[0, 4]).unwrap();
        assert!(t.is_empty());
        assert_eq!(t.numel(), 0);
    }

    #[test]
    fn test_matmul() {
        // [1 2; 3 4] @ [5 6; 7 8] = [19 22; 43 50]
        let a = Tensor::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        let b = Tensor::from_vec(vec![5.0f32, 6.0, 7.0, 8.0], &[2, 2]).unwrap();
        let c = a.matmul(&b).unwrap();
        assert_eq!(c.to_vec(), vec![19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_matmul_shape_mismatch() {
        let a = Tensor::<f32>::zeros(&[2, 3]);
        let b = Tensor::<f32>::zeros(&[4, 2]);
        assert!(a.matmul(&b).is_err());
    }

    #[test]
    fn test_transpose() {
        let t = Tensor::from_vec(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let tt = t.transpose().unwrap();
        assert_eq!(tt.shape(), &[3, 2]);
        assert_eq!(tt.to_vec(), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_narrow_rows() {
        let t = Tensor::from_vec(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[3, 2]).unwrap();
        let mid = t.narrow(0, 1, 2).unwrap();
        assert_eq!(mid.shape(), &[2, 2]);
        assert_eq!(mid.to_vec(), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_narrow_cols() {
        let t = Tensor::from_vec(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let right = t.narrow(1, 1, 2).unwrap();
        assert_eq!(right.shape(), &[2, 2]);
        assert_eq!(right.to_vec(), vec![2.0, 3.0, 5.0, 6.0]);
    }

    #[test]
    fn test_narrow_out_of_bounds() {
        let t = Tensor::<f32>::zeros(&[2, 3]);
        assert!(t.narrow(1, 2, 2).is_err());
        assert!(t.narrow(2, 0, 1).is_err());
    }

    #[test]
    fn test_add_row() {
        let t = Tensor::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        let bias = Tensor::from_vec(vec![10.0f32, 20.0], &[2]).unwrap();
        let out = t.add_row(&bias).unwrap();
        assert_eq!(out.to_vec(), vec![11.0, 22.0, 13.0, 24.0]);
    }

    #[test]
    fn test_row_access() {
        let t = Tensor::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        assert_eq!(t.row(1).unwrap(), &[3.0, 4.0]);
        assert!(t.row(2).is_err());
    }
}
