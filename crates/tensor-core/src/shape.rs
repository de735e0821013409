// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor shape descriptors and dimension utilities.

use crate::{DType, TensorError};
use std::fmt;

/// Describes the dimensionality of a [`crate::Tensor`].
///
/// Dimensions are signed 64-bit values; negative dimensions are invalid
/// and rejected by [`Shape::is_valid`]. A rank-0 shape describes a scalar
/// and holds one element.
///
/// # Examples
/// ```
/// use tensor_core::Shape;
/// let s = Shape::new(vec![2, 3, 4]);
/// assert_eq!(s.rank(), 3);
/// assert_eq!(s.num_elements(), 24);
/// assert_eq!(s.strides(), vec![12, 4, 1]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Shape {
    dims: Vec<i64>,
}

impl Shape {
    /// Creates a new shape from the given dimensions.
    pub fn new(dims: Vec<i64>) -> Self {
        Self { dims }
    }

    /// Creates a scalar shape (rank 0).
    pub fn scalar() -> Self {
        Self { dims: vec![] }
    }

    /// Creates a 1-D shape.
    pub fn vector(len: i64) -> Self {
        Self { dims: vec![len] }
    }

    /// Creates a 2-D shape (matrix).
    pub fn matrix(rows: i64, cols: i64) -> Self {
        Self {
            dims: vec![rows, cols],
        }
    }

    /// Returns the number of dimensions (rank).
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Returns the total number of elements.
    ///
    /// For a scalar shape (rank 0), returns 1.
    pub fn num_elements(&self) -> i64 {
        if self.dims.is_empty() {
            1
        } else {
            self.dims.iter().product()
        }
    }

    /// Returns the dimensions as a slice.
    pub fn dims(&self) -> &[i64] {
        &self.dims
    }

    /// Returns the size of a specific dimension, or `None` if out of
    /// bounds.
    pub fn dim(&self, index: usize) -> Option<i64> {
        self.dims.get(index).copied()
    }

    /// `true` when no dimension is negative.
    pub fn is_valid(&self) -> bool {
        self.dims.iter().all(|&d| d >= 0)
    }

    /// `true` for rank 0, or rank 1 with a single element.
    pub fn is_scalar(&self) -> bool {
        self.rank() == 0 || (self.rank() == 1 && self.dims[0] == 1)
    }

    /// `true` for rank 1.
    pub fn is_vector(&self) -> bool {
        self.rank() == 1
    }

    /// `true` for rank 2.
    pub fn is_matrix(&self) -> bool {
        self.rank() == 2
    }

    /// Computes the memory footprint in bytes for a given [`DType`].
    pub fn size_bytes(&self, dtype: DType) -> usize {
        self.num_elements().max(0) as usize * dtype.size_bytes()
    }

    /// Resolves a possibly negative axis against this shape's rank.
    fn resolve_axis(&self, axis: i64) -> Result<usize, TensorError> {
        let rank = self.rank() as i64;
        let resolved = if axis < 0 { axis + rank } else { axis };
        if resolved < 0 || resolved >= rank {
            return Err(TensorError::InvalidAxis {
                axis,
                rank: self.rank(),
            });
        }
        Ok(resolved as usize)
    }

    /// Removes dimensions of size 1.
    ///
    /// With `axis == -1`, every unit dimension is dropped. Any other
    /// axis (negative values resolved by adding the rank) must name a
    /// dimension of size 1.
    pub fn squeeze(&self, axis: i64) -> Result<Shape, TensorError> {
        if axis == -1 {
            let dims: Vec<i64> = self.dims.iter().copied().filter(|&d| d != 1).collect();
            return Ok(Shape::new(dims));
        }

        let resolved = self.resolve_axis(axis)?;
        if self.dims[resolved] != 1 {
            return Err(TensorError::SqueezeNonUnit {
                axis,
                dim: self.dims[resolved],
            });
        }
        let mut dims = self.dims.clone();
        dims.remove(resolved);
        Ok(Shape::new(dims))
    }

    /// Drops every dimension of size 1.
    pub fn squeeze_all(&self) -> Shape {
        // Axis -1 squeezes everything and cannot fail.
        self.squeeze(-1).expect("squeeze(-1) is infallible")
    }

    /// Inserts a dimension of size 1 at `axis`.
    ///
    /// The valid range is `[-(rank + 1), rank]`; negative axes are
    /// resolved by adding `rank + 1`.
    pub fn unsqueeze(&self, axis: i64) -> Result<Shape, TensorError> {
        let rank = self.rank() as i64;
        let resolved = if axis < 0 { axis + rank + 1 } else { axis };
        if resolved < 0 || resolved > rank {
            return Err(TensorError::InvalidAxis {
                axis,
                rank: self.rank(),
            });
        }
        let mut dims = self.dims.clone();
        dims.insert(resolved as usize, 1);
        Ok(Shape::new(dims))
    }

    /// Two shapes are reshape-compatible when they hold the same number
    /// of elements.
    pub fn can_reshape(from: &Shape, to: &Shape) -> bool {
        from.num_elements() == to.num_elements()
    }

    /// See [`Shape::can_reshape`].
    pub fn can_reshape_to(&self, other: &Shape) -> bool {
        Shape::can_reshape(self, other)
    }

    /// Broadcasts two shapes together.
    ///
    /// Dimensions are aligned from the right; each pair must be equal or
    /// contain a 1. The output dimension is the pairwise maximum.
    pub fn broadcast(lhs: &Shape, rhs: &Shape) -> Result<Shape, TensorError> {
        let rank1 = lhs.rank();
        let rank2 = rhs.rank();
        let result_rank = rank1.max(rank2);

        let offset1 = result_rank - rank1;
        let offset2 = result_rank - rank2;

        let mut result = vec![0i64; result_rank];
        for i in 0..result_rank {
            let dim1 = if i >= offset1 { lhs.dims[i - offset1] } else { 1 };
            let dim2 = if i >= offset2 { rhs.dims[i - offset2] } else { 1 };

            if dim1 != dim2 && dim1 != 1 && dim2 != 1 {
                return Err(TensorError::BroadcastMismatch {
                    lhs: lhs.clone(),
                    rhs: rhs.clone(),
                });
            }
            result[i] = dim1.max(dim2);
        }

        Ok(Shape::new(result))
    }

    /// See [`Shape::broadcast`].
    pub fn broadcast_with(&self, other: &Shape) -> Result<Shape, TensorError> {
        Shape::broadcast(self, other)
    }

    /// Computes row-major (C-order) strides in **element counts**.
    ///
    /// For a shape `[2, 3, 4]` the strides are `[12, 4, 1]`. Byte strides
    /// are a tensor concern; see [`crate::Tensor::strides`].
    pub fn strides(&self) -> Vec<i64> {
        if self.dims.is_empty() {
            return vec![];
        }
        let mut result = vec![0i64; self.dims.len()];
        let mut stride = 1i64;
        for i in (0..self.dims.len()).rev() {
            result[i] = stride;
            stride *= self.dims[i];
        }
        result
    }

    /// Collapses to a 1-D shape holding every element.
    pub fn flatten(&self) -> Shape {
        Shape::new(vec![self.num_elements()])
    }

    /// Collapses to `[batch_size, num_elements / batch_size]`.
    ///
    /// Fails when `batch_size` does not divide the element count.
    pub fn flatten_2d(&self, batch_size: i64) -> Result<Shape, TensorError> {
        let elements = self.num_elements();
        if batch_size == 0 || elements % batch_size != 0 {
            return Err(TensorError::FlattenBatchMismatch {
                elements,
                batch: batch_size,
            });
        }
        Ok(Shape::new(vec![batch_size, elements / batch_size]))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

/// Convenience: `Shape::from(vec![2, 3])`.
impl From<Vec<i64>> for Shape {
    fn from(dims: Vec<i64>) -> Self {
        Self::new(dims)
    }
}

/// Convenience: `Shape::from(&[2, 3][..])`.
impl From<&[i64]> for Shape {
    fn from(dims: &[i64]) -> Self {
        Self::new(dims.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_shape() {
        let s = Shape::scalar();
        assert_eq!(s.rank(), 0);
        assert_eq!(s.num_elements(), 1);
        assert!(s.strides().is_empty());
        assert!(s.is_scalar());
    }

    #[test]
    fn test_basic_properties() {
        let s = Shape::new(vec![2, 3, 4]);
        assert_eq!(s.rank(), 3);
        assert_eq!(s.num_elements(), 24);
        assert_eq!(s.dim(0), Some(2));
        assert_eq!(s.dim(2), Some(4));
        assert_eq!(s.dim(3), None);
        assert_eq!(s.dims(), &[2, 3, 4]);
    }

    #[test]
    fn test_strides_are_element_counts() {
        assert_eq!(Shape::new(vec![2, 3, 4]).strides(), vec![12, 4, 1]);
        assert_eq!(Shape::vector(5).strides(), vec![1]);
        assert_eq!(Shape::matrix(3, 4).strides(), vec![4, 1]);
    }

    #[test]
    fn test_size_bytes() {
        let s = Shape::new(vec![10, 20]);
        assert_eq!(s.size_bytes(DType::F32), 800);
        assert_eq!(s.size_bytes(DType::F16), 400);
        assert_eq!(s.size_bytes(DType::I8), 200);
        assert_eq!(s.size_bytes(DType::Unknown), 0);
    }

    #[test]
    fn test_squeeze_all() {
        assert_eq!(
            Shape::new(vec![1, 3, 1]).squeeze(-1).unwrap(),
            Shape::vector(3)
        );
        assert_eq!(
            Shape::new(vec![1, 1]).squeeze_all(),
            Shape::scalar()
        );
        assert_eq!(
            Shape::new(vec![2, 3]).squeeze_all(),
            Shape::new(vec![2, 3])
        );
    }

    #[test]
    fn test_squeeze_specific_axis() {
        let s = Shape::new(vec![1, 3, 1]);
        assert_eq!(s.squeeze(0).unwrap(), Shape::new(vec![3, 1]));
        assert_eq!(s.squeeze(2).unwrap(), Shape::new(vec![1, 3]));
        // Negative axes resolve by adding the rank (-1 is the squeeze-all
        // sentinel, so the last axis is reached via its positive index).
        assert_eq!(s.squeeze(-3).unwrap(), Shape::new(vec![3, 1]));
    }

    #[test]
    fn test_squeeze_errors() {
        let s = Shape::new(vec![1, 3]);
        assert!(matches!(
            s.squeeze(1),
            Err(TensorError::SqueezeNonUnit { dim: 3, .. })
        ));
        assert!(matches!(
            s.squeeze(5),
            Err(TensorError::InvalidAxis { .. })
        ));
    }

    #[test]
    fn test_unsqueeze() {
        let s = Shape::new(vec![2, 3]);
        assert_eq!(s.unsqueeze(0).unwrap(), Shape::new(vec![1, 2, 3]));
        assert_eq!(s.unsqueeze(2).unwrap(), Shape::new(vec![2, 3, 1]));
        assert_eq!(s.unsqueeze(-1).unwrap(), Shape::new(vec![2, 3, 1]));
        assert_eq!(s.unsqueeze(-3).unwrap(), Shape::new(vec![1, 2, 3]));
        assert!(s.unsqueeze(3).is_err());
        assert!(s.unsqueeze(-4).is_err());
    }

    #[test]
    fn test_can_reshape() {
        let a = Shape::new(vec![2, 6]);
        let b = Shape::new(vec![3, 4]);
        let c = Shape::new(vec![5]);
        assert!(Shape::can_reshape(&a, &b));
        assert!(a.can_reshape_to(&b));
        assert!(!a.can_reshape_to(&c));
    }

    #[test]
    fn test_broadcast() {
        let out = Shape::broadcast(&Shape::new(vec![2, 1, 3]), &Shape::new(vec![1, 4, 3])).unwrap();
        assert_eq!(out, Shape::new(vec![2, 4, 3]));

        // Rank extension from the right.
        let out = Shape::broadcast(&Shape::new(vec![4, 3]), &Shape::vector(3)).unwrap();
        assert_eq!(out, Shape::new(vec![4, 3]));

        let err = Shape::broadcast(&Shape::new(vec![2, 3]), &Shape::new(vec![4, 3]));
        assert!(matches!(err, Err(TensorError::BroadcastMismatch { .. })));
    }

    #[test]
    fn test_broadcast_identity_and_symmetry() {
        let shapes = [
            Shape::scalar(),
            Shape::vector(4),
            Shape::new(vec![2, 1, 3]),
        ];
        for s in &shapes {
            assert_eq!(Shape::broadcast(s, s).unwrap(), *s);
        }
        let a = Shape::new(vec![2, 1]);
        let b = Shape::new(vec![1, 5]);
        assert_eq!(
            Shape::broadcast(&a, &b).unwrap(),
            Shape::broadcast(&b, &a).unwrap()
        );
    }

    #[test]
    fn test_flatten() {
        let s = Shape::new(vec![2, 3, 4]);
        assert_eq!(s.flatten(), Shape::vector(24));
        assert_eq!(s.flatten_2d(2).unwrap(), Shape::new(vec![2, 12]));
        assert_eq!(s.flatten_2d(6).unwrap(), Shape::new(vec![6, 4]));
        assert!(s.flatten_2d(5).is_err());
        assert!(s.flatten_2d(0).is_err());
    }

    #[test]
    fn test_is_valid() {
        assert!(Shape::new(vec![2, 3]).is_valid());
        assert!(Shape::scalar().is_valid());
        assert!(Shape::new(vec![0, 3]).is_valid());
        assert!(!Shape::new(vec![-1, 3]).is_valid());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Shape::new(vec![2, 3, 4])), "[2, 3, 4]");
        assert_eq!(format!("{}", Shape::scalar()), "[]");
    }

    #[test]
    fn test_from_conversions() {
        let s1: Shape = vec![2i64, 3].into();
        let s2: Shape = (&[2i64, 3][..]).into();
        assert_eq!(s1, s2);
    }

    #[test]
    fn test_zero_sized_dims() {
        let s = Shape::new(vec![0, 4]);
        assert_eq!(s.num_elements(), 0);
        assert_eq!(s.size_bytes(DType::F32), 0);
    }

    #[test]
    fn test_serde_roundtrip() {
        let s = Shape::new(vec![2, 3]);
        let json = serde_json::to_string(&s).unwrap();
        let back: Shape = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
