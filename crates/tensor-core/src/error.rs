// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for shape, tensor, and quantization operations.

use crate::{DType, Shape};

/// Errors that can occur during shape and tensor operations.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// An axis index is outside the valid range for the shape's rank.
    #[error("axis {axis} out of range for rank {rank}")]
    InvalidAxis { axis: i64, rank: usize },

    /// Attempted to squeeze an axis whose dimension is not 1.
    #[error("cannot squeeze axis {axis}: dimension is {dim}, not 1")]
    SqueezeNonUnit { axis: i64, dim: i64 },

    /// The shapes do not hold the same number of elements.
    #[error("cannot reshape {from} ({} elements) to {to} ({} elements)", from.num_elements(), to.num_elements())]
    ReshapeMismatch { from: Shape, to: Shape },

    /// The shapes cannot be broadcast together.
    #[error("shapes {lhs} and {rhs} cannot be broadcast together")]
    BroadcastMismatch { lhs: Shape, rhs: Shape },

    /// `flatten_2d` batch size does not divide the element count.
    #[error("cannot flatten {elements} elements into batches of {batch}")]
    FlattenBatchMismatch { elements: i64, batch: i64 },

    /// A per-axis argument list does not match the tensor rank.
    #[error("{what} has length {actual}, expected {expected}")]
    RankMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A slice range is out of bounds or inverted after resolving
    /// negative indices.
    #[error("invalid slice range [{start}, {end}) on axis {axis} with dimension {dim}")]
    InvalidSliceRange {
        axis: usize,
        start: i64,
        end: i64,
        dim: i64,
    },

    /// Transpose axes are not a permutation of `[0, rank)`.
    #[error("axes {axes:?} are not a permutation of 0..{rank}")]
    InvalidPermutation { axes: Vec<usize>, rank: usize },

    /// The operation requires a contiguous tensor.
    #[error("{op} requires a contiguous tensor")]
    NotContiguous { op: &'static str },

    /// A quantization scale is zero or negative.
    #[error("quantization scale must be positive, got {scale}")]
    NonPositiveScale { scale: f32 },

    /// The quantization range is empty or inverted.
    #[error("invalid quantization range [{min}, {max}]: min must be less than max")]
    InvalidQuantRange { min: f32, max: f32 },

    /// Per-channel quantization parameters without any channels.
    #[error("per-channel quantization requires at least one channel")]
    EmptyPerChannel,

    /// A symmetric quantization scheme carries a non-zero zero point.
    #[error("symmetric quantization requires zero_point == 0, got {zero_point}")]
    SymmetricZeroPoint { zero_point: i32 },

    /// Parallel buffers passed to a batch operation differ in length.
    #[error("{what} has length {actual}, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The data type is not supported by this operation.
    #[error("unsupported dtype {dtype} for {op}")]
    UnsupportedDType { op: &'static str, dtype: DType },

    /// The backing allocator could not provide storage.
    #[error("tensor allocation of {bytes} bytes failed")]
    AllocationFailed { bytes: usize },

    /// A non-empty tensor has no backing storage.
    #[error("tensor has no backing storage")]
    NoStorage,
}
