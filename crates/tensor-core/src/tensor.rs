// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Core tensor type and view operations.
//!
//! A [`Tensor`] pairs shape/dtype/stride metadata with a raw storage
//! pointer. Storage is either owned (allocated through an
//! [`Allocator`] and released through the same one on drop) or borrowed
//! (wrapping caller-managed memory, as operator outputs and graph inputs
//! do).
//!
//! # Views
//! [`slice`](Tensor::slice), [`reshape`](Tensor::reshape), and
//! [`transpose`](Tensor::transpose) produce non-owning views sharing the
//! parent's storage. A view is only valid while the storage it aliases
//! is; the graph executor keeps bindings transient for exactly this
//! reason.
//!
//! # Copy semantics
//! `Clone` is intentionally **shallow**: the clone shares the data
//! pointer and never owns it. Deep copies must be explicit.

use crate::{DType, Element, QuantParams, Shape, TensorError};
use memory_manager::{sys, Allocator};
use std::fmt;
use std::ptr;
use std::sync::Arc;

/// An n-dimensional tensor with byte strides and optional quantization
/// parameters.
pub struct Tensor {
    shape: Shape,
    dtype: DType,
    /// Byte offset to advance one step along each axis.
    strides: Vec<i64>,
    data: *mut u8,
    owns_data: bool,
    /// Release goes back through this allocator when owning storage came
    /// from one; `None` means the platform-aligned path.
    alloc: Option<Arc<dyn Allocator>>,
    quant: QuantParams,
}

impl Default for Tensor {
    /// An empty tensor: rank 0, `Unknown` dtype, no storage.
    fn default() -> Self {
        Self {
            shape: Shape::scalar(),
            dtype: DType::Unknown,
            strides: vec![],
            data: ptr::null_mut(),
            owns_data: false,
            alloc: None,
            quant: QuantParams::default(),
        }
    }
}

impl Tensor {
    /// Creates a tensor with metadata only — no storage is allocated.
    /// Strides are derived for a contiguous row-major layout.
    pub fn with_shape(shape: Shape, dtype: DType) -> Self {
        let mut tensor = Self {
            shape,
            dtype,
            strides: vec![],
            data: ptr::null_mut(),
            owns_data: false,
            alloc: None,
            quant: QuantParams::default(),
        };
        tensor.compute_strides();
        tensor
    }

    /// Creates a tensor whose storage comes from `allocator`.
    ///
    /// The storage is zero-initialised and owned: dropping the tensor
    /// releases it through the same allocator. A zero-element shape
    /// yields a storage-less tensor.
    ///
    /// # Errors
    /// [`TensorError::AllocationFailed`] when the allocator returns null.
    pub fn with_allocator(
        shape: Shape,
        dtype: DType,
        allocator: &Arc<dyn Allocator>,
    ) -> Result<Self, TensorError> {
        let mut tensor = Self::with_shape(shape, dtype);
        let bytes = tensor.byte_size();
        if bytes == 0 {
            return Ok(tensor);
        }

        let ptr = allocator
            .allocate(bytes)
            .ok_or(TensorError::AllocationFailed { bytes })?;
        // SAFETY: the allocator handed us `bytes` writable bytes.
        unsafe { ptr::write_bytes(ptr.as_ptr(), 0, bytes) };

        tensor.data = ptr.as_ptr();
        tensor.owns_data = true;
        tensor.alloc = Some(Arc::clone(allocator));
        Ok(tensor)
    }

    /// Creates a non-owning tensor over a caller-managed slice.
    ///
    /// This is the operator-author pattern: own a `Vec<T>`, wrap it, and
    /// bind the wrapper to an output value. The tensor borrows the
    /// storage without tracking its lifetime, so it must not outlive (or
    /// observe reallocation of) the slice's backing memory.
    ///
    /// # Errors
    /// [`TensorError::LengthMismatch`] when the slice does not hold
    /// exactly `shape.num_elements()` elements.
    pub fn wrap_slice<T: Element>(shape: Shape, data: &mut [T]) -> Result<Self, TensorError> {
        let expected = shape.num_elements().max(0) as usize;
        if data.len() != expected {
            return Err(TensorError::LengthMismatch {
                what: "wrapped slice",
                expected,
                actual: data.len(),
            });
        }
        let mut tensor = Self::with_shape(shape, T::DTYPE);
        tensor.data = data.as_mut_ptr() as *mut u8;
        Ok(tensor)
    }

    /// Creates a tensor over raw memory.
    ///
    /// # Safety
    /// `data` must be valid for reads and writes of
    /// `shape.size_bytes(dtype)` bytes for the tensor's lifetime. With
    /// `owns_data`, the pointer must come from
    /// [`memory_manager::sys::aligned_alloc`] and ownership transfers to
    /// the tensor.
    pub unsafe fn from_raw_parts(
        shape: Shape,
        dtype: DType,
        data: *mut u8,
        owns_data: bool,
    ) -> Self {
        let mut tensor = Self::with_shape(shape, dtype);
        tensor.data = data;
        tensor.owns_data = owns_data;
        tensor
    }

    /// Attaches quantization parameters (builder style).
    pub fn with_quant_params(mut self, params: QuantParams) -> Self {
        self.quant = params;
        self
    }

    // ==================== Metadata accessors ====================

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn dims(&self) -> &[i64] {
        self.shape.dims()
    }

    pub fn dim(&self, index: usize) -> Option<i64> {
        self.shape.dim(index)
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    /// Size of a single element in bytes.
    pub fn element_size(&self) -> usize {
        self.dtype.size_bytes()
    }

    pub fn num_elements(&self) -> i64 {
        self.shape.num_elements()
    }

    /// Total storage footprint in bytes.
    pub fn byte_size(&self) -> usize {
        self.num_elements().max(0) as usize * self.element_size()
    }

    pub fn is_empty(&self) -> bool {
        self.num_elements() == 0
    }

    // ==================== Storage accessors ====================

    pub fn data(&self) -> *const u8 {
        self.data
    }

    pub fn data_mut(&mut self) -> *mut u8 {
        self.data
    }

    pub fn owns_data(&self) -> bool {
        self.owns_data
    }

    /// Byte strides, one per axis.
    pub fn strides(&self) -> &[i64] {
        &self.strides
    }

    /// Byte stride for one axis (0 when out of range).
    pub fn stride(&self, axis: usize) -> i64 {
        self.strides.get(axis).copied().unwrap_or(0)
    }

    /// Resets the strides to the contiguous row-major layout for the
    /// current shape and dtype.
    pub fn compute_strides(&mut self) {
        self.strides.clear();
        let rank = self.rank();
        if rank == 0 {
            return;
        }
        self.strides.resize(rank, 0);
        let mut stride = self.element_size() as i64;
        for i in (0..rank).rev() {
            self.strides[i] = stride;
            stride *= self.shape.dims()[i];
        }
    }

    /// Checks whether the strides match the contiguous row-major layout.
    /// Rank-0 and zero-element tensors are contiguous.
    pub fn is_contiguous(&self) -> bool {
        if self.rank() == 0 || self.num_elements() == 0 {
            return true;
        }
        let mut expected = self.element_size() as i64;
        for i in (0..self.rank()).rev() {
            if self.stride(i) != expected {
                return false;
            }
            expected *= self.shape.dims()[i];
        }
        true
    }

    /// Re-points the tensor at new storage, releasing any currently
    /// owned data first.
    ///
    /// # Safety
    /// `new_data` must be valid for this tensor's byte size; with
    /// `take_ownership` it must come from
    /// [`memory_manager::sys::aligned_alloc`].
    pub unsafe fn set_data(&mut self, new_data: *mut u8, take_ownership: bool) {
        self.release();
        self.data = new_data;
        self.owns_data = take_ownership;
    }

    /// Releases owned storage, leaving the tensor storage-less. Does
    /// nothing when the data is not owned.
    pub fn deallocate(&mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.owns_data && !self.data.is_null() {
            // SAFETY: the pointer came from `self.alloc` or
            // sys::aligned_alloc when ownership was taken, and is
            // released exactly once.
            unsafe {
                match self.alloc.take() {
                    Some(a) => a.deallocate(self.data),
                    None => sys::aligned_free(self.data),
                }
            }
        }
        self.alloc = None;
        self.data = ptr::null_mut();
        self.owns_data = false;
    }

    // ==================== Quantization ====================

    /// `true` for `I8`/`U8` storage.
    pub fn is_quantized(&self) -> bool {
        self.dtype.is_quantized()
    }

    pub fn quant_params(&self) -> &QuantParams {
        &self.quant
    }

    pub fn set_quant_params(&mut self, params: QuantParams) {
        self.quant = params;
    }

    // ==================== Views ====================

    fn view_with(&self, shape: Shape, strides: Vec<i64>, data: *mut u8) -> Tensor {
        Tensor {
            shape,
            dtype: self.dtype,
            strides,
            data,
            owns_data: false,
            alloc: None,
            quant: self.quant.clone(),
        }
    }

    /// Creates a slice view: one `(start, end)` half-open range per axis.
    ///
    /// Negative indices are resolved by adding the axis dimension. The
    /// view shares storage, keeps the parent's strides (so it is
    /// generally non-contiguous), and offsets the data pointer by
    /// `Σ start_i · stride_i` bytes. A degenerate range `[k, k)` is
    /// accepted and yields a zero-length axis.
    pub fn slice(&self, ranges: &[(i64, i64)]) -> Result<Tensor, TensorError> {
        if ranges.len() != self.rank() {
            return Err(TensorError::RankMismatch {
                what: "slice ranges",
                expected: self.rank(),
                actual: ranges.len(),
            });
        }

        let mut new_dims = Vec::with_capacity(self.rank());
        let mut offset = 0i64;

        for (axis, &(start, end)) in ranges.iter().enumerate() {
            let dim = self.shape.dims()[axis];
            let start = if start < 0 { start + dim } else { start };
            let end = if end < 0 { end + dim } else { end };

            if start < 0 || start > dim || end < 0 || end > dim || start > end {
                return Err(TensorError::InvalidSliceRange {
                    axis,
                    start,
                    end,
                    dim,
                });
            }

            new_dims.push(end - start);
            offset += start * self.stride(axis);
        }

        let data = self.data.wrapping_offset(offset as isize);
        Ok(self.view_with(Shape::new(new_dims), self.strides.clone(), data))
    }

    /// Creates a reshape view with contiguous strides derived from
    /// `new_shape`.
    ///
    /// # Errors
    /// [`TensorError::ReshapeMismatch`] when element counts differ;
    /// [`TensorError::NotContiguous`] when this tensor is not contiguous.
    pub fn reshape(&self, new_shape: &Shape) -> Result<Tensor, TensorError> {
        if new_shape.num_elements() != self.num_elements() {
            return Err(TensorError::ReshapeMismatch {
                from: self.shape.clone(),
                to: new_shape.clone(),
            });
        }
        if !self.is_contiguous() {
            return Err(TensorError::NotContiguous { op: "reshape" });
        }

        let mut view = self.view_with(new_shape.clone(), vec![], self.data);
        view.compute_strides();
        Ok(view)
    }

    /// Creates a transpose view permuting both dims and strides by
    /// `axes`, which must be a permutation of `[0, rank)`.
    pub fn transpose(&self, axes: &[usize]) -> Result<Tensor, TensorError> {
        if axes.len() != self.rank() {
            return Err(TensorError::RankMismatch {
                what: "transpose axes",
                expected: self.rank(),
                actual: axes.len(),
            });
        }

        let mut seen = vec![false; self.rank()];
        for &axis in axes {
            if axis >= self.rank() || seen[axis] {
                return Err(TensorError::InvalidPermutation {
                    axes: axes.to_vec(),
                    rank: self.rank(),
                });
            }
            seen[axis] = true;
        }

        let new_dims: Vec<i64> = axes.iter().map(|&a| self.shape.dims()[a]).collect();
        let new_strides: Vec<i64> = axes.iter().map(|&a| self.stride(a)).collect();
        Ok(self.view_with(Shape::new(new_dims), new_strides, self.data))
    }

    // ==================== Typed access ====================

    /// Views the storage as a typed slice.
    ///
    /// # Errors
    /// Fails when the dtype does not match `T`, the tensor is
    /// non-contiguous, or a non-empty tensor has no storage.
    pub fn try_slice<T: Element>(&self) -> Result<&[T], TensorError> {
        self.check_typed_access::<T>()?;
        let n = self.num_elements().max(0) as usize;
        if n == 0 {
            return Ok(&[]);
        }
        // SAFETY: dtype/contiguity/null checks above guarantee `n`
        // elements of `T` live at `data`.
        Ok(unsafe { std::slice::from_raw_parts(self.data as *const T, n) })
    }

    /// Mutable typed view of the storage.
    pub fn try_slice_mut<T: Element>(&mut self) -> Result<&mut [T], TensorError> {
        self.check_typed_access::<T>()?;
        let n = self.num_elements().max(0) as usize;
        if n == 0 {
            return Ok(&mut []);
        }
        // SAFETY: as in try_slice, plus &mut self gives exclusivity.
        Ok(unsafe { std::slice::from_raw_parts_mut(self.data as *mut T, n) })
    }

    /// Panicking variant of [`try_slice`](Tensor::try_slice) for code
    /// paths that have already validated the tensor.
    pub fn as_slice<T: Element>(&self) -> &[T] {
        self.try_slice::<T>()
            .unwrap_or_else(|e| panic!("as_slice on {self}: {e}"))
    }

    /// Panicking variant of [`try_slice_mut`](Tensor::try_slice_mut).
    pub fn as_slice_mut<T: Element>(&mut self) -> &mut [T] {
        match self.try_slice_mut::<T>() {
            Ok(slice) => slice,
            Err(e) => panic!("as_slice_mut: {e}"),
        }
    }

    fn check_typed_access<T: Element>(&self) -> Result<(), TensorError> {
        if !T::matches(self.dtype) {
            return Err(TensorError::UnsupportedDType {
                op: "typed slice access",
                dtype: self.dtype,
            });
        }
        if !self.is_contiguous() {
            return Err(TensorError::NotContiguous {
                op: "typed slice access",
            });
        }
        if self.data.is_null() && self.num_elements() > 0 {
            return Err(TensorError::NoStorage);
        }
        Ok(())
    }

    // ==================== Validation ====================

    /// Checks tensor consistency: valid shape, storage present for
    /// non-empty tensors, known dtype, strides materialised per axis,
    /// and positive quantization scales for quantized dtypes.
    pub fn validate(&self) -> bool {
        if !self.shape.is_valid() {
            return false;
        }
        if self.is_empty() {
            return true;
        }
        if self.data.is_null() {
            return false;
        }
        if self.dtype == DType::Unknown {
            return false;
        }
        if self.strides.len() != self.rank() {
            return false;
        }
        if self.is_quantized() && self.quant.validate().is_err() {
            return false;
        }
        true
    }
}

/// Shallow copy: the clone shares the data pointer and does **not** own
/// it. Deep copies are explicit at call sites.
impl Clone for Tensor {
    fn clone(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            dtype: self.dtype,
            strides: self.strides.clone(),
            data: self.data,
            owns_data: false,
            alloc: None,
            quant: self.quant.clone(),
        }
    }
}

impl Drop for Tensor {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tensor(shape={}, dtype={}, elements={}, bytes={}, contiguous={}, owns_data={}",
            self.shape,
            self.dtype,
            self.num_elements(),
            self.byte_size(),
            self.is_contiguous(),
            self.owns_data,
        )?;
        if self.is_quantized() {
            write!(
                f,
                ", scale={}, zp={}",
                self.quant.scale(),
                self.quant.zero_point()
            )?;
        }
        write!(f, ")")
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("dtype", &self.dtype)
            .field("strides", &self.strides)
            .field("data", &self.data)
            .field("owns_data", &self.owns_data)
            .finish()
    }
}
