// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Raw memory buffer with ownership semantics and optional debug canary
//! guards for overflow detection.
//!
//! With canaries enabled the layout is:
//!
//! ```text
//! base                       data            data + size
//!  │ [canary: 4 bytes] │ [user region…] │ [canary: 4 bytes]
//! ```
//!
//! A trampled marker is detectable through [`Buffer::validate_canary`];
//! nothing aborts on its own.

use crate::{sys, Allocator, MemoryError};
use std::ptr;
use std::sync::Arc;

/// Sentinel written before and after the user region.
const CANARY_VALUE: u32 = 0xDEAD_BEEF;

/// Size of one canary marker in bytes.
const CANARY_BYTES: usize = std::mem::size_of::<u32>();

/// Owned or borrowed raw memory with alignment and optional canaries.
pub struct Buffer {
    /// Pointer returned by the allocator (includes the canary prefix).
    base: *mut u8,
    /// User-visible data pointer (after the canary prefix).
    data: *mut u8,
    size: usize,
    alignment: usize,
    owns: bool,
    use_canary: bool,
    /// Release goes back through this allocator when the allocation came
    /// from one; `None` means the platform-aligned path.
    alloc: Option<Arc<dyn Allocator>>,
}

impl Default for Buffer {
    fn default() -> Self {
        Self {
            base: ptr::null_mut(),
            data: ptr::null_mut(),
            size: 0,
            alignment: sys::DEFAULT_ALIGNMENT,
            owns: false,
            use_canary: false,
            alloc: None,
        }
    }
}

impl Buffer {
    /// Allocates a new owned buffer.
    ///
    /// When `allocator` is provided the memory comes from it (and is
    /// released through it); otherwise the platform-aligned path is used.
    pub fn new(
        size: usize,
        alignment: usize,
        allocator: Option<Arc<dyn Allocator>>,
        use_canary: bool,
    ) -> Result<Self, MemoryError> {
        let mut buffer = Self::default();
        buffer.allocate(size, alignment, allocator, use_canary)?;
        Ok(buffer)
    }

    /// Wraps externally managed memory.
    ///
    /// # Safety
    /// `data` must be valid for reads and writes of `size` bytes for the
    /// lifetime of the buffer. If `owned` is true, `data` must have been
    /// obtained from [`sys::aligned_alloc`] and ownership transfers to
    /// the buffer.
    pub unsafe fn from_raw(
        data: *mut u8,
        size: usize,
        alignment: usize,
        owned: bool,
        use_canary: bool,
    ) -> Self {
        Self {
            base: data,
            data,
            size,
            alignment,
            owns: owned,
            use_canary,
            alloc: None,
        }
    }

    /// (Re-)allocates the buffer, releasing any currently owned memory
    /// first.
    pub fn allocate(
        &mut self,
        size: usize,
        alignment: usize,
        allocator: Option<Arc<dyn Allocator>>,
        use_canary: bool,
    ) -> Result<(), MemoryError> {
        if self.owns {
            self.deallocate();
        }
        if size == 0 {
            return Err(MemoryError::ZeroSizedAllocation);
        }
        if !sys::is_power_of_two(alignment) {
            return Err(MemoryError::InvalidAlignment { alignment });
        }

        self.size = size;
        self.alignment = alignment;
        self.use_canary = use_canary;

        let total = if use_canary {
            size + 2 * CANARY_BYTES
        } else {
            size
        };

        self.base = match &allocator {
            Some(a) => a
                .allocate_aligned(total, alignment)
                .map(|p| p.as_ptr())
                .unwrap_or(ptr::null_mut()),
            None => sys::aligned_alloc(total, alignment),
        };

        if self.base.is_null() {
            self.data = ptr::null_mut();
            self.size = 0;
            return Err(MemoryError::AllocationFailed { bytes: total });
        }

        self.owns = true;
        self.alloc = allocator;

        if use_canary {
            // SAFETY: base..base+total is a valid allocation; the suffix
            // may be unaligned for u32, so use unaligned writes.
            unsafe {
                (self.base as *mut u32).write_unaligned(CANARY_VALUE);
                self.data = self.base.add(CANARY_BYTES);
                (self.data.add(self.size) as *mut u32).write_unaligned(CANARY_VALUE);
            }
        } else {
            self.data = self.base;
        }

        Ok(())
    }

    /// Releases owned memory. Does nothing beyond clearing pointers if
    /// the buffer does not own its data.
    pub fn deallocate(&mut self) {
        if self.base.is_null() || !self.owns {
            self.base = ptr::null_mut();
            self.data = ptr::null_mut();
            self.size = 0;
            return;
        }

        if self.use_canary {
            // Wipe the markers so a stale read cannot look valid.
            // SAFETY: base/data/size describe the live allocation.
            unsafe {
                (self.base as *mut u32).write_unaligned(0);
                (self.data.add(self.size) as *mut u32).write_unaligned(0);
            }
        }

        // SAFETY: base was obtained from `self.alloc` or sys::aligned_alloc
        // when `owns` was set, and is released exactly once.
        unsafe {
            match self.alloc.take() {
                Some(a) => a.deallocate(self.base),
                None => sys::aligned_free(self.base),
            }
        }

        self.base = ptr::null_mut();
        self.data = ptr::null_mut();
        self.size = 0;
        self.owns = false;
    }

    /// User data pointer (null when unallocated).
    pub fn data(&self) -> *const u8 {
        self.data
    }

    /// Mutable user data pointer.
    pub fn data_mut(&mut self) -> *mut u8 {
        self.data
    }

    /// User region size in bytes (excludes canaries).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Alignment the buffer was allocated with.
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Whether this buffer releases its memory on drop.
    pub fn owns_data(&self) -> bool {
        self.owns
    }

    /// Whether canary guards surround the user region.
    pub fn has_canary(&self) -> bool {
        self.use_canary
    }

    /// Checks the canary markers. Always `true` when canaries are
    /// disabled or the buffer is empty.
    pub fn validate_canary(&self) -> bool {
        if !self.use_canary || self.base.is_null() || self.size == 0 {
            return true;
        }
        // SAFETY: base/data/size describe the live allocation.
        unsafe {
            let prefix = (self.base as *const u32).read_unaligned();
            let suffix = (self.data.add(self.size) as *const u32).read_unaligned();
            prefix == CANARY_VALUE && suffix == CANARY_VALUE
        }
    }

    /// Views the user region as a byte slice (empty when unallocated).
    pub fn as_slice(&self) -> &[u8] {
        if self.data.is_null() || self.size == 0 {
            return &[];
        }
        // SAFETY: data points at `size` initialised-or-written bytes owned
        // or borrowed by this buffer.
        unsafe { std::slice::from_raw_parts(self.data, self.size) }
    }

    /// Mutable view of the user region.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        if self.data.is_null() || self.size == 0 {
            return &mut [];
        }
        // SAFETY: as in `as_slice`, plus &mut self guarantees exclusivity.
        unsafe { std::slice::from_raw_parts_mut(self.data, self.size) }
    }
}

/// Deep copy: clones reallocate through the platform path and memcpy the
/// user region.
impl Clone for Buffer {
    fn clone(&self) -> Self {
        let mut copy = Self::default();
        if !self.data.is_null() && self.size > 0 {
            if copy
                .allocate(self.size, self.alignment, None, self.use_canary)
                .is_ok()
            {
                // SAFETY: both regions are `size` bytes and disjoint.
                unsafe {
                    ptr::copy_nonoverlapping(self.data, copy.data, self.size);
                }
            }
        }
        copy
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if self.owns {
            self.deallocate();
        }
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("size", &self.size)
            .field("alignment", &self.alignment)
            .field("owns", &self.owns)
            .field("use_canary", &self.use_canary)
            .field("allocated", &!self.base.is_null())
            .finish()
    }
}
