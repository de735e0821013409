// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Pluggable allocator backends for tensor storage.
//!
//! The [`Allocator`] trait is the minimal surface the rest of the runtime
//! allocates through. Two backends are provided:
//!
//! - [`SystemAllocator`] — platform-aligned allocation, suitable as a
//!   general-purpose default.
//! - [`ArenaAllocator`] — bump allocation from an [`Arena`]; individual
//!   deallocations are no-ops and memory is reclaimed with
//!   [`ArenaAllocator::reset`] between inference runs.
//!
//! Both support optional allocation tracking behind
//! [`AllocatorConfig::track_allocations`]. Tracking maintains a
//! pointer-to-size map under a mutex and is roughly an order of magnitude
//! slower than the untracked path — leave it off outside debugging.

use crate::{sys, AllocationStats, Arena};
use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::Mutex;

/// Configuration shared by the allocator backends.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct AllocatorConfig {
    /// Default alignment for plain `allocate` calls.
    pub alignment: usize,
    /// Maintain a live-pointer map and [`AllocationStats`].
    pub track_allocations: bool,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            alignment: sys::DEFAULT_ALIGNMENT,
            track_allocations: false,
        }
    }
}

impl AllocatorConfig {
    /// Convenience constructor for a tracking-enabled config.
    pub fn tracked() -> Self {
        Self {
            track_allocations: true,
            ..Self::default()
        }
    }
}

/// Abstract allocation backend.
///
/// Allocation failures surface as `None` (the null-pointer convention of
/// the allocator boundary); higher layers translate them into
/// out-of-memory errors.
pub trait Allocator: Send + Sync {
    /// Allocates `size` bytes at this allocator's default alignment.
    /// A zero `size` fails.
    fn allocate(&self, size: usize) -> Option<NonNull<u8>>;

    /// Allocates `size` bytes at the requested alignment. The default
    /// implementation ignores `alignment` and delegates to
    /// [`allocate`](Allocator::allocate).
    fn allocate_aligned(&self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        let _ = alignment;
        self.allocate(size)
    }

    /// Releases a pointer previously returned by this allocator. A null
    /// pointer is a no-op.
    ///
    /// # Safety
    /// `ptr` must be null or a live pointer obtained from this allocator.
    unsafe fn deallocate(&self, ptr: *mut u8);

    /// Re-sizes an allocation, preserving `min(old, new)` bytes when the
    /// old size is recoverable. The default implementation cannot recover
    /// the old size and returns `None` without touching `ptr`.
    ///
    /// # Safety
    /// `ptr` must be null or a live pointer obtained from this allocator.
    /// On success the old pointer is released and must not be used again.
    unsafe fn reallocate(&self, ptr: *mut u8, new_size: usize) -> Option<NonNull<u8>> {
        let _ = (ptr, new_size);
        None
    }

    /// Default alignment for allocations from this backend.
    fn alignment(&self) -> usize {
        sys::DEFAULT_ALIGNMENT
    }

    /// Returns `true` if this allocator claims `ptr`. The default is
    /// optimistic: any non-null pointer is claimed.
    fn owns(&self, ptr: *const u8) -> bool {
        !ptr.is_null()
    }

    /// Whether this backend maintains allocation tracking.
    fn tracking_enabled(&self) -> bool {
        false
    }

    /// Snapshot of tracking statistics (zeroed when tracking is off).
    fn stats(&self) -> AllocationStats {
        AllocationStats::default()
    }

    /// Clears the cumulative tracking statistics.
    fn reset_stats(&self) {}
}

/// Live-pointer map plus counters, shared by both tracked backends.
#[derive(Debug, Default)]
struct TrackingState {
    live_sizes: HashMap<usize, usize>,
    stats: AllocationStats,
}

impl TrackingState {
    fn record_allocation(&mut self, ptr: *mut u8, size: usize) {
        self.live_sizes.insert(ptr as usize, size);
        self.stats.record_allocation(size);
    }

    fn record_free(&mut self, ptr: *mut u8) {
        match self.live_sizes.remove(&(ptr as usize)) {
            Some(size) => self.stats.record_free(size),
            // Unknown pointer: count the free, don't guess bytes.
            None => self.stats.record_untracked_free(),
        }
    }

    fn live_size(&self, ptr: *const u8) -> Option<usize> {
        self.live_sizes.get(&(ptr as usize)).copied()
    }
}

// ==================== SystemAllocator ====================

/// Allocator backed by platform-aligned allocation.
///
/// # Examples
/// ```
/// use memory_manager::{Allocator, AllocatorConfig, SystemAllocator};
///
/// let alloc = SystemAllocator::new(AllocatorConfig::tracked());
/// let ptr = alloc.allocate(256).unwrap();
/// assert_eq!(alloc.stats().live_allocations, 1);
/// unsafe { alloc.deallocate(ptr.as_ptr()) };
/// assert_eq!(alloc.stats().live_bytes, 0);
/// ```
#[derive(Debug)]
pub struct SystemAllocator {
    alignment: usize,
    tracking: Option<Mutex<TrackingState>>,
}

impl SystemAllocator {
    /// Creates a system allocator from the given config. The alignment is
    /// normalised to a power of two at least the pointer size.
    pub fn new(config: AllocatorConfig) -> Self {
        Self {
            alignment: sys::normalize_alignment(config.alignment),
            tracking: config
                .track_allocations
                .then(|| Mutex::new(TrackingState::default())),
        }
    }
}

impl Default for SystemAllocator {
    fn default() -> Self {
        Self::new(AllocatorConfig::default())
    }
}

impl Allocator for SystemAllocator {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        self.allocate_aligned(size, self.alignment)
    }

    fn allocate_aligned(&self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }
        let alignment = sys::normalize_alignment(if alignment == 0 {
            self.alignment
        } else {
            alignment
        });
        let ptr = NonNull::new(sys::aligned_alloc(size, alignment))?;

        if let Some(tracking) = &self.tracking {
            let mut state = tracking.lock().expect("allocator tracking poisoned");
            state.record_allocation(ptr.as_ptr(), size);
        }
        Some(ptr)
    }

    unsafe fn deallocate(&self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        if let Some(tracking) = &self.tracking {
            let mut state = tracking.lock().expect("allocator tracking poisoned");
            state.record_free(ptr);
        }
        sys::aligned_free(ptr);
    }

    unsafe fn reallocate(&self, ptr: *mut u8, new_size: usize) -> Option<NonNull<u8>> {
        if new_size == 0 {
            self.deallocate(ptr);
            return None;
        }

        // Content can only be preserved when tracking recorded the old size.
        let old_size = match (&self.tracking, ptr.is_null()) {
            (Some(tracking), false) => tracking
                .lock()
                .expect("allocator tracking poisoned")
                .live_size(ptr),
            _ => None,
        };

        let new_ptr = self.allocate(new_size)?;
        if let Some(old_size) = old_size {
            let copy = old_size.min(new_size);
            std::ptr::copy_nonoverlapping(ptr, new_ptr.as_ptr(), copy);
        }
        self.deallocate(ptr);
        Some(new_ptr)
    }

    fn alignment(&self) -> usize {
        self.alignment
    }

    /// With tracking on, precise membership in the live map. With
    /// tracking off there is nothing to consult, so any non-null pointer
    /// is claimed.
    fn owns(&self, ptr: *const u8) -> bool {
        if ptr.is_null() {
            return false;
        }
        match &self.tracking {
            Some(tracking) => tracking
                .lock()
                .expect("allocator tracking poisoned")
                .live_size(ptr)
                .is_some(),
            None => true,
        }
    }

    fn tracking_enabled(&self) -> bool {
        self.tracking.is_some()
    }

    fn stats(&self) -> AllocationStats {
        match &self.tracking {
            Some(tracking) => tracking.lock().expect("allocator tracking poisoned").stats,
            None => AllocationStats::default(),
        }
    }

    fn reset_stats(&self) {
        if let Some(tracking) = &self.tracking {
            tracking
                .lock()
                .expect("allocator tracking poisoned")
                .stats = AllocationStats::default();
        }
    }
}

// ==================== ArenaAllocator ====================

/// Allocator backed by a bump [`Arena`].
///
/// Individual deallocations are no-ops (tracking still accounts them);
/// call [`reset`](ArenaAllocator::reset) to reclaim everything at once,
/// typically between inference runs.
#[derive(Debug)]
pub struct ArenaAllocator {
    arena: Mutex<Arena>,
    alignment: usize,
    tracking: Option<Mutex<TrackingState>>,
}

impl ArenaAllocator {
    /// Creates an arena-backed allocator with the given arena capacity
    /// and base alignment.
    pub fn new(arena_capacity: usize, arena_base_alignment: usize, config: AllocatorConfig) -> Self {
        Self {
            arena: Mutex::new(Arena::new(arena_capacity, arena_base_alignment)),
            alignment: sys::normalize_alignment(config.alignment),
            tracking: config
                .track_allocations
                .then(|| Mutex::new(TrackingState::default())),
        }
    }

    /// Creates an arena-backed allocator with default alignment and no
    /// tracking.
    pub fn with_capacity(arena_capacity: usize) -> Self {
        Self::new(
            arena_capacity,
            sys::DEFAULT_ALIGNMENT,
            AllocatorConfig::default(),
        )
    }

    /// Resets the arena, invalidating every outstanding allocation.
    /// Tracking's live set is cleared; cumulative counters are kept
    /// (use [`Allocator::reset_stats`] to zero those).
    pub fn reset(&self) {
        self.arena.lock().expect("arena poisoned").reset();
        if let Some(tracking) = &self.tracking {
            let mut state = tracking.lock().expect("allocator tracking poisoned");
            state.live_sizes.clear();
            state.stats.live_allocations = 0;
            state.stats.live_bytes = 0;
        }
    }

    /// Bytes consumed in the arena since the last reset.
    pub fn used(&self) -> usize {
        self.arena.lock().expect("arena poisoned").used()
    }

    /// Capacity of the backing arena.
    pub fn capacity(&self) -> usize {
        self.arena.lock().expect("arena poisoned").capacity()
    }

    /// Snapshot of the arena's per-cycle stats.
    pub fn arena_stats(&self) -> crate::ArenaStats {
        self.arena.lock().expect("arena poisoned").stats()
    }
}

impl Allocator for ArenaAllocator {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        self.allocate_aligned(size, self.alignment)
    }

    fn allocate_aligned(&self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }
        let alignment = sys::normalize_alignment(if alignment == 0 {
            self.alignment
        } else {
            alignment
        });
        let ptr = self
            .arena
            .lock()
            .expect("arena poisoned")
            .allocate(size, alignment)?;

        if let Some(tracking) = &self.tracking {
            let mut state = tracking.lock().expect("allocator tracking poisoned");
            state.record_allocation(ptr.as_ptr(), size);
        }
        Some(ptr)
    }

    /// Arena memory is reclaimed en-masse by [`ArenaAllocator::reset`];
    /// freeing an individual pointer only updates tracking.
    unsafe fn deallocate(&self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        if let Some(tracking) = &self.tracking {
            let mut state = tracking.lock().expect("allocator tracking poisoned");
            state.record_free(ptr);
        }
    }

    fn alignment(&self) -> usize {
        self.alignment
    }

    fn owns(&self, ptr: *const u8) -> bool {
        if ptr.is_null() {
            return false;
        }
        if let Some(tracking) = &self.tracking {
            return tracking
                .lock()
                .expect("allocator tracking poisoned")
                .live_size(ptr)
                .is_some();
        }
        self.arena.lock().expect("arena poisoned").owns(ptr)
    }

    fn tracking_enabled(&self) -> bool {
        self.tracking.is_some()
    }

    fn stats(&self) -> AllocationStats {
        match &self.tracking {
            Some(tracking) => tracking.lock().expect("allocator tracking poisoned").stats,
            None => AllocationStats::default(),
        }
    }

    fn reset_stats(&self) {
        if let Some(tracking) = &self.tracking {
            tracking
                .lock()
                .expect("allocator tracking poisoned")
                .stats = AllocationStats::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_allocate_deallocate() {
        let alloc = SystemAllocator::default();
        let ptr = alloc.allocate(128).unwrap();
        assert_eq!(ptr.as_ptr() as usize % alloc.alignment(), 0);
        unsafe { alloc.deallocate(ptr.as_ptr()) };
    }

    #[test]
    fn test_system_zero_size_fails() {
        let alloc = SystemAllocator::default();
        assert!(alloc.allocate(0).is_none());
    }

    #[test]
    fn test_system_aligned_allocation() {
        let alloc = SystemAllocator::default();
        let ptr = alloc.allocate_aligned(64, 256).unwrap();
        assert_eq!(ptr.as_ptr() as usize % 256, 0);
        unsafe { alloc.deallocate(ptr.as_ptr()) };
    }

    #[test]
    fn test_system_tracking_balanced() {
        let alloc = SystemAllocator::new(AllocatorConfig::tracked());
        let a = alloc.allocate(100).unwrap();
        let b = alloc.allocate(50).unwrap();
        assert_eq!(alloc.stats().live_allocations, 2);
        assert_eq!(alloc.stats().live_bytes, 150);

        unsafe {
            alloc.deallocate(a.as_ptr());
            alloc.deallocate(b.as_ptr());
        }
        let stats = alloc.stats();
        assert_eq!(stats.live_allocations, 0);
        assert_eq!(stats.live_bytes, 0);
        assert_eq!(stats.peak_live_bytes, 150);
    }

    #[test]
    fn test_system_owns() {
        let tracked = SystemAllocator::new(AllocatorConfig::tracked());
        let ptr = tracked.allocate(16).unwrap();
        assert!(tracked.owns(ptr.as_ptr()));

        let other = [0u8; 4];
        assert!(!tracked.owns(other.as_ptr()));
        assert!(!tracked.owns(std::ptr::null()));
        unsafe { tracked.deallocate(ptr.as_ptr()) };
        assert!(!tracked.owns(ptr.as_ptr()));

        // Untracked mode has nothing to consult: optimistic answer.
        let untracked = SystemAllocator::default();
        assert!(untracked.owns(other.as_ptr()));
    }

    #[test]
    fn test_system_reallocate_preserves_content() {
        let alloc = SystemAllocator::new(AllocatorConfig::tracked());
        let ptr = alloc.allocate(8).unwrap();
        unsafe {
            for i in 0..8 {
                ptr.as_ptr().add(i).write(i as u8);
            }
            let grown = alloc.reallocate(ptr.as_ptr(), 32).unwrap();
            for i in 0..8 {
                assert_eq!(grown.as_ptr().add(i).read(), i as u8);
            }
            alloc.deallocate(grown.as_ptr());
        }
        assert_eq!(alloc.stats().live_allocations, 0);
    }

    #[test]
    fn test_system_reallocate_untracked_loses_size() {
        let alloc = SystemAllocator::default();
        let ptr = alloc.allocate(8).unwrap();
        // Old size is unknown: a new block still comes back, content is
        // unspecified.
        let grown = unsafe { alloc.reallocate(ptr.as_ptr(), 16) }.unwrap();
        unsafe { alloc.deallocate(grown.as_ptr()) };
    }

    #[test]
    fn test_system_reset_stats() {
        let alloc = SystemAllocator::new(AllocatorConfig::tracked());
        let ptr = alloc.allocate(64).unwrap();
        unsafe { alloc.deallocate(ptr.as_ptr()) };
        alloc.reset_stats();
        assert_eq!(alloc.stats(), AllocationStats::default());
    }

    #[test]
    fn test_arena_allocator_basic() {
        let alloc = ArenaAllocator::with_capacity(1024);
        let a = alloc.allocate(100).unwrap();
        let b = alloc.allocate(100).unwrap();
        assert_ne!(a, b);
        assert!(alloc.used() >= 200);
        assert!(alloc.owns(a.as_ptr()));
    }

    #[test]
    fn test_arena_allocator_deallocate_is_noop() {
        let alloc = ArenaAllocator::with_capacity(256);
        let ptr = alloc.allocate(64).unwrap();
        let used = alloc.used();
        unsafe { alloc.deallocate(ptr.as_ptr()) };
        assert_eq!(alloc.used(), used);
    }

    #[test]
    fn test_arena_allocator_exhaustion_and_reset() {
        let alloc = ArenaAllocator::with_capacity(128);
        assert!(alloc.allocate(128).is_some());
        assert!(alloc.allocate(1).is_none());
        alloc.reset();
        assert_eq!(alloc.used(), 0);
        assert!(alloc.allocate(128).is_some());
    }

    #[test]
    fn test_arena_allocator_tracked_reset_keeps_cumulative() {
        let alloc = ArenaAllocator::new(1024, sys::DEFAULT_ALIGNMENT, AllocatorConfig::tracked());
        alloc.allocate(100).unwrap();
        alloc.allocate(200).unwrap();
        assert_eq!(alloc.stats().live_bytes, 300);

        alloc.reset();
        let stats = alloc.stats();
        assert_eq!(stats.live_allocations, 0);
        assert_eq!(stats.live_bytes, 0);
        // Cumulative counters survive the reset.
        assert_eq!(stats.allocations, 2);
        assert_eq!(stats.bytes_allocated, 300);

        alloc.reset_stats();
        assert_eq!(alloc.stats(), AllocationStats::default());
    }

    #[test]
    fn test_arena_allocator_tracked_owns_is_precise() {
        let alloc = ArenaAllocator::new(1024, sys::DEFAULT_ALIGNMENT, AllocatorConfig::tracked());
        let ptr = alloc.allocate(64).unwrap();
        assert!(alloc.owns(ptr.as_ptr()));
        unsafe { alloc.deallocate(ptr.as_ptr()) };
        // Tracked mode consults the live set, which no longer has it.
        assert!(!alloc.owns(ptr.as_ptr()));
    }

    #[test]
    fn test_trait_object_usage() {
        let backends: Vec<Box<dyn Allocator>> = vec![
            Box::new(SystemAllocator::default()),
            Box::new(ArenaAllocator::with_capacity(4096)),
        ];
        for backend in &backends {
            let ptr = backend.allocate(32).unwrap();
            unsafe { backend.deallocate(ptr.as_ptr()) };
        }
    }
}
