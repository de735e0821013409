// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Allocation statistics for profiling and diagnostics.
//!
//! [`AllocationStats`] tracks cumulative metrics for a tracked allocator
//! backend: allocation/free counts, live and peak byte usage. These are
//! the numbers to watch when tuning arena capacity.

/// Cumulative statistics about a tracked allocator backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct AllocationStats {
    /// Total number of successful allocations.
    pub allocations: usize,
    /// Total number of deallocations.
    pub frees: usize,
    /// Total bytes ever allocated.
    pub bytes_allocated: usize,
    /// Total bytes ever freed.
    pub bytes_freed: usize,
    /// Allocations currently live.
    pub live_allocations: usize,
    /// Bytes currently live.
    pub live_bytes: usize,
    /// High-water mark of `live_bytes`.
    pub peak_live_bytes: usize,
}

impl AllocationStats {
    pub(crate) fn record_allocation(&mut self, size: usize) {
        self.allocations += 1;
        self.bytes_allocated += size;
        self.live_allocations += 1;
        self.live_bytes += size;
        self.peak_live_bytes = self.peak_live_bytes.max(self.live_bytes);
    }

    pub(crate) fn record_free(&mut self, size: usize) {
        self.frees += 1;
        self.bytes_freed += size;
        self.live_allocations = self.live_allocations.saturating_sub(1);
        self.live_bytes = self.live_bytes.saturating_sub(size);
    }

    /// Records a free of a pointer whose size is unknown (not in the
    /// live map). Only the free counter moves.
    pub(crate) fn record_untracked_free(&mut self) {
        self.frees += 1;
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        let peak_kb = self.peak_live_bytes as f64 / 1024.0;
        format!(
            "{} allocations ({} bytes), {} frees ({} bytes), {} live ({} bytes), peak {:.1} KB",
            self.allocations,
            self.bytes_allocated,
            self.frees,
            self.bytes_freed,
            self.live_allocations,
            self.live_bytes,
            peak_kb,
        )
    }
}
