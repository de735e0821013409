// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for memory management.

/// Errors that can occur during buffer allocation and management.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// The backing allocator could not satisfy the request.
    #[error("allocation of {bytes} bytes failed")]
    AllocationFailed { bytes: usize },

    /// The requested alignment is not a power of two.
    #[error("invalid alignment {alignment}: must be a power of two")]
    InvalidAlignment { alignment: usize },

    /// Attempted to allocate a zero-sized buffer.
    #[error("cannot allocate zero-sized buffer")]
    ZeroSizedAllocation,
}
