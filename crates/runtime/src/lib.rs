// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # runtime
//!
//! The session layer that binds a [`graph_ir::Graph`] to an allocator
//! backend and drives execution.
//!
//! The runtime takes:
//! - A `Graph` built by a frontend (importer or test harness).
//! - A [`RuntimeConfig`] selecting the allocator backend (`system` or
//!   `arena`), its capacity, and debugging toggles (allocation tracking,
//!   canary guards).
//!
//! And provides:
//! - [`Session`] — validate, plan memory, run, and collect
//!   [`ExecutionMetrics`]; arena backends are reset between runs.
//! - Reference operators ([`ops::Relu`], [`ops::MatMul`],
//!   [`ops::Identity`]) demonstrating the operator-owned-storage
//!   publishing pattern.
//!
//! Execution is single-threaded and sequential in topological order;
//! callers serialise access to a session.

mod config;
mod error;
mod metrics;
pub mod ops;
mod session;

pub use config::{Capacity, RuntimeConfig};
pub use error::RuntimeError;
pub use metrics::{ExecutionMetrics, RunMetrics};
pub use session::{AllocatorBackend, Session};
