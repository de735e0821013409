// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the runtime session layer.

use graph_ir::GraphError;
use memory_manager::MemoryError;

/// Errors that can occur while configuring or driving a session.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Invalid or unparsable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A graph operation failed.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A buffer allocation failed.
    #[error(transparent)]
    Memory(#[from] MemoryError),
}
