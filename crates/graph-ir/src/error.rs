// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for graph construction, validation, and execution.

use crate::{NodeId, ValueId};
use tensor_core::{Shape, TensorError};

/// Errors that can occur while building or executing a graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A value id does not resolve to a value owned by this graph.
    #[error("value {id:?} is not owned by this graph")]
    UnknownValue { id: ValueId },

    /// A node id does not resolve to a node owned by this graph.
    #[error("node {id:?} is not owned by this graph")]
    UnknownNode { id: NodeId },

    /// An input value is missing the back-link to its consuming node.
    #[error("value {value:?} is missing consumer link to node {node:?}")]
    MissingConsumerLink { value: ValueId, node: NodeId },

    /// An output value's producer does not point back at the node that
    /// lists it as an output.
    #[error("value {value:?} has wrong producer (expected node {node:?})")]
    WrongProducer { value: ValueId, node: NodeId },

    /// Topological sort could not cover every node.
    #[error("cycle detected: sorted {sorted} of {total} nodes")]
    CycleDetected { sorted: usize, total: usize },

    /// An operator read a value with no bound runtime tensor.
    #[error("value {id:?} has no bound tensor")]
    UnboundValue { id: ValueId },

    /// An operator rejected its configuration.
    #[error("operator '{op}' failed validation: {reason}")]
    OperatorValidation { op: String, reason: String },

    /// An operator has been wired with no outputs.
    #[error("operator '{op}' has no outputs wired")]
    NoOutputsWired { op: String },

    /// A bound tensor does not match its value's declared metadata.
    #[error("operator '{op}' shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        op: String,
        expected: Shape,
        actual: Shape,
    },

    /// A required attribute key is absent.
    #[error("missing attribute '{key}'")]
    AttributeMissing { key: String },

    /// An attribute holds a different type than requested.
    #[error("attribute '{key}' is {actual}, expected {expected}")]
    AttributeTypeMismatch {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A tensor operation failed inside a graph operation.
    #[error(transparent)]
    Tensor(#[from] TensorError),
}
