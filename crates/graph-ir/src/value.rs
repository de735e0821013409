// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Graph values: symbolic tensor references with producer/consumer edges.
//!
//! A [`Value`] carries the metadata (shape, dtype, optional quantization)
//! of a tensor flowing through the graph. During construction no runtime
//! tensor exists; during execution a shallow [`Tensor`] view is bound to
//! the value and cleared again afterwards.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::NodeId;
use tensor_core::{DType, QuantParams, Shape, Tensor};

static NEXT_VALUE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique identifier of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub(crate) u64);

impl ValueId {
    pub(crate) fn next() -> Self {
        ValueId(NEXT_VALUE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id number.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A symbolic tensor handle owned by a [`crate::Graph`].
///
/// Invariants maintained by the graph: at most one producer; the
/// consumer set holds no duplicates; the tensor binding is only set
/// transiently across [`crate::Graph::execute`].
#[derive(Debug)]
pub struct Value {
    id: ValueId,
    shape: Shape,
    dtype: DType,
    name: String,
    quant: Option<QuantParams>,
    producer: Option<NodeId>,
    consumers: Vec<NodeId>,
    tensor: Option<Tensor>,
}

impl Value {
    pub(crate) fn new(shape: Shape, dtype: DType, name: String) -> Self {
        Self {
            id: ValueId::next(),
            shape,
            dtype,
            name,
            quant: None,
            producer: None,
            consumers: Vec::new(),
            tensor: None,
        }
    }

    pub(crate) fn with_quant(
        shape: Shape,
        dtype: DType,
        quant: QuantParams,
        name: String,
    ) -> Self {
        let mut value = Self::new(shape, dtype, name);
        value.quant = Some(quant);
        value
    }

    pub fn id(&self) -> ValueId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn set_shape(&mut self, shape: Shape) {
        self.shape = shape;
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn set_dtype(&mut self, dtype: DType) {
        self.dtype = dtype;
    }

    // ==================== Quantization metadata ====================

    pub fn has_quantization(&self) -> bool {
        self.quant.is_some()
    }

    pub fn quantization(&self) -> Option<&QuantParams> {
        self.quant.as_ref()
    }

    pub fn set_quantization(&mut self, params: QuantParams) {
        self.quant = Some(params);
    }

    pub fn clear_quantization(&mut self) {
        self.quant = None;
    }

    // ==================== Graph relationships ====================

    /// The node that writes this value, if any.
    pub fn producer(&self) -> Option<NodeId> {
        self.producer
    }

    /// Overwrites the producer link. The caller maintains the inverse
    /// link on the previous producer.
    pub(crate) fn set_producer(&mut self, producer: Option<NodeId>) {
        self.producer = producer;
    }

    /// Nodes that read this value, in insertion order.
    pub fn consumers(&self) -> &[NodeId] {
        &self.consumers
    }

    /// Idempotent insertion preserving insertion order.
    pub(crate) fn add_consumer(&mut self, consumer: NodeId) {
        if !self.has_consumer(consumer) {
            self.consumers.push(consumer);
        }
    }

    /// Removes every occurrence of `consumer`.
    pub(crate) fn remove_consumer(&mut self, consumer: NodeId) {
        self.consumers.retain(|&c| c != consumer);
    }

    pub fn has_consumer(&self, consumer: NodeId) -> bool {
        self.consumers.contains(&consumer)
    }

    // ==================== Runtime binding ====================

    /// The bound runtime tensor, if execution is in flight.
    pub fn tensor(&self) -> Option<&Tensor> {
        self.tensor.as_ref()
    }

    /// Binds a shallow, non-owning view of `tensor` to this value.
    pub fn bind_tensor(&mut self, tensor: &Tensor) {
        self.tensor = Some(tensor.clone());
    }

    /// Drops the runtime binding.
    pub fn clear_tensor(&mut self) {
        self.tensor = None;
    }

    /// One-line summary for logs.
    pub fn debug_string(&self) -> String {
        let mut out = format!("Value{{id={}", self.id);
        if !self.name.is_empty() {
            out.push_str(&format!(", name=\"{}\"", self.name));
        }
        out.push_str(&format!(
            ", dtype={}, shape={}, producer={}, consumers={}, tensor={}",
            self.dtype,
            self.shape,
            match self.producer {
                Some(p) => format!("{p}"),
                None => "none".to_string(),
            },
            self.consumers.len(),
            if self.tensor.is_some() { "bound" } else { "unbound" },
        ));
        if let Some(q) = &self.quant {
            out.push_str(&format!(
                ", quant={{scale={}, zp={}, per_channel={}}}",
                q.scale(),
                q.zero_point(),
                q.is_per_channel(),
            ));
        }
        out.push('}');
        out
    }
}
