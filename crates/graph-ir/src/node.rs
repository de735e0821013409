// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Graph nodes: operator instances wired to values.
//!
//! A [`Node`] owns its [`Operator`] and records which values it reads
//! and writes by id. The inverse producer/consumer links live on the
//! values themselves and are maintained by [`crate::Graph`] whenever a
//! node's wiring changes or the node is removed.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{Operator, ValueId};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique identifier of a [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    pub(crate) fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id number.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// An operator instance inside a graph.
pub struct Node {
    id: NodeId,
    name: String,
    op: Option<Box<dyn Operator>>,
    inputs: Vec<ValueId>,
    outputs: Vec<ValueId>,
    topo_index: Option<usize>,
    ready: bool,
    scheduled: bool,
    executed: bool,
    debug_info: String,
}

impl Node {
    /// Creates a node owning `op`. An empty name is replaced with
    /// `node_<id>`.
    pub(crate) fn new(name: String, op: Option<Box<dyn Operator>>) -> Self {
        let id = NodeId::next();
        let name = if name.is_empty() {
            format!("node_{}", id.raw())
        } else {
            name
        };
        Self {
            id,
            name,
            op,
            inputs: Vec::new(),
            outputs: Vec::new(),
            topo_index: None,
            ready: false,
            scheduled: false,
            executed: false,
            debug_info: String::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    // ==================== Operator ====================

    pub fn op(&self) -> Option<&dyn Operator> {
        self.op.as_deref()
    }

    pub fn op_mut(&mut self) -> Option<&mut (dyn Operator + 'static)> {
        self.op.as_deref_mut()
    }

    pub fn set_operator(&mut self, op: Box<dyn Operator>) {
        self.op = Some(op);
    }

    pub(crate) fn take_operator(&mut self) -> Option<Box<dyn Operator>> {
        self.op.take()
    }

    pub(crate) fn put_operator(&mut self, op: Box<dyn Operator>) {
        self.op = Some(op);
    }

    // ==================== Wiring ====================

    /// Values this node reads. Edge bookkeeping happens through
    /// [`crate::Graph::set_node_inputs`].
    pub fn inputs(&self) -> &[ValueId] {
        &self.inputs
    }

    /// Values this node writes.
    pub fn outputs(&self) -> &[ValueId] {
        &self.outputs
    }

    pub(crate) fn set_inputs_raw(&mut self, inputs: Vec<ValueId>) {
        self.inputs = inputs;
    }

    pub(crate) fn set_outputs_raw(&mut self, outputs: Vec<ValueId>) {
        self.outputs = outputs;
    }

    // ==================== Scheduling state ====================

    /// Position assigned by the last successful topological sort.
    pub fn topo_index(&self) -> Option<usize> {
        self.topo_index
    }

    pub(crate) fn set_topo_index(&mut self, index: Option<usize>) {
        self.topo_index = index;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    pub fn set_ready(&mut self, v: bool) {
        self.ready = v;
    }

    pub fn set_scheduled(&mut self, v: bool) {
        self.scheduled = v;
    }

    pub fn set_executed(&mut self, v: bool) {
        self.executed = v;
    }

    /// Clears the advisory execution flags.
    pub fn reset_execution_state(&mut self) {
        self.ready = false;
        self.scheduled = false;
        self.executed = false;
    }

    // ==================== Debug info ====================

    pub fn debug_info(&self) -> &str {
        &self.debug_info
    }

    pub fn set_debug_info(&mut self, info: impl Into<String>) {
        self.debug_info = info.into();
    }

    /// One-line summary for logs.
    pub fn debug_string(&self) -> String {
        let mut out = format!(
            "Node{{id={}, name=\"{}\", op={}, inputs={}, outputs={}",
            self.id,
            self.name,
            self.op.as_ref().map_or("null", |op| op.type_tag()),
            self.inputs.len(),
            self.outputs.len(),
        );
        if let Some(topo) = self.topo_index {
            out.push_str(&format!(", topo={topo}"));
        }
        out.push_str(&format!(
            ", ready={}, scheduled={}, executed={}",
            self.ready, self.scheduled, self.executed
        ));
        if !self.debug_info.is_empty() {
            out.push_str(&format!(", info=\"{}\"", self.debug_info));
        }
        out.push('}');
        out
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("op", &self.op.as_ref().map(|op| op.type_tag().to_string()))
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("topo_index", &self.topo_index)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::test_ops::Scale;

    #[test]
    fn test_empty_name_is_auto_generated() {
        let node = Node::new(String::new(), None);
        assert_eq!(node.name(), format!("node_{}", node.id().raw()));
    }

    #[test]
    fn test_explicit_name_is_kept() {
        let node = Node::new("relu0".to_string(), None);
        assert_eq!(node.name(), "relu0");
    }

    #[test]
    fn test_ids_are_monotonic() {
        let a = Node::new(String::new(), None);
        let b = Node::new(String::new(), None);
        assert!(b.id().raw() > a.id().raw());
    }

    #[test]
    fn test_owns_operator() {
        let mut node = Node::new("s".to_string(), Some(Box::new(Scale::new(2.0))));
        assert_eq!(node.op().unwrap().type_tag(), "Scale");

        node.set_operator(Box::new(Scale::new(3.0)));
        assert_eq!(node.op().unwrap().type_tag(), "Scale");
    }

    #[test]
    fn test_execution_flags() {
        let mut node = Node::new("n".to_string(), None);
        assert!(!node.is_ready() && !node.is_scheduled() && !node.is_executed());

        node.set_ready(true);
        node.set_scheduled(true);
        node.set_executed(true);
        assert!(node.is_ready() && node.is_scheduled() && node.is_executed());

        node.reset_execution_state();
        assert!(!node.is_ready() && !node.is_scheduled() && !node.is_executed());
    }

    #[test]
    fn test_debug_string() {
        let mut node = Node::new("gemm".to_string(), Some(Box::new(Scale::new(1.0))));
        node.set_debug_info("layer 3");
        let s = node.debug_string();
        assert!(s.contains("name=\"gemm\""));
        assert!(s.contains("op=Scale"));
        assert!(s.contains("info=\"layer 3\""));
    }
}
