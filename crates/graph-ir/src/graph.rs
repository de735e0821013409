// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The dataflow graph: sole owner of values and nodes.
//!
//! Nodes and values cross-reference each other (a value knows its
//! producer and consumers; a node knows its input and output values).
//! The graph breaks that ownership cycle by owning both sides and
//! keeping every cross-reference a stable id. All edge bookkeeping —
//! attaching and detaching producer/consumer links — happens through the
//! graph's wiring methods, so no dangling reference can survive a node
//! removal.

use std::collections::{HashMap, VecDeque};

use crate::{
    AttributeMap, GraphError, MemoryPlan, Node, NodeId, OpContext, Operator, Value, ValueId,
    ValueLifetime,
};
use tensor_core::{DType, QuantParams, Shape, Tensor};

/// A user-supplied graph transformation.
///
/// Passes run to completion; re-validating the graph afterwards is the
/// pass's responsibility.
pub trait GraphPass {
    fn run(&mut self, graph: &mut Graph) -> Result<(), GraphError>;
}

/// A dataflow graph of operator nodes connected through values.
///
/// # Examples
/// ```
/// use graph_ir::Graph;
/// use tensor_core::{DType, Shape};
///
/// let mut graph = Graph::new();
/// let x = graph.create_value(Shape::matrix(2, 2), DType::F32, "x");
/// let y = graph.create_value(Shape::matrix(2, 2), DType::F32, "y");
/// graph.set_inputs(vec![x]).unwrap();
/// graph.set_outputs(vec![y]).unwrap();
/// assert_eq!(graph.value_count(), 2);
/// ```
#[derive(Default)]
pub struct Graph {
    model_name: String,
    model_version: String,
    attrs: AttributeMap,

    values: Vec<Value>,
    value_index: HashMap<ValueId, usize>,
    nodes: Vec<Node>,
    node_index: HashMap<NodeId, usize>,

    inputs: Vec<ValueId>,
    outputs: Vec<ValueId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Model metadata ====================

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn set_model_name(&mut self, name: impl Into<String>) {
        self.model_name = name.into();
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn set_model_version(&mut self, version: impl Into<String>) {
        self.model_version = version.into();
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attrs
    }

    pub fn attributes_mut(&mut self) -> &mut AttributeMap {
        &mut self.attrs
    }

    // ==================== Value management ====================

    /// Mints a new value owned by this graph.
    pub fn create_value(
        &mut self,
        shape: Shape,
        dtype: DType,
        name: impl Into<String>,
    ) -> ValueId {
        let value = Value::new(shape, dtype, name.into());
        let id = value.id();
        self.value_index.insert(id, self.values.len());
        self.values.push(value);
        id
    }

    /// Mints a new quantized value owned by this graph.
    pub fn create_quantized_value(
        &mut self,
        shape: Shape,
        dtype: DType,
        quant: QuantParams,
        name: impl Into<String>,
    ) -> ValueId {
        let value = Value::with_quant(shape, dtype, quant, name.into());
        let id = value.id();
        self.value_index.insert(id, self.values.len());
        self.values.push(value);
        id
    }

    pub fn value(&self, id: ValueId) -> Option<&Value> {
        self.value_index.get(&id).map(|&slot| &self.values[slot])
    }

    pub fn value_mut(&mut self, id: ValueId) -> Option<&mut Value> {
        match self.value_index.get(&id) {
            Some(&slot) => Some(&mut self.values[slot]),
            None => None,
        }
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Whether `id` resolves to a value owned by this graph.
    pub fn owns_value(&self, id: ValueId) -> bool {
        self.value_index.contains_key(&id)
    }

    fn check_values_owned(&self, ids: &[ValueId]) -> Result<(), GraphError> {
        for &id in ids {
            if !self.owns_value(id) {
                return Err(GraphError::UnknownValue { id });
            }
        }
        Ok(())
    }

    // ==================== Node management ====================

    /// Adds a node owning `op`. An empty name is replaced with
    /// `node_<id>`.
    pub fn add_node(&mut self, op: Box<dyn Operator>, name: impl Into<String>) -> NodeId {
        self.insert_node(Node::new(name.into(), Some(op)))
    }

    /// Adds a node with no operator yet (early-construction state).
    pub fn add_placeholder_node(&mut self, name: impl Into<String>) -> NodeId {
        self.insert_node(Node::new(name.into(), None))
    }

    fn insert_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.node_index.insert(id, self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.node_index.get(&id).map(|&slot| &self.nodes[slot])
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        match self.node_index.get(&id) {
            Some(&slot) => Some(&mut self.nodes[slot]),
            None => None,
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Removes a node after detaching every producer/consumer edge it
    /// participates in. Returns `false` for an unknown id.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        if !self.node_index.contains_key(&id) {
            return false;
        }
        // Detach edges; the ids were validated when wired, so this
        // cannot fail.
        let _ = self.set_node_inputs(id, vec![]);
        let _ = self.set_node_outputs(id, vec![]);

        let slot = self.node_index.remove(&id).expect("checked above");
        self.nodes.remove(slot);
        // Positions after `slot` shifted down by one.
        for node in &self.nodes[slot..] {
            if let Some(pos) = self.node_index.get_mut(&node.id()) {
                *pos -= 1;
            }
        }
        true
    }

    // ==================== Wiring ====================

    /// Rewires a node's inputs, atomically updating consumer sets: the
    /// node is removed from each old input's consumers and added to each
    /// new input's.
    pub fn set_node_inputs(
        &mut self,
        node: NodeId,
        inputs: Vec<ValueId>,
    ) -> Result<(), GraphError> {
        let slot = *self
            .node_index
            .get(&node)
            .ok_or(GraphError::UnknownNode { id: node })?;
        self.check_values_owned(&inputs)?;

        let old = self.nodes[slot].inputs().to_vec();
        for id in old {
            let value_slot = self.value_index[&id];
            self.values[value_slot].remove_consumer(node);
        }
        for &id in &inputs {
            let value_slot = self.value_index[&id];
            self.values[value_slot].add_consumer(node);
        }
        self.nodes[slot].set_inputs_raw(inputs);
        Ok(())
    }

    /// Rewires a node's outputs: old outputs produced by this node lose
    /// their producer; new outputs gain it (overwriting any previous
    /// producer — the caller maintains that node's inverse link).
    pub fn set_node_outputs(
        &mut self,
        node: NodeId,
        outputs: Vec<ValueId>,
    ) -> Result<(), GraphError> {
        let slot = *self
            .node_index
            .get(&node)
            .ok_or(GraphError::UnknownNode { id: node })?;
        self.check_values_owned(&outputs)?;

        let old = self.nodes[slot].outputs().to_vec();
        for id in old {
            let value_slot = self.value_index[&id];
            if self.values[value_slot].producer() == Some(node) {
                self.values[value_slot].set_producer(None);
            }
        }
        for &id in &outputs {
            let value_slot = self.value_index[&id];
            self.values[value_slot].set_producer(Some(node));
        }
        self.nodes[slot].set_outputs_raw(outputs);
        Ok(())
    }

    /// Appends one input to a node's wiring.
    pub fn add_node_input(&mut self, node: NodeId, input: ValueId) -> Result<(), GraphError> {
        let mut inputs = self
            .node(node)
            .ok_or(GraphError::UnknownNode { id: node })?
            .inputs()
            .to_vec();
        inputs.push(input);
        self.set_node_inputs(node, inputs)
    }

    /// Appends one output to a node's wiring.
    pub fn add_node_output(&mut self, node: NodeId, output: ValueId) -> Result<(), GraphError> {
        let mut outputs = self
            .node(node)
            .ok_or(GraphError::UnknownNode { id: node })?
            .outputs()
            .to_vec();
        outputs.push(output);
        self.set_node_outputs(node, outputs)
    }

    // ==================== Graph inputs/outputs ====================

    pub fn inputs(&self) -> &[ValueId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ValueId] {
        &self.outputs
    }

    pub fn set_inputs(&mut self, inputs: Vec<ValueId>) -> Result<(), GraphError> {
        self.check_values_owned(&inputs)?;
        self.inputs = inputs;
        Ok(())
    }

    pub fn set_outputs(&mut self, outputs: Vec<ValueId>) -> Result<(), GraphError> {
        self.check_values_owned(&outputs)?;
        self.outputs = outputs;
        Ok(())
    }

    pub fn add_input(&mut self, input: ValueId) -> Result<(), GraphError> {
        self.check_values_owned(&[input])?;
        self.inputs.push(input);
        Ok(())
    }

    pub fn add_output(&mut self, output: ValueId) -> Result<(), GraphError> {
        self.check_values_owned(&[output])?;
        self.outputs.push(output);
        Ok(())
    }

    // ==================== Topological sort ====================

    /// Kahn's algorithm over producer→consumer edges.
    ///
    /// On full coverage, nodes are annotated with their topological
    /// index. On a cycle, every annotation is cleared and the partial
    /// order is returned (strictly shorter than the node count).
    /// Tie-breaking follows node insertion order but is not a contract.
    pub fn topological_sort(&mut self) -> Vec<NodeId> {
        // In-degree counts input values with a live producer, one per
        // input occurrence.
        let mut indegree: HashMap<NodeId, usize> = HashMap::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let mut count = 0usize;
            for &input in node.inputs() {
                if let Some(value) = self.value(input) {
                    if value.producer().is_some() {
                        count += 1;
                    }
                }
            }
            indegree.insert(node.id(), count);
        }

        let mut queue: VecDeque<NodeId> = self
            .nodes
            .iter()
            .map(|n| n.id())
            .filter(|id| indegree[id] == 0)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = queue.pop_front() {
            order.push(id);

            let outputs = match self.node(id) {
                Some(node) => node.outputs().to_vec(),
                None => continue,
            };
            for output in outputs {
                let Some(value) = self.value(output) else {
                    continue;
                };
                for &consumer in value.consumers() {
                    if let Some(degree) = indegree.get_mut(&consumer) {
                        if *degree > 0 {
                            *degree -= 1;
                            if *degree == 0 {
                                queue.push_back(consumer);
                            }
                        }
                    }
                }
            }
        }

        if order.len() == self.nodes.len() {
            for (index, id) in order.iter().enumerate() {
                if let Some(node) = self.node_mut(*id) {
                    node.set_topo_index(Some(index));
                }
            }
        } else {
            for node in &mut self.nodes {
                node.set_topo_index(None);
            }
        }

        order
    }

    // ==================== Validation ====================

    /// Checks structural soundness:
    /// operators pass their own validation; every wired id resolves to a
    /// value owned by this graph; reverse edges are consistent (each
    /// output's producer is its node, each node sits in its inputs'
    /// consumer sets); graph inputs/outputs are owned; and the graph is
    /// acyclic.
    pub fn validate(&mut self) -> Result<(), GraphError> {
        for node in &self.nodes {
            // Operators can be absent during early construction.
            if let Some(op) = node.op() {
                op.validate()?;
            }

            for &input in node.inputs() {
                let value = self
                    .value(input)
                    .ok_or(GraphError::UnknownValue { id: input })?;
                if !value.has_consumer(node.id()) {
                    return Err(GraphError::MissingConsumerLink {
                        value: input,
                        node: node.id(),
                    });
                }
            }

            for &output in node.outputs() {
                let value = self
                    .value(output)
                    .ok_or(GraphError::UnknownValue { id: output })?;
                if value.producer() != Some(node.id()) {
                    return Err(GraphError::WrongProducer {
                        value: output,
                        node: node.id(),
                    });
                }
            }
        }

        self.check_values_owned(&self.inputs)?;
        self.check_values_owned(&self.outputs)?;

        let order = self.topological_sort();
        if order.len() != self.nodes.len() {
            return Err(GraphError::CycleDetected {
                sorted: order.len(),
                total: self.nodes.len(),
            });
        }
        Ok(())
    }

    // ==================== Memory planning ====================

    /// Computes value lifetimes over the topological order and the peak
    /// of simultaneously live bytes. Returns an empty plan when the
    /// graph has a cycle.
    pub fn plan_memory(&mut self) -> MemoryPlan {
        let mut plan = MemoryPlan::default();
        let order = self.topological_sort();
        if order.len() != self.nodes.len() {
            return plan;
        }

        let node_pos: HashMap<NodeId, usize> = order
            .iter()
            .enumerate()
            .map(|(index, &id)| (id, index))
            .collect();
        let n = order.len();

        for value in &self.values {
            let first = value
                .producer()
                .and_then(|p| node_pos.get(&p).copied())
                .unwrap_or(0);
            let mut last = first;
            for &consumer in value.consumers() {
                if let Some(&index) = node_pos.get(&consumer) {
                    last = last.max(index);
                }
            }
            if n > 0 && self.outputs.contains(&value.id()) {
                last = last.max(n - 1);
            }

            let elements = value.shape().num_elements();
            let per_element = value.dtype().size_bytes();
            let bytes = if elements > 0 && per_element > 0 {
                elements as usize * per_element
            } else {
                0
            };

            plan.lifetimes.insert(
                value.id(),
                ValueLifetime {
                    first_index: first,
                    last_index: last,
                    bytes,
                },
            );
        }

        let mut peak = 0usize;
        for index in 0..n {
            let live: usize = plan
                .lifetimes
                .values()
                .filter(|life| life.bytes > 0)
                .filter(|life| life.first_index <= index && index <= life.last_index)
                .map(|life| life.bytes)
                .sum();
            peak = peak.max(live);
        }
        plan.peak_bytes = peak;
        plan
    }

    // ==================== Passes ====================

    /// Runs a user-provided transformation pass over this graph.
    pub fn apply_pass(&mut self, pass: &mut dyn GraphPass) -> Result<(), GraphError> {
        pass.run(self)
    }

    // ==================== Execution ====================

    /// Executes the graph against `input`.
    ///
    /// With no nodes, the input is echoed back. With exactly one graph
    /// input, a shallow view of `input` is bound to it. The graph is
    /// re-validated, then operators run sequentially in topological
    /// order, each synchronised with its node's wiring. With exactly one
    /// bound graph output, a shallow handle to its tensor is returned
    /// (valid until operator-owned storage is next overwritten);
    /// otherwise the caller's input is echoed.
    ///
    /// All tensor bindings are transient: they are cleared before this
    /// method returns.
    pub fn execute(&mut self, input: &Tensor) -> Result<Tensor, GraphError> {
        if self.nodes.is_empty() {
            return Ok(input.clone());
        }

        if self.inputs.len() == 1 {
            let id = self.inputs[0];
            if let Some(value) = self.value_mut(id) {
                value.bind_tensor(input);
            }
        }

        if let Err(e) = self.validate() {
            self.clear_bindings();
            return Err(e);
        }

        let order = self.topological_sort();
        if order.len() != self.nodes.len() {
            self.clear_bindings();
            return Err(GraphError::CycleDetected {
                sorted: order.len(),
                total: self.nodes.len(),
            });
        }

        for id in order {
            let slot = self.node_index[&id];
            let wiring = {
                let node = &self.nodes[slot];
                (node.inputs().to_vec(), node.outputs().to_vec())
            };

            // Take the operator out of the node so the context can
            // borrow the value table mutably alongside it.
            let Some(mut op) = self.nodes[slot].take_operator() else {
                continue;
            };
            op.set_inputs(wiring.0);
            op.set_outputs(wiring.1);

            tracing::debug!(node = %id, op = op.type_tag(), "executing");
            let result = {
                let mut ctx = OpContext::new(&mut self.values, &self.value_index);
                op.execute(&mut ctx)
            };
            self.nodes[slot].put_operator(op);

            if let Err(e) = result {
                self.clear_bindings();
                return Err(e);
            }
        }

        let result = if self.outputs.len() == 1 {
            self.value(self.outputs[0])
                .and_then(|v| v.tensor())
                .cloned()
                .unwrap_or_else(|| input.clone())
        } else {
            input.clone()
        };

        self.clear_bindings();
        Ok(result)
    }

    fn clear_bindings(&mut self) {
        for value in &mut self.values {
            value.clear_tensor();
        }
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("model_name", &self.model_name)
            .field("model_version", &self.model_version)
            .field("values", &self.values.len())
            .field("nodes", &self.nodes.len())
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish()
    }
}
