// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The operator capability boundary.
//!
//! Concrete operators live outside this crate and are plugged in at
//! graph-construction time as `Box<dyn Operator>`. An operator reads its
//! input tensors through the [`OpContext`] handed to
//! [`execute`](Operator::execute), computes into storage it owns, and
//! binds a shallow view of that storage to its output values. The
//! operator is responsible for keeping the bound storage alive for the
//! rest of the run.

use std::collections::HashMap;

use crate::{AttributeMap, GraphError, Value, ValueId};
use tensor_core::Tensor;

/// Input/output wiring shared by operator implementations.
///
/// Embedding this struct gives an operator the list-accessor half of the
/// [`Operator`] contract for free.
#[derive(Debug, Clone, Default)]
pub struct OpIo {
    pub inputs: Vec<ValueId>,
    pub outputs: Vec<ValueId>,
}

/// Execution-time access to the graph's values.
///
/// The context resolves value ids to their metadata and runtime tensor
/// bindings, and lets an operator publish its outputs.
pub struct OpContext<'g> {
    values: &'g mut [Value],
    index: &'g HashMap<ValueId, usize>,
}

impl<'g> OpContext<'g> {
    pub(crate) fn new(values: &'g mut [Value], index: &'g HashMap<ValueId, usize>) -> Self {
        Self { values, index }
    }

    fn slot(&self, id: ValueId) -> Result<usize, GraphError> {
        self.index
            .get(&id)
            .copied()
            .ok_or(GraphError::UnknownValue { id })
    }

    /// The value's declared metadata.
    pub fn value(&self, id: ValueId) -> Result<&Value, GraphError> {
        Ok(&self.values[self.slot(id)?])
    }

    /// The tensor currently bound to a value.
    ///
    /// # Errors
    /// [`GraphError::UnboundValue`] when no tensor has been bound — an
    /// operator upstream did not publish, or the graph input was never
    /// provided.
    pub fn tensor(&self, id: ValueId) -> Result<&Tensor, GraphError> {
        self.values[self.slot(id)?]
            .tensor()
            .ok_or(GraphError::UnboundValue { id })
    }

    /// Binds a shallow view of `tensor` to a value. The caller keeps the
    /// underlying storage alive.
    pub fn bind(&mut self, id: ValueId, tensor: &Tensor) -> Result<(), GraphError> {
        let slot = self.slot(id)?;
        self.values[slot].bind_tensor(tensor);
        Ok(())
    }

    /// Clears a value's runtime binding.
    pub fn clear(&mut self, id: ValueId) -> Result<(), GraphError> {
        let slot = self.slot(id)?;
        self.values[slot].clear_tensor();
        Ok(())
    }
}

/// The capability set every operator implements.
pub trait Operator {
    /// Non-empty tag identifying the operation kind (e.g. `"MatMul"`).
    fn type_tag(&self) -> &str;

    /// Values this operator reads.
    fn inputs(&self) -> &[ValueId];

    /// Values this operator writes.
    fn outputs(&self) -> &[ValueId];

    /// Replaces the input wiring (kept in sync with the owning node by
    /// the graph executor).
    fn set_inputs(&mut self, inputs: Vec<ValueId>);

    /// Replaces the output wiring.
    fn set_outputs(&mut self, outputs: Vec<ValueId>);

    /// Compile-time parameters, if this operator carries any.
    fn attributes(&self) -> Option<&AttributeMap> {
        None
    }

    /// Checks the operator's configuration. The default rejects an
    /// operator that has been wired with no outputs; concrete operators
    /// layer arity and shape checks on top.
    fn validate(&self) -> Result<(), GraphError> {
        if self.outputs().is_empty() {
            return Err(GraphError::NoOutputsWired {
                op: self.type_tag().to_string(),
            });
        }
        Ok(())
    }

    /// Estimated scratch memory for execution in bytes.
    fn estimate_memory_bytes(&self) -> usize {
        0
    }

    /// Runs the operation: read input tensors via `ctx`, compute into
    /// operator-owned storage, bind output views.
    ///
    /// Pre-condition: every input value has a bound tensor whose shape
    /// and dtype match the value's declared metadata.
    fn execute(&mut self, ctx: &mut OpContext<'_>) -> Result<(), GraphError>;

    /// Clones this operator for graph transformation passes.
    fn clone_op(&self) -> Box<dyn Operator>;
}

#[cfg(test)]
pub(crate) mod test_ops {
    //! Minimal operators used by the graph tests.

    use super::*;

    /// Passes its single input through, scaled by a constant.
    #[derive(Debug, Clone)]
    pub struct Scale {
        pub io: OpIo,
        pub factor: f32,
        output: Vec<f32>,
    }

    impl Scale {
        pub fn new(factor: f32) -> Self {
            Self {
                io: OpIo::default(),
                factor,
                output: Vec::new(),
            }
        }
    }

    impl Operator for Scale {
        fn type_tag(&self) -> &str {
            "Scale"
        }

        fn inputs(&self) -> &[ValueId] {
            &self.io.inputs
        }

        fn outputs(&self) -> &[ValueId] {
            &self.io.outputs
        }

        fn set_inputs(&mut self, inputs: Vec<ValueId>) {
            self.io.inputs = inputs;
        }

        fn set_outputs(&mut self, outputs: Vec<ValueId>) {
            self.io.outputs = outputs;
        }

        fn execute(&mut self, ctx: &mut OpContext<'_>) -> Result<(), GraphError> {
            let input = ctx.tensor(self.io.inputs[0])?;
            let x = input.try_slice::<f32>()?;
            self.output.clear();
            self.output.extend(x.iter().map(|&v| v * self.factor));

            let out_id = self.io.outputs[0];
            let shape = ctx.value(out_id)?.shape().clone();
            let view = Tensor::wrap_slice(shape, &mut self.output)?;
            ctx.bind(out_id, &view)
        }

        fn clone_op(&self) -> Box<dyn Operator> {
            Box::new(self.clone())
        }
    }

    /// An operator whose execute fails, for error-path tests.
    #[derive(Debug, Clone, Default)]
    pub struct Failing {
        pub io: OpIo,
    }

    impl Operator for Failing {
        fn type_tag(&self) -> &str {
            "Failing"
        }

        fn inputs(&self) -> &[ValueId] {
            &self.io.inputs
        }

        fn outputs(&self) -> &[ValueId] {
            &self.io.outputs
        }

        fn set_inputs(&mut self, inputs: Vec<ValueId>) {
            self.io.inputs = inputs;
        }

        fn set_outputs(&mut self, outputs: Vec<ValueId>) {
            self.io.outputs = outputs;
        }

        fn execute(&mut self, _ctx: &mut OpContext<'_>) -> Result<(), GraphError> {
            Err(GraphError::OperatorValidation {
                op: "Failing".to_string(),
                reason: "always fails".to_string(),
            })
        }

        fn clone_op(&self) -> Box<dyn Operator> {
            Box::new(self.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_ops::Scale;
    use super::*;

    #[test]
    fn test_default_validate_requires_outputs() {
        let op = Scale::new(2.0);
        assert!(matches!(
            op.validate(),
            Err(GraphError::NoOutputsWired { .. })
        ));

        let mut op = Scale::new(2.0);
        op.set_outputs(vec![ValueId(1)]);
        assert!(op.validate().is_ok());
    }

    #[test]
    fn test_clone_op_preserves_wiring() {
        let mut op = Scale::new(3.0);
        op.set_inputs(vec![ValueId(1)]);
        op.set_outputs(vec![ValueId(2)]);
        let copy = op.clone_op();
        assert_eq!(copy.inputs(), op.inputs());
        assert_eq!(copy.outputs(), op.outputs());
        assert_eq!(copy.type_tag(), "Scale");
    }

    #[test]
    fn test_default_memory_estimate_is_zero() {
        let op = Scale::new(1.0);
        assert_eq!(op.estimate_memory_bytes(), 0);
    }
}
