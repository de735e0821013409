// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reference operators.
//!
//! These implement the operator contract the way an op author is
//! expected to: validate inputs strictly, compute into operator-owned
//! storage (a `Vec<f32>` re-sized on each call), and bind a shallow
//! tensor view of that storage to the output value. They double as the
//! kernels the integration tests execute graphs with; a real deployment
//! plugs in its own kernel library the same way.

use graph_ir::{GraphError, OpContext, OpIo, Operator, ValueId};
use tensor_core::{DType, Shape, Tensor};

/// Checks a bound input against its value's declared metadata and
/// returns it.
fn checked_input<'a>(
    ctx: &'a OpContext<'_>,
    op: &str,
    id: ValueId,
) -> Result<&'a Tensor, GraphError> {
    let value = ctx.value(id)?;
    let declared_shape = value.shape().clone();
    let declared_dtype = value.dtype();

    let tensor = ctx.tensor(id)?;
    if tensor.shape() != &declared_shape {
        return Err(GraphError::ShapeMismatch {
            op: op.to_string(),
            expected: declared_shape,
            actual: tensor.shape().clone(),
        });
    }
    if tensor.dtype() != declared_dtype {
        return Err(GraphError::OperatorValidation {
            op: op.to_string(),
            reason: format!(
                "bound tensor dtype {} does not match declared {}",
                tensor.dtype(),
                declared_dtype
            ),
        });
    }
    Ok(tensor)
}

fn check_arity(op: &str, io: &OpIo, inputs: usize, outputs: usize) -> Result<(), GraphError> {
    if io.inputs.len() != inputs || io.outputs.len() != outputs {
        return Err(GraphError::OperatorValidation {
            op: op.to_string(),
            reason: format!(
                "expected {inputs} inputs and {outputs} outputs, got {} and {}",
                io.inputs.len(),
                io.outputs.len()
            ),
        });
    }
    Ok(())
}

// ==================== Identity ====================

/// Binds its input tensor to its output unchanged (a shallow re-bind,
/// no copy).
#[derive(Debug, Clone, Default)]
pub struct Identity {
    io: OpIo,
}

impl Identity {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Operator for Identity {
    fn type_tag(&self) -> &str {
        "Identity"
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

    fn validate(&self) -> Result<(), GraphError> {
        check_arity(self.type_tag(), &self.io, 1, 1)
    }

    fn execute(&mut self, ctx: &mut OpContext<'_>) -> Result<(), GraphError> {
        let input = checked_input(ctx, self.type_tag(), self.io.inputs[0])?.clone();
        ctx.bind(self.io.outputs[0], &input)
    }

    fn clone_op(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}

// ==================== Relu ====================

/// Elementwise `max(0, x)` over contiguous F32 input.
#[derive(Debug, Clone, Default)]
pub struct Relu {
    io: OpIo,
    output: Vec<f32>,
}

impl Relu {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Operator for Relu {
    fn type_tag(&self) -> &str {
        "Relu"
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

    fn validate(&self) -> Result<(), GraphError> {
        check_arity(self.type_tag(), &self.io, 1, 1)
    }

    fn estimate_memory_bytes(&self) -> usize {
        self.output.capacity() * std::mem::size_of::<f32>()
    }

    fn execute(&mut self, ctx: &mut OpContext<'_>) -> Result<(), GraphError> {
        let input = checked_input(ctx, self.type_tag(), self.io.inputs[0])?;
        let x = input.try_slice::<f32>()?;

        self.output.clear();
        self.output.extend(x.iter().map(|&v| v.max(0.0)));

        let out_id = self.io.outputs[0];
        let shape = ctx.value(out_id)?.shape().clone();
        let view = Tensor::wrap_slice(shape, &mut self.output)?;
        ctx.bind(out_id, &view)
    }

    fn clone_op(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}

// ==================== MatMul ====================

/// 2-D F32 matrix multiplication: `[M, K] @ [K, N] → [M, N]`.
#[derive(Debug, Clone, Default)]
pub struct MatMul {
    io: OpIo,
    output: Vec<f32>,
}

impl MatMul {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Operator for MatMul {
    fn type_tag(&self) -> &str {
        "MatMul"
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

    fn validate(&self) -> Result<(), GraphError> {
        check_arity(self.type_tag(), &self.io, 2, 1)
    }

    fn estimate_memory_bytes(&self) -> usize {
        self.output.capacity() * std::mem::size_of::<f32>()
    }

    fn execute(&mut self, ctx: &mut OpContext<'_>) -> Result<(), GraphError> {
        let lhs = checked_input(ctx, self.type_tag(), self.io.inputs[0])?;
        let rhs = checked_input(ctx, self.type_tag(), self.io.inputs[1])?;

        if lhs.dtype() != DType::F32 || lhs.rank() != 2 || rhs.rank() != 2 {
            return Err(GraphError::OperatorValidation {
                op: self.type_tag().to_string(),
                reason: "requires two 2-D f32 tensors".to_string(),
            });
        }

        let (m, k) = (lhs.dims()[0], lhs.dims()[1]);
        let (k2, n) = (rhs.dims()[0], rhs.dims()[1]);
        if k != k2 {
            return Err(GraphError::ShapeMismatch {
                op: self.type_tag().to_string(),
                expected: Shape::matrix(k, n),
                actual: rhs.shape().clone(),
            });
        }

        let out_id = self.io.outputs[0];
        let declared = ctx.value(out_id)?.shape().clone();
        let expected = Shape::matrix(m, n);
        if declared != expected {
            return Err(GraphError::ShapeMismatch {
                op: self.type_tag().to_string(),
                expected,
                actual: declared,
            });
        }

        let a = lhs.try_slice::<f32>()?;
        let b = rhs.try_slice::<f32>()?;
        let (m, k, n) = (m as usize, k as usize, n as usize);

        self.output.clear();
        self.output.resize(m * n, 0.0);

        // ikj loop order keeps the inner loop a saxpy over a row of the
        // output, sequential in memory.
        for i in 0..m {
            for p in 0..k {
                let a_ip = a[i * k + p];
                let b_row = &b[p * n..(p + 1) * n];
                let c_row = &mut self.output[i * n..(i + 1) * n];
                for j in 0..n {
                    c_row[j] += a_ip * b_row[j];
                }
            }
        }

        let view = Tensor::wrap_slice(expected, &mut self.output)?;
        ctx.bind(out_id, &view)
    }

    fn clone_op(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_ir::Graph;

    fn run_unary(
        op: Box<dyn Operator>,
        input_data: &mut [f32],
        shape: Shape,
    ) -> Result<Vec<f32>, GraphError> {
        let mut graph = Graph::new();
        let x = graph.create_value(shape.clone(), DType::F32, "x");
        let y = graph.create_value(shape.clone(), DType::F32, "y");
        let n = graph.add_node(op, "op");
        graph.set_node_inputs(n, vec![x])?;
        graph.set_node_outputs(n, vec![y])?;
        graph.set_inputs(vec![x])?;
        graph.set_outputs(vec![y])?;

        let input = Tensor::wrap_slice(shape, input_data)?;
        let output = graph.execute(&input)?;
        Ok(output.as_slice::<f32>().to_vec())
    }

    #[test]
    fn test_relu() {
        let mut data = vec![-1.0f32, 0.0, 2.5, -0.1];
        let out = run_unary(Box::new(Relu::new()), &mut data, Shape::matrix(2, 2)).unwrap();
        assert_eq!(out, vec![0.0, 0.0, 2.5, 0.0]);
    }

    #[test]
    fn test_identity_rebinds_input() {
        let mut data = vec![1.0f32, 2.0, 3.0];
        let out = run_unary(Box::new(Identity::new()), &mut data, Shape::vector(3)).unwrap();
        assert_eq!(out, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_matmul() {
        // A = [[1,2,3],[4,5,6]], B = [[7,8],[9,10],[11,12]]
        // C = [[58,64],[139,154]]
        let mut graph = Graph::new();
        let a = graph.create_value(Shape::matrix(2, 3), DType::F32, "a");
        let b = graph.create_value(Shape::matrix(3, 2), DType::F32, "b");
        let c = graph.create_value(Shape::matrix(2, 2), DType::F32, "c");

        let n = graph.add_node(Box::new(MatMul::new()), "gemm");
        graph.set_node_inputs(n, vec![a, b]).unwrap();
        graph.set_node_outputs(n, vec![c]).unwrap();
        graph.set_outputs(vec![c]).unwrap();

        let mut a_data = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut b_data = vec![7.0f32, 8.0, 9.0, 10.0, 11.0, 12.0];
        let a_tensor = Tensor::wrap_slice(Shape::matrix(2, 3), &mut a_data).unwrap();
        let b_tensor = Tensor::wrap_slice(Shape::matrix(3, 2), &mut b_data).unwrap();

        // Bind both inputs by hand (two graph inputs), then execute.
        graph.value_mut(a).unwrap().bind_tensor(&a_tensor);
        graph.value_mut(b).unwrap().bind_tensor(&b_tensor);
        graph.set_inputs(vec![a, b]).unwrap();

        let dummy = Tensor::with_shape(Shape::scalar(), DType::F32);
        let out = graph.execute(&dummy).unwrap();
        // Two graph outputs would echo the input; one output returns c.
        assert_eq!(out.as_slice::<f32>(), &[58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_matmul_rejects_inner_mismatch() {
        let mut graph = Graph::new();
        let a = graph.create_value(Shape::matrix(2, 3), DType::F32, "a");
        let b = graph.create_value(Shape::matrix(4, 2), DType::F32, "b");
        let c = graph.create_value(Shape::matrix(2, 2), DType::F32, "c");
        let n = graph.add_node(Box::new(MatMul::new()), "gemm");
        graph.set_node_inputs(n, vec![a, b]).unwrap();
        graph.set_node_outputs(n, vec![c]).unwrap();
        graph.set_outputs(vec![c]).unwrap();

        let mut a_data = vec![0.0f32; 6];
        let mut b_data = vec![0.0f32; 8];
        let a_tensor = Tensor::wrap_slice(Shape::matrix(2, 3), &mut a_data).unwrap();
        let b_tensor = Tensor::wrap_slice(Shape::matrix(4, 2), &mut b_data).unwrap();
        graph.value_mut(a).unwrap().bind_tensor(&a_tensor);
        graph.value_mut(b).unwrap().bind_tensor(&b_tensor);

        let dummy = Tensor::with_shape(Shape::scalar(), DType::F32);
        assert!(matches!(
            graph.execute(&dummy),
            Err(GraphError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_unbound_input_is_an_error() {
        let mut graph = Graph::new();
        let x = graph.create_value(Shape::vector(2), DType::F32, "x");
        let y = graph.create_value(Shape::vector(2), DType::F32, "y");
        let n = graph.add_node(Box::new(Relu::new()), "relu");
        graph.set_node_inputs(n, vec![x]).unwrap();
        graph.set_node_outputs(n, vec![y]).unwrap();
        // No graph inputs declared: nothing gets bound.
        graph.set_outputs(vec![y]).unwrap();

        let dummy = Tensor::with_shape(Shape::scalar(), DType::F32);
        assert!(matches!(
            graph.execute(&dummy),
            Err(GraphError::UnboundValue { .. })
        ));
    }

    #[test]
    fn test_shape_mismatch_against_declared_metadata() {
        let mut graph = Graph::new();
        let x = graph.create_value(Shape::vector(4), DType::F32, "x");
        let y = graph.create_value(Shape::vector(4), DType::F32, "y");
        let n = graph.add_node(Box::new(Relu::new()), "relu");
        graph.set_node_inputs(n, vec![x]).unwrap();
        graph.set_node_outputs(n, vec![y]).unwrap();
        graph.set_inputs(vec![x]).unwrap();
        graph.set_outputs(vec![y]).unwrap();

        // Bound tensor is [2], declared is [4].
        let mut data = vec![0.0f32; 2];
        let input = Tensor::wrap_slice(Shape::vector(2), &mut data).unwrap();
        assert!(matches!(
            graph.execute(&input),
            Err(GraphError::ShapeMismatch { .. })
        ));
    }
}
