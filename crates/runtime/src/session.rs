// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The session driver: a graph bound to an allocator backend.
//!
//! A [`Session`] owns a validated [`Graph`] and the allocator its
//! tensors draw from. [`Session::run`] executes the graph, records
//! timing metrics, and — when the backend is an arena — resets it
//! afterwards so the next run re-uses the same memory.

use std::sync::Arc;
use std::time::Instant;

use crate::{ExecutionMetrics, RuntimeConfig, RuntimeError};
use graph_ir::{Graph, MemoryPlan};
use memory_manager::{Allocator, AllocatorConfig, ArenaAllocator, Buffer, SystemAllocator};
use tensor_core::Tensor;

/// The allocator backend a session runs against.
pub enum AllocatorBackend {
    System(Arc<SystemAllocator>),
    Arena(Arc<ArenaAllocator>),
}

impl AllocatorBackend {
    /// Builds the backend selected by `config`.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        let allocator_config = AllocatorConfig {
            track_allocations: config.track_allocations,
            ..AllocatorConfig::default()
        };
        match config.allocator.to_lowercase().as_str() {
            "system" => Ok(Self::System(Arc::new(SystemAllocator::new(
                allocator_config,
            )))),
            "arena" => {
                let capacity = config.parse_arena_capacity()?;
                Ok(Self::Arena(Arc::new(ArenaAllocator::new(
                    capacity.as_bytes(),
                    memory_manager::sys::DEFAULT_ALIGNMENT,
                    allocator_config,
                ))))
            }
            other => Err(RuntimeError::Config(format!(
                "unknown allocator '{other}'; expected 'system' or 'arena'"
            ))),
        }
    }

    /// The backend as a shared trait object.
    pub fn as_dyn(&self) -> Arc<dyn Allocator> {
        match self {
            Self::System(a) => a.clone(),
            Self::Arena(a) => a.clone(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::System(_) => "system",
            Self::Arena(_) => "arena",
        }
    }
}

/// A graph bound to an allocator backend, ready to run.
///
/// # Example
/// ```no_run
/// use graph_ir::Graph;
/// use runtime::{RuntimeConfig, Session};
/// use tensor_core::Tensor;
///
/// # fn example(graph: Graph, input: Tensor) -> Result<(), runtime::RuntimeError> {
/// let mut session = Session::new(graph, RuntimeConfig::default())?;
/// let plan = session.plan();
/// println!("{}", plan.summary());
/// let output = session.run(&input)?;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    config: RuntimeConfig,
    graph: Graph,
    backend: AllocatorBackend,
    metrics: ExecutionMetrics,
}

impl Session {
    /// Creates a session over `graph` with the backend `config` selects.
    pub fn new(graph: Graph, config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let backend = AllocatorBackend::from_config(&config)?;
        tracing::info!(
            backend = backend.name(),
            nodes = graph.node_count(),
            values = graph.value_count(),
            "session created"
        );
        Ok(Self {
            config,
            graph,
            backend,
            metrics: ExecutionMetrics::new(),
        })
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The session's allocator, for building input tensors against.
    pub fn allocator(&self) -> Arc<dyn Allocator> {
        self.backend.as_dyn()
    }

    pub fn metrics(&self) -> &ExecutionMetrics {
        &self.metrics
    }

    /// Allocates a scratch buffer from the session's backend, honouring
    /// the configured canary setting.
    pub fn scratch_buffer(&self, size: usize) -> Result<Buffer, RuntimeError> {
        let buffer = Buffer::new(
            size,
            memory_manager::sys::DEFAULT_ALIGNMENT,
            Some(self.allocator()),
            self.config.use_canary,
        )?;
        Ok(buffer)
    }

    /// Computes the memory plan for the current graph and records its
    /// peak in the session metrics.
    pub fn plan(&mut self) -> MemoryPlan {
        let plan = self.graph.plan_memory();
        self.metrics.record_planned_peak(plan.peak_bytes);
        tracing::info!("{}", plan.summary());
        plan
    }

    /// Executes the graph against `input`.
    ///
    /// The graph itself re-validates inside `execute`; with
    /// `validate_each_run` enabled the session validates up front as
    /// well so configuration errors surface before any operator runs.
    /// Arena backends are reset after the run, which invalidates any
    /// tensor still pointing into arena storage.
    pub fn run(&mut self, input: &Tensor) -> Result<Tensor, RuntimeError> {
        let start = Instant::now();

        if self.config.validate_each_run {
            self.graph.validate()?;
        }

        let output = self.graph.execute(input)?;

        if let AllocatorBackend::Arena(arena) = &self.backend {
            let used = arena.used();
            arena.reset();
            tracing::debug!(used, "arena reset after run");
        }

        let duration = start.elapsed();
        self.metrics.record_run(duration, self.graph.node_count());
        tracing::info!(
            duration_us = duration.as_micros() as u64,
            nodes = self.graph.node_count(),
            "run complete"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::Relu;
    use tensor_core::{DType, Shape};

    fn relu_graph() -> Graph {
        let mut graph = Graph::new();
        let x = graph.create_value(Shape::matrix(2, 2), DType::F32, "x");
        let y = graph.create_value(Shape::matrix(2, 2), DType::F32, "y");
        let n = graph.add_node(Box::new(Relu::new()), "relu");
        graph.set_node_inputs(n, vec![x]).unwrap();
        graph.set_node_outputs(n, vec![y]).unwrap();
        graph.set_inputs(vec![x]).unwrap();
        graph.set_outputs(vec![y]).unwrap();
        graph
    }

    #[test]
    fn test_backend_from_config() {
        let system = AllocatorBackend::from_config(&RuntimeConfig::default()).unwrap();
        assert_eq!(system.name(), "system");

        let mut config = RuntimeConfig::default();
        config.allocator = "arena".to_string();
        config.arena_capacity = "64K".to_string();
        let arena = AllocatorBackend::from_config(&config).unwrap();
        assert_eq!(arena.name(), "arena");

        config.allocator = "bogus".to_string();
        assert!(matches!(
            AllocatorBackend::from_config(&config),
            Err(RuntimeError::Config(_))
        ));
    }

    #[test]
    fn test_session_run() {
        let mut session = Session::new(relu_graph(), RuntimeConfig::default()).unwrap();
        let mut data = vec![-1.0f32, 2.0, -3.0, 4.0];
        let input = Tensor::wrap_slice(Shape::matrix(2, 2), &mut data).unwrap();

        let output = session.run(&input).unwrap();
        assert_eq!(output.as_slice::<f32>(), &[0.0, 2.0, 0.0, 4.0]);
        assert_eq!(session.metrics().run_count(), 1);
    }

    #[test]
    fn test_plan_records_peak() {
        let mut session = Session::new(relu_graph(), RuntimeConfig::default()).unwrap();
        let plan = session.plan();
        assert_eq!(plan.lifetimes.len(), 2);
        assert_eq!(session.metrics().peak_planned_bytes, plan.peak_bytes);
        assert!(plan.peak_bytes >= 16);
    }

    #[test]
    fn test_arena_backend_resets_between_runs() {
        let mut config = RuntimeConfig::default();
        config.allocator = "arena".to_string();
        config.arena_capacity = "16K".to_string();
        let mut session = Session::new(relu_graph(), config).unwrap();

        // Draw from the arena, then run; the reset reclaims it.
        let allocator = session.allocator();
        assert!(allocator.allocate(1024).is_some());

        let mut data = vec![1.0f32, -2.0, 3.0, -4.0];
        let input = Tensor::wrap_slice(Shape::matrix(2, 2), &mut data).unwrap();
        session.run(&input).unwrap();

        if let AllocatorBackend::Arena(arena) = &session.backend {
            assert_eq!(arena.used(), 0);
        } else {
            panic!("expected arena backend");
        }
    }

    #[test]
    fn test_scratch_buffer_honours_canary() {
        let mut config = RuntimeConfig::default();
        config.use_canary = true;
        let session = Session::new(relu_graph(), config).unwrap();
        let buffer = session.scratch_buffer(256).unwrap();
        assert!(buffer.has_canary());
        assert!(buffer.validate_canary());
        assert_eq!(buffer.size(), 256);
    }
}
