// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Session profiling metrics.
//!
//! [`ExecutionMetrics`] aggregates per-run timing alongside the planned
//! peak memory footprint. These numbers are the first stop when sizing
//! an arena for a model.

use std::time::Duration;

/// Metrics for a single run of the graph.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunMetrics {
    /// Wall-clock duration of the run.
    pub duration: Duration,
    /// Number of nodes executed.
    pub nodes_executed: usize,
}

/// Aggregate metrics across a session's lifetime.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ExecutionMetrics {
    /// Total wall-clock time across runs.
    pub total_duration: Duration,
    /// Per-run records in execution order.
    pub runs: Vec<RunMetrics>,
    /// Peak bytes reported by the last memory plan.
    pub peak_planned_bytes: usize,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed run.
    pub fn record_run(&mut self, duration: Duration, nodes_executed: usize) {
        self.total_duration += duration;
        self.runs.push(RunMetrics {
            duration,
            nodes_executed,
        });
    }

    /// Records the planned peak from the latest memory plan.
    pub fn record_planned_peak(&mut self, peak_bytes: usize) {
        self.peak_planned_bytes = peak_bytes;
    }

    /// Number of completed runs.
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Mean run duration (zero before the first run).
    pub fn mean_run_duration(&self) -> Duration {
        if self.runs.is_empty() {
            return Duration::ZERO;
        }
        self.total_duration / self.runs.len() as u32
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        let peak_kb = self.peak_planned_bytes as f64 / 1024.0;
        format!(
            "{} runs, {:.2} ms total ({:.2} ms mean), planned peak {:.1} KB",
            self.runs.len(),
            self.total_duration.as_secs_f64() * 1000.0,
            self.mean_run_duration().as_secs_f64() * 1000.0,
            peak_kb,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_metrics() {
        let m = ExecutionMetrics::new();
        assert_eq!(m.run_count(), 0);
        assert_eq!(m.mean_run_duration(), Duration::ZERO);
    }

    #[test]
    fn test_record_runs() {
        let mut m = ExecutionMetrics::new();
        m.record_run(Duration::from_millis(4), 3);
        m.record_run(Duration::from_millis(6), 3);
        assert_eq!(m.run_count(), 2);
        assert_eq!(m.total_duration, Duration::from_millis(10));
        assert_eq!(m.mean_run_duration(), Duration::from_millis(5));
    }

    #[test]
    fn test_summary() {
        let mut m = ExecutionMetrics::new();
        m.record_run(Duration::from_millis(2), 1);
        m.record_planned_peak(2048);
        let s = m.summary();
        assert!(s.contains("1 runs"));
        assert!(s.contains("2.0 KB"));
    }
}
