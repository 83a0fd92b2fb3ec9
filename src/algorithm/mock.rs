//! Scriptable algorithm for testing
//!
//! `MockAlgorithm` can simulate latency, always fail, or return fixed scores.
//! The built-in `failing_algorithm` is a mock that always fails.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::AxisValues;

use super::{Algorithm, AlgorithmDescriptor, AlgorithmOutput, AlgorithmParams};

pub const FAILING_ALGORITHM: &str = "failing_algorithm";

// ─────────────────────────────────────────────────────────────────
// Mock Configuration
// ─────────────────────────────────────────────────────────────────

/// Behavior of a mock algorithm
#[derive(Debug, Clone)]
pub struct MockAlgorithmConfig {
    /// Simulated execution latency
    pub latency_ms: u64,

    /// Fail every execution
    pub fail: bool,

    /// Fixed value (None = mean of present axis scores)
    pub fixed_value: Option<f64>,

    /// Fixed confidence (None = same as value)
    pub fixed_confidence: Option<f64>,
}

impl Default for MockAlgorithmConfig {
    fn default() -> Self {
        Self {
            latency_ms: 0,
            fail: false,
            fixed_value: None,
            fixed_confidence: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Mock Algorithm
// ─────────────────────────────────────────────────────────────────

/// Mock implementation of [`Algorithm`]
pub struct MockAlgorithm {
    descriptor: AlgorithmDescriptor,
    config: MockAlgorithmConfig,
    calls: AtomicU64,
}

impl MockAlgorithm {
    pub fn new(descriptor: AlgorithmDescriptor, config: MockAlgorithmConfig) -> Self {
        Self {
            descriptor,
            config,
            calls: AtomicU64::new(0),
        }
    }

    /// Mock requiring the given axes with default behavior
    pub fn with_axes(id: &str, required: &[&str]) -> Self {
        Self::new(
            AlgorithmDescriptor::new(id, id).requires(required),
            MockAlgorithmConfig::default(),
        )
    }

    /// Algorithm that fails on every call
    pub fn failing(id: &str) -> Self {
        Self::new(
            AlgorithmDescriptor::new(id, "Failing Algorithm").describe("Always fails"),
            MockAlgorithmConfig {
                fail: true,
                ..Default::default()
            },
        )
    }

    /// Builder: simulated latency
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.config.latency_ms = latency_ms;
        self
    }

    /// Builder: fixed value and confidence
    pub fn with_fixed(mut self, value: f64, confidence: f64) -> Self {
        self.config.fixed_value = Some(value);
        self.config.fixed_confidence = Some(confidence);
        self
    }

    /// Number of executions so far
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Algorithm for MockAlgorithm {
    fn descriptor(&self) -> &AlgorithmDescriptor {
        &self.descriptor
    }

    async fn execute(&self, axes: &AxisValues, _params: &AlgorithmParams) -> Result<AlgorithmOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        if self.config.fail {
            return Err(Error::algorithm_failed(&self.descriptor.id, "Simulated failure"));
        }

        let value = self.config.fixed_value.unwrap_or_else(|| {
            let scores: Vec<f64> = axes.values().filter_map(|a| a.score()).collect();
            if scores.is_empty() {
                0.0
            } else {
                scores.iter().sum::<f64>() / scores.len() as f64
            }
        });
        let confidence = self.config.fixed_confidence.unwrap_or(value);

        Ok(AlgorithmOutput::new(value, confidence))
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
