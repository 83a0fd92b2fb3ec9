//! Algorithm trait definitions
//!
//! Defines the [`Algorithm`] trait implemented once per algorithm id, and the
//! [`AlgorithmProvider`] seam persona agents execute through.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::AxisValues;

// ─────────────────────────────────────────────────────────────────
// Descriptor, Params & Output
// ─────────────────────────────────────────────────────────────────

/// Static description of an algorithm
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlgorithmDescriptor {
    /// Registry key, e.g. "ai_knowledge_discovery"
    pub id: String,

    /// Display name
    pub name: String,

    /// Short description
    pub description: String,

    /// Axes the algorithm needs
    pub required_axes: Vec<String>,

    /// Axes the algorithm uses when present
    pub optional_axes: Vec<String>,
}

impl AlgorithmDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            required_axes: Vec::new(),
            optional_axes: Vec::new(),
        }
    }

    /// Builder: set the description
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder: set required axes
    pub fn requires(mut self, axes: &[&str]) -> Self {
        self.required_axes = axes.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Builder: set optional axes
    pub fn accepts(mut self, axes: &[&str]) -> Self {
        self.optional_axes = axes.iter().map(|a| a.to_string()).collect();
        self
    }
}

/// Execution parameters forwarded to an algorithm
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmParams {
    /// Per-axis weights (default 1.0)
    #[serde(default)]
    pub axis_weights: BTreeMap<String, f64>,
}

impl AlgorithmParams {
    pub fn with_weights(axis_weights: BTreeMap<String, f64>) -> Self {
        Self { axis_weights }
    }

    /// Weight for an axis, 1.0 when unset
    pub fn weight(&self, axis: &str) -> f64 {
        self.axis_weights.get(axis).copied().unwrap_or(1.0)
    }

    /// Weighted axis score clamped to [0, 1], `None` if the axis is absent
    pub fn contribution(&self, axes: &AxisValues, axis: &str) -> Option<f64> {
        axes.get(axis)
            .and_then(|a| a.score())
            .map(|score| (score * self.weight(axis)).clamp(0.0, 1.0))
    }
}

/// Result of one algorithm execution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlgorithmOutput {
    /// Score in [0, 1]
    pub value: f64,

    /// The algorithm's own certainty in [0, 1]
    pub confidence: f64,

    /// Algorithm-specific detail
    pub metadata: serde_json::Value,

    /// Non-fatal issues raised by the algorithm
    pub warnings: Vec<String>,
}

impl AlgorithmOutput {
    /// Create an output, clamping both scores to [0, 1]
    pub fn new(value: f64, confidence: f64) -> Self {
        Self {
            value: value.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            metadata: serde_json::Value::Null,
            warnings: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

// ─────────────────────────────────────────────────────────────────
// Algorithm Trait
// ─────────────────────────────────────────────────────────────────

/// One scoring algorithm
#[async_trait]
pub trait Algorithm: Send + Sync {
    /// Static description (id, axes)
    fn descriptor(&self) -> &AlgorithmDescriptor;

    /// Registry key
    fn id(&self) -> &str {
        &self.descriptor().id
    }

    /// Score the given axis values
    async fn execute(&self, axes: &AxisValues, params: &AlgorithmParams) -> Result<AlgorithmOutput>;
}

/// Shared algorithm handle
pub type SharedAlgorithm = Arc<dyn Algorithm>;

// ─────────────────────────────────────────────────────────────────
// Algorithm Provider
// ─────────────────────────────────────────────────────────────────

/// Execution seam consumed by persona agents
#[async_trait]
pub trait AlgorithmProvider: Send + Sync {
    /// Execute the algorithm registered under `algorithm_id`
    async fn execute(
        &self,
        algorithm_id: &str,
        axes: &AxisValues,
        params: &AlgorithmParams,
    ) -> Result<AlgorithmOutput>;

    /// Required axes (empty for unknown ids)
    fn required_axes(&self, algorithm_id: &str) -> BTreeSet<String>;

    /// Optional axes (empty for unknown ids)
    fn optional_axes(&self, algorithm_id: &str) -> BTreeSet<String>;

    /// Whether the id is directly executable
    fn contains(&self, algorithm_id: &str) -> bool;
}

/// Shared provider handle
pub type SharedProvider = Arc<dyn AlgorithmProvider>;

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AxisValue;

    #[test]
    fn test_output_clamped() {
        let out = AlgorithmOutput::new(1.7, -0.2);
        assert_eq!(out.value, 1.0);
        assert_eq!(out.confidence, 0.0);
    }

    #[test]
    fn test_params_contribution() {
        let mut axes = AxisValues::new();
        axes.insert("pillar_function".into(), AxisValue::point(0.9));

        let mut weights = BTreeMap::new();
        weights.insert("pillar_function".to_string(), 0.5);
        let params = AlgorithmParams::with_weights(weights);

        assert!((params.contribution(&axes, "pillar_function").unwrap() - 0.45).abs() < 1e-9);
        assert!(params.contribution(&axes, "level_hierarchy").is_none());
        assert_eq!(params.weight("level_hierarchy"), 1.0);
    }

    #[test]
    fn test_descriptor_builder() {
        let d = AlgorithmDescriptor::new("x", "X")
            .requires(&["a", "b"])
            .accepts(&["c"]);
        assert_eq!(d.required_axes, vec!["a", "b"]);
        assert_eq!(d.optional_axes, vec!["c"]);
    }
}
