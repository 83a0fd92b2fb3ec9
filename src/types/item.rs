//! Knowledge item and axis value types
//!
//! A knowledge item is read from the item store with its classification and
//! the axis values algorithms score against.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Axis values keyed by axis identifier
pub type AxisValues = BTreeMap<String, AxisValue>;

// ─────────────────────────────────────────────────────────────────
// Axis Value
// ─────────────────────────────────────────────────────────────────

/// Observations for one scoring axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AxisValue {
    /// Observed values, expected in [0, 1]
    pub values: Vec<f64>,

    /// Optional per-value weights (same length as `values`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
}

impl AxisValue {
    /// Single observation with weight 1.0
    pub fn point(value: f64) -> Self {
        Self {
            values: vec![value],
            weights: Some(vec![1.0]),
        }
    }

    /// Build from explicit values and weights
    pub fn weighted(values: Vec<f64>, weights: Vec<f64>) -> Self {
        Self {
            values,
            weights: Some(weights),
        }
    }

    /// An axis with no observations counts as absent
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Weighted average of the values, clamped to [0, 1].
    ///
    /// Falls back to the plain mean when weights are missing, mismatched, or
    /// sum to zero. Returns `None` for an empty axis.
    pub fn score(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }

        let weighted = self.weights.as_ref().and_then(|weights| {
            if weights.len() != self.values.len() {
                return None;
            }
            let total: f64 = weights.iter().sum();
            if total <= 0.0 {
                return None;
            }
            let sum: f64 = self.values.iter().zip(weights).map(|(v, w)| v * w).sum();
            Some(sum / total)
        });

        let raw = weighted
            .unwrap_or_else(|| self.values.iter().sum::<f64>() / self.values.len() as f64);
        Some(raw.clamp(0.0, 1.0))
    }

    /// Whether every raw value lies in [0, 1] and weights (if present) line up
    pub fn is_well_formed(&self) -> bool {
        let in_range = self.values.iter().all(|v| (0.0..=1.0).contains(v));
        let weights_ok = self
            .weights
            .as_ref()
            .map(|w| w.len() == self.values.len() && w.iter().all(|x| *x >= 0.0))
            .unwrap_or(true);
        in_range && weights_ok
    }
}

// ─────────────────────────────────────────────────────────────────
// Knowledge Item
// ─────────────────────────────────────────────────────────────────

/// A knowledge item as supplied by the item store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    /// Stable item identifier (the task `item_ref`)
    pub id: String,

    /// Human-readable label
    #[serde(default)]
    pub label: String,

    /// Taxonomy classification (pillar level id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,

    /// Known axis values
    #[serde(default)]
    pub axis_values: AxisValues,
}

impl KnowledgeItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: String::new(),
            classification: None,
            axis_values: AxisValues::new(),
        }
    }

    /// Builder: set the label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Builder: set the classification
    pub fn with_classification(mut self, classification: impl Into<String>) -> Self {
        self.classification = Some(classification.into());
        self
    }

    /// Builder: add a single-value axis
    pub fn with_axis(mut self, axis: impl Into<String>, value: f64) -> Self {
        self.axis_values.insert(axis.into(), AxisValue::point(value));
        self
    }

    /// Whether the axis is present with at least one observation
    pub fn has_axis(&self, axis: &str) -> bool {
        self.axis_values.get(axis).map(|a| !a.is_empty()).unwrap_or(false)
    }

    /// Scores of every non-empty axis
    pub fn axis_scores(&self) -> impl Iterator<Item = (&str, f64)> {
        self.axis_values
            .iter()
            .filter_map(|(name, axis)| axis.score().map(|s| (name.as_str(), s)))
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
