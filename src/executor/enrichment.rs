//! Additive enrichment of item axis data from research findings.
//!
//! Findings are considered in descending relevance and the first one to
//! suggest an axis wins. Axes the item already carries are never touched.

use serde::{Deserialize, Serialize};

use crate::services::Finding;
use crate::types::{AxisValues, KnowledgeItem};

/// Merged axis data returned to the caller; nothing is persisted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    /// Axes added from findings
    pub added_axes: Vec<String>,
    /// Suggested axes rejected because the item already has them
    pub skipped_axes: Vec<String>,
    /// Item axes plus the added ones
    pub axis_values: AxisValues,
}

impl EnrichmentResult {
    pub fn is_empty(&self) -> bool {
        self.added_axes.is_empty()
    }
}

/// Merge suggested axes from findings with `relevance >= min_relevance`
pub fn enrich(item: &KnowledgeItem, findings: &[Finding], min_relevance: f64) -> EnrichmentResult {
    let mut ranked: Vec<&Finding> = findings.iter().filter(|f| f.relevance >= min_relevance).collect();
    ranked.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));

    let mut result = EnrichmentResult {
        axis_values: item.axis_values.clone(),
        ..Default::default()
    };

    for finding in ranked {
        for (axis, value) in &finding.suggested_axes {
            if value.is_empty() {
                continue;
            }
            if item.has_axis(axis) {
                if !result.skipped_axes.contains(axis) {
                    result.skipped_axes.push(axis.clone());
                }
                continue;
            }
            if result.added_axes.contains(axis) {
                continue;
            }
            result.axis_values.insert(axis.clone(), value.clone());
            result.added_axes.push(axis.clone());
        }
    }

    result
}
