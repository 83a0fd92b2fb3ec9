//! Research source seam
//!
//! A research source returns candidate findings for an item. Findings may
//! suggest axis values used for additive enrichment.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{AxisValues, KnowledgeItem};

// ─────────────────────────────────────────────────────────────────
// Finding
// ─────────────────────────────────────────────────────────────────

/// One research finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Short description of what was found
    pub finding: String,

    /// Relevance to the item in [0, 1]
    pub relevance: f64,

    /// Research depth at which the finding surfaces
    #[serde(default = "default_depth")]
    pub depth: u32,

    /// Origin of the finding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Axis values the finding suggests for the item
    #[serde(default, skip_serializing_if = "AxisValues::is_empty")]
    pub suggested_axes: AxisValues,
}

fn default_depth() -> u32 {
    1
}

impl Finding {
    pub fn new(finding: impl Into<String>, relevance: f64) -> Self {
        Self {
            finding: finding.into(),
            relevance: relevance.clamp(0.0, 1.0),
            depth: 1,
            source: None,
            suggested_axes: AxisValues::new(),
        }
    }

    /// Builder: suggest a single-value axis
    pub fn suggesting(mut self, axis: impl Into<String>, value: f64) -> Self {
        self.suggested_axes
            .insert(axis.into(), crate::types::AxisValue::point(value));
        self
    }

    /// Builder: depth at which the finding surfaces
    pub fn at_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }
}

// ─────────────────────────────────────────────────────────────────
// Research Source Trait
// ─────────────────────────────────────────────────────────────────

/// Source of research findings
#[async_trait]
pub trait ResearchSource: Send + Sync {
    /// Findings for an item up to the given depth
    async fn find(&self, item: &KnowledgeItem, depth: u32) -> Result<Vec<Finding>>;
}

// ─────────────────────────────────────────────────────────────────
// Static Research Source
// ─────────────────────────────────────────────────────────────────

/// Research source serving preloaded findings per item id
#[derive(Default)]
pub struct StaticResearchSource {
    findings: HashMap<String, Vec<Finding>>,
    latency_ms: u64,
    fail: bool,
    calls: AtomicU64,
}

impl StaticResearchSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from findings keyed by item id
    pub fn from_map(findings: HashMap<String, Vec<Finding>>) -> Self {
        Self {
            findings,
            ..Default::default()
        }
    }

    /// Builder: add findings for an item
    pub fn with_findings(mut self, item_id: impl Into<String>, findings: Vec<Finding>) -> Self {
        self.findings.entry(item_id.into()).or_default().extend(findings);
        self
    }

    /// Builder: simulated latency
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Builder: fail every lookup
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResearchSource for StaticResearchSource {
    async fn find(&self, item: &KnowledgeItem, depth: u32) -> Result<Vec<Finding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.latency_ms)).await;
        }

        if self.fail {
            return Err(Error::ResearchFailed(format!("Source unavailable for {}", item.id)));
        }

        Ok(self
            .findings
            .get(&item.id)
            .map(|all| all.iter().filter(|f| f.depth <= depth).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_depth_filter() {
        let source = StaticResearchSource::new().with_findings(
            "n1",
            vec![
                Finding::new("shallow", 0.9),
                Finding::new("deep", 0.4).at_depth(3),
            ],
        );
        let item = KnowledgeItem::new("n1");

        assert_eq!(source.find(&item, 1).await.unwrap().len(), 1);
        assert_eq!(source.find(&item, 3).await.unwrap().len(), 2);
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failing_source() {
        let source = StaticResearchSource::new().failing();
        let err = source.find(&KnowledgeItem::new("n1"), 1).await.unwrap_err();
        assert!(matches!(err, Error::ResearchFailed(_)));
    }

    #[test]
    fn test_relevance_clamped() {
        assert_eq!(Finding::new("x", 1.4).relevance, 1.0);
    }
}
