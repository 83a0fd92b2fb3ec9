//! Validation service seam
//!
//! A validation service scores a candidate result with one strategy at a
//! time. Two implementations ship with the crate:
//! - [`HeuristicValidator`] derives scores from the item and candidate
//! - [`StaticValidationService`] returns scripted scores (tests, demos)

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::persona::ProcessResult;
use crate::types::{KnowledgeItem, ValidationKind};

/// Score produced by one validation strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    #[serde(rename = "type")]
    pub kind: ValidationKind,

    /// Score in [0, 1]
    pub score: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ValidationOutcome {
    pub fn new(kind: ValidationKind, score: f64) -> Self {
        Self {
            kind,
            score: score.clamp(0.0, 1.0),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Validation strategies against a computed result
#[async_trait]
pub trait ValidationService: Send + Sync {
    async fn validate(
        &self,
        kind: ValidationKind,
        item: &KnowledgeItem,
        candidate: &ProcessResult,
    ) -> Result<ValidationOutcome>;
}

// ─────────────────────────────────────────────────────────────────
// Heuristic Validator
// ─────────────────────────────────────────────────────────────────

/// Scores derived from the candidate and the item's own axis data
#[derive(Debug, Clone, Default)]
pub struct HeuristicValidator;

impl HeuristicValidator {
    pub fn new() -> Self {
        Self
    }

    /// Consistency of axis scores: 1.0 when all agree, falling with spread
    fn statistical(item: &KnowledgeItem) -> (f64, String) {
        let scores: Vec<f64> = item.axis_scores().map(|(_, s)| s).collect();
        if scores.len() < 2 {
            return (0.5, format!("{} axis score(s), spread undefined", scores.len()));
        }
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
        let std = variance.sqrt();
        ((1.0 - 2.0 * std).clamp(0.0, 1.0), format!("axis spread {:.3}", std))
    }

    /// Share of axes whose raw values are in range with aligned weights
    fn pattern(item: &KnowledgeItem) -> (f64, String) {
        let total = item.axis_values.len();
        if total == 0 {
            return (0.0, "no axes to check".to_string());
        }
        let ok = item.axis_values.values().filter(|a| a.is_well_formed()).count();
        (ok as f64 / total as f64, format!("{}/{} axes well formed", ok, total))
    }
}

#[async_trait]
impl ValidationService for HeuristicValidator {
    async fn validate(
        &self,
        kind: ValidationKind,
        item: &KnowledgeItem,
        candidate: &ProcessResult,
    ) -> Result<ValidationOutcome> {
        let (score, details) = match kind {
            ValidationKind::KnowledgeBase => match &candidate.error {
                Some(err) => (0.0, format!("candidate failed: {}", err.message)),
                None => (candidate.confidence, "candidate confidence".to_string()),
            },
            ValidationKind::Statistical => Self::statistical(item),
            ValidationKind::Pattern => Self::pattern(item),
        };
        Ok(ValidationOutcome::new(kind, score).with_details(details))
    }
}

// ─────────────────────────────────────────────────────────────────
// Static Validation Service
// ─────────────────────────────────────────────────────────────────

/// Scripted validation scores
pub struct StaticValidationService {
    scores: HashMap<ValidationKind, f64>,
    failing: HashSet<ValidationKind>,
    default_score: f64,
    latency_ms: u64,
    calls: AtomicU64,
}

impl StaticValidationService {
    /// Every kind scores `default_score`
    pub fn new(default_score: f64) -> Self {
        Self {
            scores: HashMap::new(),
            failing: HashSet::new(),
            default_score,
            latency_ms: 0,
            calls: AtomicU64::new(0),
        }
    }

    /// Builder: fixed score for one kind
    pub fn with_score(mut self, kind: ValidationKind, score: f64) -> Self {
        self.scores.insert(kind, score);
        self
    }

    /// Builder: make one kind fail
    pub fn failing(mut self, kind: ValidationKind) -> Self {
        self.failing.insert(kind);
        self
    }

    /// Builder: simulated latency
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for StaticValidationService {
    fn default() -> Self {
        Self::new(0.8)
    }
}

#[async_trait]
impl ValidationService for StaticValidationService {
    async fn validate(
        &self,
        kind: ValidationKind,
        _item: &KnowledgeItem,
        _candidate: &ProcessResult,
    ) -> Result<ValidationOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.latency_ms)).await;
        }

        if self.failing.contains(&kind) {
            return Err(Error::ValidationFailed(format!("{} check unavailable", kind)));
        }

        let score = self.scores.get(&kind).copied().unwrap_or(self.default_score);
        Ok(ValidationOutcome::new(kind, score))
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
