//! Axis imputation.
//!
//! Missing required axes get one conservative estimate: the mean of the
//! item's present axis scores, capped at the configured prior. An item
//! with no axis data cannot be imputed.

use crate::types::{AxisValue, KnowledgeItem};

/// Default cap for imputed values
pub const DEFAULT_IMPUTATION_PRIOR: f64 = 0.5;

/// One-shot imputation policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Imputer {
    prior: f64,
}

impl Imputer {
    pub fn new(prior: f64) -> Self {
        Self {
            prior: prior.clamp(0.0, 1.0),
        }
    }

    pub fn prior(&self) -> f64 {
        self.prior
    }

    /// Estimate for a missing axis, `None` when nothing supports one
    pub fn estimate(&self, item: &KnowledgeItem) -> Option<f64> {
        let scores: Vec<f64> = item.axis_scores().map(|(_, s)| s).collect();
        if scores.is_empty() {
            return None;
        }
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        Some(mean.min(self.prior))
    }

    /// Estimate as an axis value
    pub fn impute(&self, item: &KnowledgeItem) -> Option<AxisValue> {
        self.estimate(item).map(AxisValue::point)
    }
}

impl Default for Imputer {
    fn default() -> Self {
        Self::new(DEFAULT_IMPUTATION_PRIOR)
    }
}
