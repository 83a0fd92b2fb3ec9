//! Ensemble aggregation
//!
//! Consensus is the confidence-weighted mean of the successful members'
//! values. Agreement is derived from the spread of their confidences.

use serde::{Deserialize, Serialize};

use crate::persona::ProcessResult;

/// Mean and spread of member confidences
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Agreement metrics over the successful members
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnsembleMetrics {
    /// `1 - std/mean` of member confidences, in [0, 1]
    pub agreement_score: f64,
    /// `1 - agreement_score`
    pub disagreement_level: f64,
    pub confidence_stats: ConfidenceStats,
}

/// Confidence-weighted mean of successful values; plain mean if all weights are zero
pub fn weighted_consensus(results: &[ProcessResult]) -> Option<f64> {
    let scored: Vec<(f64, f64)> = results
        .iter()
        .filter(|r| r.is_success())
        .filter_map(|r| r.value.map(|v| (v, r.confidence)))
        .collect();

    if scored.is_empty() {
        return None;
    }

    let total_weight: f64 = scored.iter().map(|(_, w)| w).sum();
    let consensus = if total_weight > f64::EPSILON {
        scored.iter().map(|(v, w)| v * w).sum::<f64>() / total_weight
    } else {
        scored.iter().map(|(v, _)| v).sum::<f64>() / scored.len() as f64
    };

    Some(consensus.clamp(0.0, 1.0))
}

pub fn confidence_stats(results: &[ProcessResult]) -> ConfidenceStats {
    let confidences: Vec<f64> = results
        .iter()
        .filter(|r| r.is_success())
        .map(|r| r.confidence)
        .collect();

    if confidences.is_empty() {
        return ConfidenceStats::default();
    }

    let n = confidences.len() as f64;
    let mean = confidences.iter().sum::<f64>() / n;
    let variance = confidences.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n;

    ConfidenceStats {
        mean,
        std: variance.sqrt(),
        min: confidences.iter().copied().fold(f64::INFINITY, f64::min),
        max: confidences.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

pub fn ensemble_metrics(results: &[ProcessResult]) -> EnsembleMetrics {
    let stats = confidence_stats(results);

    let agreement = if stats.std <= f64::EPSILON {
        1.0
    } else if stats.mean <= f64::EPSILON {
        0.0
    } else {
        (1.0 - stats.std / stats.mean).clamp(0.0, 1.0)
    };

    EnsembleMetrics {
        agreement_score: agreement,
        disagreement_level: 1.0 - agreement,
        confidence_stats: stats,
    }
}
