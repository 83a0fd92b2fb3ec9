//! Risk assessment
//!
//! Higher axis scores mean higher risk. Confidence is the share of the
//! algorithm's axes that could be processed.

use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::types::AxisValues;

use super::{Algorithm, AlgorithmDescriptor, AlgorithmOutput, AlgorithmParams};

pub const RISK_ASSESSMENT: &str = "risk_assessment";

const HIGH_RISK: f64 = 0.7;
const MEDIUM_RISK: f64 = 0.4;

/// Risk assessment over system/risk/compliance axes
pub struct RiskAssessment {
    descriptor: AlgorithmDescriptor,
}

impl RiskAssessment {
    pub fn new() -> Self {
        Self {
            descriptor: AlgorithmDescriptor::new(RISK_ASSESSMENT, "Risk Assessment")
                .describe("Evaluates risks across system, risk and compliance dimensions")
                .requires(&["unified_system_function", "risk_tensor"])
                .accepts(&["compliance_vector"]),
        }
    }
}

impl Default for RiskAssessment {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Algorithm for RiskAssessment {
    fn descriptor(&self) -> &AlgorithmDescriptor {
        &self.descriptor
    }

    async fn execute(&self, axes: &AxisValues, params: &AlgorithmParams) -> Result<AlgorithmOutput> {
        let mut warnings = Vec::new();
        let mut factors = Vec::new();
        let mut risks = BTreeMap::new();

        let required = self.descriptor.required_axes.iter().map(|a| (a, true));
        let optional = self.descriptor.optional_axes.iter().map(|a| (a, false));

        for (axis, is_required) in required.chain(optional) {
            let Some(risk) = params.contribution(axes, axis) else {
                if is_required {
                    warnings.push(format!("Missing required axis: {}", axis));
                }
                continue;
            };

            if risk > HIGH_RISK {
                factors.push(format!("HIGH_RISK_{}", axis.to_uppercase()));
            } else if risk > MEDIUM_RISK {
                factors.push(format!("MEDIUM_RISK_{}", axis.to_uppercase()));
            }
            risks.insert(axis.clone(), risk);
        }

        if risks.is_empty() {
            return Err(Error::algorithm_failed(RISK_ASSESSMENT, "No valid axes processed"));
        }

        let total = self.descriptor.required_axes.len() + self.descriptor.optional_axes.len();
        let overall = risks.values().sum::<f64>() / risks.len() as f64;
        let confidence = risks.len() as f64 / total as f64;

        Ok(AlgorithmOutput::new(overall, confidence)
            .with_metadata(json!({
                "risk_factors": factors,
                "axis_risks": risks,
            }))
            .with_warnings(warnings))
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
