//! AI knowledge discovery
//!
//! Averages weighted axis contributions; flags significant axes.

use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::types::AxisValues;

use super::{Algorithm, AlgorithmDescriptor, AlgorithmOutput, AlgorithmParams};

pub const KNOWLEDGE_DISCOVERY: &str = "ai_knowledge_discovery";

const HIGH_SIGNIFICANCE: f64 = 0.8;
const MEDIUM_SIGNIFICANCE: f64 = 0.6;

/// Knowledge discovery over pillar/level axes
pub struct KnowledgeDiscovery {
    descriptor: AlgorithmDescriptor,
}

impl KnowledgeDiscovery {
    pub fn new() -> Self {
        Self {
            descriptor: AlgorithmDescriptor::new(KNOWLEDGE_DISCOVERY, "AI Knowledge Discovery")
                .describe("Discovers knowledge by evaluating pillar and hierarchy axes")
                .requires(&["pillar_function", "level_hierarchy"])
                .accepts(&["unified_system_function"]),
        }
    }
}

impl Default for KnowledgeDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Algorithm for KnowledgeDiscovery {
    fn descriptor(&self) -> &AlgorithmDescriptor {
        &self.descriptor
    }

    async fn execute(&self, axes: &AxisValues, params: &AlgorithmParams) -> Result<AlgorithmOutput> {
        let mut warnings = Vec::new();
        let mut discoveries = Vec::new();
        let mut contributions = BTreeMap::new();

        for axis in &self.descriptor.required_axes {
            match params.contribution(axes, axis) {
                Some(c) => {
                    if c > HIGH_SIGNIFICANCE {
                        discoveries.push(format!("HIGH_SIGNIFICANCE_{}", axis.to_uppercase()));
                    } else if c > MEDIUM_SIGNIFICANCE {
                        discoveries.push(format!("MEDIUM_SIGNIFICANCE_{}", axis.to_uppercase()));
                    }
                    contributions.insert(axis.clone(), c);
                }
                None => warnings.push(format!("Missing required axis: {}", axis)),
            }
        }

        for axis in &self.descriptor.optional_axes {
            if let Some(c) = params.contribution(axes, axis) {
                contributions.insert(axis.clone(), c);
            }
        }

        if contributions.is_empty() {
            return Err(Error::algorithm_failed(KNOWLEDGE_DISCOVERY, "No valid axes processed"));
        }

        let mean = contributions.values().sum::<f64>() / contributions.len() as f64;

        Ok(AlgorithmOutput::new(mean, mean)
            .with_metadata(json!({
                "discoveries": discoveries,
                "axis_contributions": contributions,
            }))
            .with_warnings(warnings))
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
