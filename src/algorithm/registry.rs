//! Algorithm Registry
//!
//! Maps algorithm ids to [`Algorithm`] implementations. The registry is
//! assembled up front and then shared read-only behind [`AlgorithmProvider`].

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::AxisValues;

use super::{
    AlgorithmDescriptor, AlgorithmOutput, AlgorithmParams, AlgorithmProvider,
    KnowledgeDiscovery, MockAlgorithm, RiskAssessment, SharedAlgorithm, FAILING_ALGORITHM,
    KNOWLEDGE_DISCOVERY, RISK_ASSESSMENT,
};

// ─────────────────────────────────────────────────────────────────
// Algorithm Kind
// ─────────────────────────────────────────────────────────────────

/// Built-in algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmKind {
    /// Weighted pillar/hierarchy discovery
    KnowledgeDiscovery,
    /// System/risk/compliance assessment
    RiskAssessment,
    /// Always fails (exercises recovery paths)
    Failing,
}

impl AlgorithmKind {
    /// Get all built-in kinds
    pub fn all() -> &'static [AlgorithmKind] {
        &[
            AlgorithmKind::KnowledgeDiscovery,
            AlgorithmKind::RiskAssessment,
            AlgorithmKind::Failing,
        ]
    }

    /// Registry key
    pub fn id(&self) -> &'static str {
        match self {
            AlgorithmKind::KnowledgeDiscovery => KNOWLEDGE_DISCOVERY,
            AlgorithmKind::RiskAssessment => RISK_ASSESSMENT,
            AlgorithmKind::Failing => FAILING_ALGORITHM,
        }
    }

    /// Build the implementation
    pub fn create(&self) -> SharedAlgorithm {
        match self {
            AlgorithmKind::KnowledgeDiscovery => Arc::new(KnowledgeDiscovery::new()),
            AlgorithmKind::RiskAssessment => Arc::new(RiskAssessment::new()),
            AlgorithmKind::Failing => Arc::new(MockAlgorithm::failing(FAILING_ALGORITHM)),
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for AlgorithmKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        AlgorithmKind::all()
            .iter()
            .find(|kind| kind.id() == s)
            .copied()
            .ok_or_else(|| Error::AlgorithmNotFound {
                algorithm_id: s.to_string(),
            })
    }
}

// ─────────────────────────────────────────────────────────────────
// Algorithm Registry
// ─────────────────────────────────────────────────────────────────

/// Registry of executable algorithms
#[derive(Default)]
pub struct AlgorithmRegistry {
    algorithms: HashMap<String, SharedAlgorithm>,
}

impl AlgorithmRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in algorithm
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for kind in AlgorithmKind::all() {
            registry.register(kind.create());
        }
        registry
    }

    /// Register an algorithm, replacing any previous one with the same id
    pub fn register(&mut self, algorithm: SharedAlgorithm) {
        let id = algorithm.id().to_string();
        if self.algorithms.insert(id.clone(), algorithm).is_some() {
            tracing::warn!(algorithm = %id, "Algorithm replaced");
        } else {
            tracing::debug!(algorithm = %id, "Algorithm registered");
        }
    }

    /// Unregister an algorithm
    pub fn unregister(&mut self, algorithm_id: &str) -> Option<SharedAlgorithm> {
        self.algorithms.remove(algorithm_id)
    }

    /// Get an algorithm by id
    pub fn get(&self, algorithm_id: &str) -> Option<SharedAlgorithm> {
        self.algorithms.get(algorithm_id).cloned()
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.algorithms.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Descriptors of every registered algorithm, sorted by id
    pub fn descriptors(&self) -> Vec<AlgorithmDescriptor> {
        let mut descriptors: Vec<AlgorithmDescriptor> = self
            .algorithms
            .values()
            .map(|a| a.descriptor().clone())
            .collect();
        descriptors.sort_by(|a, b| a.id.cmp(&b.id));
        descriptors
    }

    pub fn len(&self) -> usize {
        self.algorithms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.algorithms.is_empty()
    }

    fn axes_of(&self, algorithm_id: &str, required: bool) -> BTreeSet<String> {
        self.algorithms
            .get(algorithm_id)
            .map(|a| {
                let d = a.descriptor();
                let axes = if required { &d.required_axes } else { &d.optional_axes };
                axes.iter().cloned().collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl AlgorithmProvider for AlgorithmRegistry {
    async fn execute(
        &self,
        algorithm_id: &str,
        axes: &AxisValues,
        params: &AlgorithmParams,
    ) -> Result<AlgorithmOutput> {
        let algorithm = self.get(algorithm_id).ok_or_else(|| Error::AlgorithmNotFound {
            algorithm_id: algorithm_id.to_string(),
        })?;

        let output = algorithm.execute(axes, params).await?;

        if !output.value.is_finite() || !output.confidence.is_finite() {
            return Err(Error::algorithm_failed(algorithm_id, "Produced a non-finite score"));
        }

        Ok(output)
    }

    fn required_axes(&self, algorithm_id: &str) -> BTreeSet<String> {
        self.axes_of(algorithm_id, true)
    }

    fn optional_axes(&self, algorithm_id: &str) -> BTreeSet<String> {
        self.axes_of(algorithm_id, false)
    }

    fn contains(&self, algorithm_id: &str) -> bool {
        self.algorithms.contains_key(algorithm_id)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
