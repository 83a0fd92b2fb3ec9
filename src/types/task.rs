//! Task type definitions
//!
//! Defines the background task kinds, their lifecycle status, and the
//! parameters accepted by `TaskManager::schedule`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Task identifier
pub type TaskId = Uuid;

/// Upper bound for `research_depth`
pub const MAX_RESEARCH_DEPTH: u32 = 5;

/// Upper bound for a per-task recursion depth override
pub const MAX_RECURSION_DEPTH: u32 = 16;

/// Default algorithm when parameters omit one
pub const DEFAULT_ALGORITHM: &str = "ai_knowledge_discovery";

// ─────────────────────────────────────────────────────────────────
// Task Type Enum
// ─────────────────────────────────────────────────────────────────

/// Kinds of background work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Same query across several agents, aggregated into a consensus
    Ensemble,
    /// Validation chain against a candidate result
    Validation,
    /// Research lookup with optional enrichment
    Research,
    /// Direct single-agent query
    Analysis,
}

impl TaskType {
    /// Get all task types
    pub fn all() -> &'static [TaskType] {
        &[
            TaskType::Ensemble,
            TaskType::Validation,
            TaskType::Research,
            TaskType::Analysis,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Ensemble => "ensemble",
            TaskType::Validation => "validation",
            TaskType::Research => "research",
            TaskType::Analysis => "analysis",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ensemble" => Ok(TaskType::Ensemble),
            "validation" => Ok(TaskType::Validation),
            "research" => Ok(TaskType::Research),
            "analysis" => Ok(TaskType::Analysis),
            _ => Err(Error::InvalidTaskType(s.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Task Status
// ─────────────────────────────────────────────────────────────────

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Scheduled, waiting for a worker slot
    #[default]
    Pending,
    /// Holding a worker slot
    Running,
    /// Finished with a usable result
    Completed,
    /// Finished with an error
    Failed,
}

impl TaskStatus {
    /// Completed and Failed never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ─────────────────────────────────────────────────────────────────
// Validation Modes
// ─────────────────────────────────────────────────────────────────

/// A single validation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    KnowledgeBase,
    Statistical,
    Pattern,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValidationKind::KnowledgeBase => "knowledge_base",
            ValidationKind::Statistical => "statistical",
            ValidationKind::Pattern => "pattern",
        };
        f.write_str(s)
    }
}

/// Requested validation mode; `Hybrid` runs all three kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    KnowledgeBase,
    Statistical,
    Pattern,
    #[default]
    Hybrid,
}

impl ValidationMode {
    /// Validation kinds this mode expands to
    pub fn kinds(&self) -> Vec<ValidationKind> {
        match self {
            ValidationMode::KnowledgeBase => vec![ValidationKind::KnowledgeBase],
            ValidationMode::Statistical => vec![ValidationKind::Statistical],
            ValidationMode::Pattern => vec![ValidationKind::Pattern],
            ValidationMode::Hybrid => vec![
                ValidationKind::KnowledgeBase,
                ValidationKind::Statistical,
                ValidationKind::Pattern,
            ],
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Task Parameters
// ─────────────────────────────────────────────────────────────────

/// Parameters accepted by `schedule`; fields unused by a task type are ignored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskParameters {
    /// Algorithm the agents run
    pub algorithm_id: String,

    /// Ensemble size (None = all eligible agents)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ensemble_size: Option<usize>,

    /// Validation mode for validation tasks
    pub validation_mode: ValidationMode,

    /// Research depth for research tasks
    pub research_depth: u32,

    /// Merge research findings into the item's axis data
    pub enrich: bool,

    /// Named agent for analysis/validation (None = first covering agent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,

    /// Per-task recursion depth override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,

    /// Per-axis weights forwarded to the algorithm
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub axis_weights: BTreeMap<String, f64>,
}

impl Default for TaskParameters {
    fn default() -> Self {
        Self {
            algorithm_id: DEFAULT_ALGORITHM.to_string(),
            ensemble_size: None,
            validation_mode: ValidationMode::Hybrid,
            research_depth: 1,
            enrich: true,
            agent: None,
            max_depth: None,
            axis_weights: BTreeMap::new(),
        }
    }
}

impl TaskParameters {
    /// Builder: set the algorithm id
    pub fn with_algorithm(mut self, algorithm_id: impl Into<String>) -> Self {
        self.algorithm_id = algorithm_id.into();
        self
    }

    /// Builder: set the ensemble size
    pub fn with_ensemble_size(mut self, size: usize) -> Self {
        self.ensemble_size = Some(size);
        self
    }

    /// Builder: set the validation mode
    pub fn with_validation_mode(mut self, mode: ValidationMode) -> Self {
        self.validation_mode = mode;
        self
    }

    /// Builder: set the research depth
    pub fn with_research_depth(mut self, depth: u32) -> Self {
        self.research_depth = depth;
        self
    }

    /// Builder: pin a named agent
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    /// Check parameters for the given task type
    pub fn validate(&self, task_type: TaskType) -> Result<()> {
        if self.algorithm_id.trim().is_empty() {
            return Err(Error::invalid_parameters("algorithm_id must not be empty"));
        }

        if task_type == TaskType::Ensemble && self.ensemble_size == Some(0) {
            return Err(Error::invalid_parameters("ensemble_size must be at least 1"));
        }

        if task_type == TaskType::Research
            && !(1..=MAX_RESEARCH_DEPTH).contains(&self.research_depth)
        {
            return Err(Error::invalid_parameters(format!(
                "research_depth must be between 1 and {}",
                MAX_RESEARCH_DEPTH
            )));
        }

        if let Some(depth) = self.max_depth {
            if depth > MAX_RECURSION_DEPTH {
                return Err(Error::invalid_parameters(format!(
                    "max_depth must be at most {}",
                    MAX_RECURSION_DEPTH
                )));
            }
        }

        if let Some((axis, _)) = self
            .axis_weights
            .iter()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(Error::invalid_parameters(format!(
                "axis weight for '{}' must be a non-negative number",
                axis
            )));
        }

        if matches!(&self.agent, Some(name) if name.trim().is_empty()) {
            return Err(Error::invalid_parameters("agent name must not be empty"));
        }

        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_from_str() {
        assert_eq!("Ensemble".parse::<TaskType>().unwrap(), TaskType::Ensemble);
        assert_eq!(" research ".parse::<TaskType>().unwrap(), TaskType::Research);

        let err = "enrichment".parse::<TaskType>().unwrap_err();
        assert!(matches!(err, Error::InvalidTaskType(ref s) if s == "enrichment"));
    }

    #[test]
    fn test_task_type_display_matches_serde() {
        for task_type in TaskType::all() {
            let json = serde_json::to_string(task_type).unwrap();
            assert_eq!(json, format!("\"{}\"", task_type));
        }
    }

    #[test]
    fn test_status_terminal() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn test_hybrid_expands_to_all_kinds() {
        assert_eq!(ValidationMode::Hybrid.kinds().len(), 3);
        assert_eq!(ValidationMode::Pattern.kinds(), vec![ValidationKind::Pattern]);
        assert_eq!(ValidationKind::KnowledgeBase.to_string(), "knowledge_base");
    }

    #[test]
    fn test_parameters_default_valid() {
        let params = TaskParameters::default();
        for task_type in TaskType::all() {
            assert!(params.validate(*task_type).is_ok());
        }
    }

    #[test]
    fn test_parameters_rejected() {
        let zero = TaskParameters::default().with_ensemble_size(0);
        assert!(zero.validate(TaskType::Ensemble).is_err());
        // Ensemble size is ignored by other task types
        assert!(zero.validate(TaskType::Analysis).is_ok());

        let deep = TaskParameters::default().with_research_depth(MAX_RESEARCH_DEPTH + 1);
        assert!(deep.validate(TaskType::Research).is_err());

        let empty = TaskParameters::default().with_algorithm("  ");
        assert!(matches!(
            empty.validate(TaskType::Analysis),
            Err(Error::InvalidParameters { .. })
        ));

        let mut weights = TaskParameters::default();
        weights.axis_weights.insert("pillar_function".into(), f64::NAN);
        assert!(weights.validate(TaskType::Analysis).is_err());
    }

    #[test]
    fn test_parameters_deserialize_partial() {
        let params: TaskParameters =
            serde_json::from_str(r#"{"ensemble_size": 3, "validation_mode": "pattern"}"#).unwrap();
        assert_eq!(params.algorithm_id, DEFAULT_ALGORITHM);
        assert_eq!(params.ensemble_size, Some(3));
        assert_eq!(params.validation_mode, ValidationMode::Pattern);
        assert!(params.enrich);
    }
}
