//! Per-type task dispatch
//!
//! Each task type turns an item reference into a [`TaskResult`]. Agent-level
//! friction is already absorbed into the agents' results; a dispatch only
//! fails when the unit of work as a whole produced nothing usable.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::algorithm::{AlgorithmParams, SharedProvider};
use crate::error::Error;
use crate::persona::{ProcessResult, RecursionContext, SharedAgent};
use crate::services::{
    Finding, HeuristicValidator, ItemStore, ResearchSource, StaticResearchSource, ValidationService,
};
use crate::taxonomy::TaxonomyResolver;
use crate::types::{KnowledgeItem, TaskId, TaskParameters, TaskStatus, TaskType, ValidationKind};

use super::consensus::{ensemble_metrics, weighted_consensus, EnsembleMetrics};
use super::enrichment::{enrich, EnrichmentResult};
use super::state::Task;

// ─────────────────────────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────────────────────────

/// Type-dependent task payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskResult {
    Ensemble(EnsembleResult),
    Validation(ValidationReport),
    Research(ResearchReport),
    Analysis(ProcessResult),
}

impl TaskResult {
    pub fn task_type(&self) -> TaskType {
        match self {
            TaskResult::Ensemble(_) => TaskType::Ensemble,
            TaskResult::Validation(_) => TaskType::Validation,
            TaskResult::Research(_) => TaskType::Research,
            TaskResult::Analysis(_) => TaskType::Analysis,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub algorithm_id: String,
    /// One entry per agent run, in registration order
    pub individual_results: Vec<ProcessResult>,
    pub consensus: Option<f64>,
    pub succeeded: usize,
    pub failed: usize,
    pub metrics: EnsembleMetrics,
    /// Validation task scheduled because the members disagreed
    pub follow_up_task: Option<TaskId>,
}

/// One validation strategy's outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationEntry {
    #[serde(rename = "type")]
    pub kind: ValidationKind,
    pub score: f64,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Result the checks ran against
    pub candidate: Option<ProcessResult>,
    pub validations: Vec<ValidationEntry>,
    /// Mean score of the completed entries
    pub overall_score: Option<f64>,
}

impl ValidationReport {
    pub fn completed(&self) -> impl Iterator<Item = &ValidationEntry> {
        self.validations.iter().filter(|v| v.status == TaskStatus::Completed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchReport {
    pub depth: u32,
    /// Sorted by descending relevance
    pub findings: Vec<Finding>,
    pub enrichment: Option<EnrichmentResult>,
}

/// Dispatch failure with whatever partial result exists
#[derive(Debug)]
pub struct DispatchError {
    pub error: Error,
    pub partial: Option<TaskResult>,
}

impl DispatchError {
    fn with_partial(error: Error, partial: TaskResult) -> Self {
        Self {
            error,
            partial: Some(partial),
        }
    }
}

impl From<Error> for DispatchError {
    fn from(error: Error) -> Self {
        Self { error, partial: None }
    }
}

pub type DispatchResult = std::result::Result<TaskResult, DispatchError>;

// ─────────────────────────────────────────────────────────────────
// Dispatch Context
// ─────────────────────────────────────────────────────────────────

/// Read-only collaborators shared by every task run
#[derive(Clone)]
pub struct DispatchContext {
    /// Agents in registration order
    pub agents: Arc<[SharedAgent]>,
    pub algorithms: SharedProvider,
    pub taxonomy: Arc<dyn TaxonomyResolver>,
    pub store: Arc<dyn ItemStore>,
    pub validation: Arc<dyn ValidationService>,
    pub research: Arc<dyn ResearchSource>,
    /// Recursion ceiling unless a task overrides it
    pub max_recursion_depth: u32,
    /// Minimum finding relevance for enrichment
    pub enrichment_min_relevance: f64,
}

impl DispatchContext {
    /// Context with heuristic validation and an empty research source
    pub fn new(
        agents: Vec<SharedAgent>,
        algorithms: SharedProvider,
        taxonomy: Arc<dyn TaxonomyResolver>,
        store: Arc<dyn ItemStore>,
    ) -> Self {
        Self {
            agents: Arc::from(agents),
            algorithms,
            taxonomy,
            store,
            validation: Arc::new(HeuristicValidator::new()),
            research: Arc::new(StaticResearchSource::new()),
            max_recursion_depth: 3,
            enrichment_min_relevance: 0.5,
        }
    }

    pub fn with_validation(mut self, validation: Arc<dyn ValidationService>) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_research(mut self, research: Arc<dyn ResearchSource>) -> Self {
        self.research = research;
        self
    }

    pub fn with_max_recursion_depth(mut self, depth: u32) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    pub fn with_enrichment_min_relevance(mut self, relevance: f64) -> Self {
        self.enrichment_min_relevance = relevance.clamp(0.0, 1.0);
        self
    }

    pub fn agent(&self, name: &str) -> Option<SharedAgent> {
        self.agents.iter().find(|a| a.name() == name).cloned()
    }

    /// Top-level recursion context for a task
    fn recursion(&self, params: &TaskParameters) -> RecursionContext {
        let max_depth = params.max_depth.unwrap_or(self.max_recursion_depth);
        RecursionContext::root(max_depth, self.agents.clone())
            .with_params(AlgorithmParams::with_weights(params.axis_weights.clone()))
    }

    /// Named agent, else the first covering the item and offering the
    /// algorithm, else the first offering it, else the first registered
    fn select_agent(&self, params: &TaskParameters, item: &KnowledgeItem) -> Result<SharedAgent, Error> {
        if let Some(name) = &params.agent {
            return self
                .agent(name)
                .ok_or_else(|| Error::AgentNotFound { name: name.clone() });
        }

        let algorithm = params.algorithm_id.as_str();
        let covering = |a: &&SharedAgent| match self.taxonomy.classify(item) {
            Some(c) => a.covers(&c, self.taxonomy.as_ref()),
            None => true,
        };

        self.agents
            .iter()
            .find(|a| a.offers(algorithm) && covering(a))
            .or_else(|| self.agents.iter().find(|a| a.offers(algorithm)))
            .or_else(|| self.agents.first())
            .cloned()
            .ok_or_else(|| Error::AgentNotFound {
                name: "<none registered>".to_string(),
            })
    }

    /// Ensemble members: agents offering the algorithm first, registration order otherwise
    fn ensemble_members(&self, params: &TaskParameters) -> Vec<SharedAgent> {
        let algorithm = params.algorithm_id.as_str();
        let (offering, others): (Vec<_>, Vec<_>) = self.agents.iter().cloned().partition(|a| a.offers(algorithm));
        let members = offering.into_iter().chain(others);
        match params.ensemble_size {
            Some(n) => members.take(n).collect(),
            None => members.collect(),
        }
    }

    async fn load_item(&self, item_ref: &str) -> Result<KnowledgeItem, Error> {
        self.store.get(item_ref).await?.ok_or_else(|| Error::ItemNotFound {
            item_ref: item_ref.to_string(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────
// Dispatch
// ─────────────────────────────────────────────────────────────────

/// Run a task according to its type
pub async fn execute(ctx: &DispatchContext, task: &Task) -> DispatchResult {
    let item = ctx.load_item(&task.item_ref).await?;
    debug!(item = %item.id, task_type = %task.task_type, "Dispatching task");

    match task.task_type {
        TaskType::Ensemble => run_ensemble(ctx, &item, &task.parameters).await,
        TaskType::Validation => run_validation(ctx, &item, &task.parameters).await,
        TaskType::Research => run_research(ctx, &item, &task.parameters).await,
        TaskType::Analysis => run_analysis(ctx, &item, &task.parameters).await,
    }
}

async fn run_ensemble(ctx: &DispatchContext, item: &KnowledgeItem, params: &TaskParameters) -> DispatchResult {
    let members = ctx.ensemble_members(params);
    if members.is_empty() {
        return Err(Error::AggregationFailure("no agents available for the ensemble".to_string()).into());
    }

    let recursion = ctx.recursion(params);
    let algorithm = params.algorithm_id.as_str();
    let runs = members
        .iter()
        .map(|agent| agent.process_query(item, algorithm, ctx.taxonomy.as_ref(), recursion.clone()));
    let individual_results = join_all(runs).await;

    let succeeded = individual_results.iter().filter(|r| r.is_success()).count();
    let failed = individual_results.len() - succeeded;
    let result = EnsembleResult {
        algorithm_id: params.algorithm_id.clone(),
        consensus: weighted_consensus(&individual_results),
        metrics: ensemble_metrics(&individual_results),
        individual_results,
        succeeded,
        failed,
        follow_up_task: None,
    };

    info!(members = members.len(), succeeded, failed, consensus = ?result.consensus, "Ensemble finished");

    if succeeded == 0 {
        let error = Error::AggregationFailure(format!("all {} ensemble members failed", failed));
        return Err(DispatchError::with_partial(error, TaskResult::Ensemble(result)));
    }
    Ok(TaskResult::Ensemble(result))
}

async fn run_validation(ctx: &DispatchContext, item: &KnowledgeItem, params: &TaskParameters) -> DispatchResult {
    let agent = ctx.select_agent(params, item)?;
    let candidate = agent
        .process_query(item, &params.algorithm_id, ctx.taxonomy.as_ref(), ctx.recursion(params))
        .await;

    let kinds = params.validation_mode.kinds();
    let checks = kinds
        .iter()
        .map(|kind| ctx.validation.validate(*kind, item, &candidate));
    let outcomes = join_all(checks).await;

    let validations: Vec<ValidationEntry> = kinds
        .iter()
        .zip(outcomes)
        .map(|(kind, outcome)| match outcome {
            Ok(o) => ValidationEntry {
                kind: *kind,
                score: o.score,
                status: TaskStatus::Completed,
                details: o.details,
                error: None,
            },
            Err(e) => {
                warn!(kind = %kind, error = %e, "Validation strategy failed");
                ValidationEntry {
                    kind: *kind,
                    score: 0.0,
                    status: TaskStatus::Failed,
                    details: None,
                    error: Some(e.format_for_log()),
                }
            }
        })
        .collect();

    let mut report = ValidationReport {
        candidate: Some(candidate),
        validations,
        overall_score: None,
    };
    let scores: Vec<f64> = report.completed().map(|v| v.score).collect();
    if scores.is_empty() {
        let error = Error::ValidationFailed(format!("none of {} validation strategies completed", kinds.len()));
        return Err(DispatchError::with_partial(error, TaskResult::Validation(report)));
    }
    report.overall_score = Some(scores.iter().sum::<f64>() / scores.len() as f64);

    Ok(TaskResult::Validation(report))
}

async fn run_research(ctx: &DispatchContext, item: &KnowledgeItem, params: &TaskParameters) -> DispatchResult {
    let depth = params.research_depth;
    let mut findings = ctx.research.find(item, depth).await?;
    findings.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));

    let enrichment = params
        .enrich
        .then(|| enrich(item, &findings, ctx.enrichment_min_relevance));

    if let Some(e) = &enrichment {
        debug!(added = ?e.added_axes, skipped = ?e.skipped_axes, "Enrichment merged");
    }

    Ok(TaskResult::Research(ResearchReport {
        depth,
        findings,
        enrichment,
    }))
}

async fn run_analysis(ctx: &DispatchContext, item: &KnowledgeItem, params: &TaskParameters) -> DispatchResult {
    let agent = ctx.select_agent(params, item)?;
    let result = agent
        .process_query(item, &params.algorithm_id, ctx.taxonomy.as_ref(), ctx.recursion(params))
        .await;

    match result.error.clone() {
        Some(error) => Err(DispatchError::with_partial(
            Error::Reasoning(error),
            TaskResult::Analysis(result),
        )),
        None => Ok(TaskResult::Analysis(result)),
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
