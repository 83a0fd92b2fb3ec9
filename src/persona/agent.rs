//! Persona agent: the recursive reasoning unit.
//!
//! `process_query` walks a fixed recovery ladder:
//! 1. domain check, escalating to a peer on a gap
//! 2. axis completeness check with one-shot imputation
//! 3. primary algorithm, then at most one alternate
//!
//! Expected reasoning friction never surfaces as `Err`; it is recorded on the
//! returned [`ProcessResult`] as `error` and `warnings`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::Utc;
use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::algorithm::{AlgorithmOutput, SharedProvider};
use crate::error::{ReasoningError, ReasoningErrorKind, Result};
use crate::taxonomy::TaxonomyResolver;
use crate::types::{AxisValues, KnowledgeItem};

use super::context::{ProcessResult, RecursionContext, Subcall};
use super::imputation::Imputer;
use super::types::{AgentState, PersonaConfig, TraceEntry};
use super::SharedAgent;

// ─────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────

/// Primary plus one alternate
const MAX_ALGORITHM_ATTEMPTS: usize = 2;

/// Multiplier applied when any required axis was imputed
pub const IMPUTATION_PENALTY: f64 = 0.9;

/// Multiplier applied when the alternate algorithm produced the value
pub const ALTERNATE_PENALTY: f64 = 0.9;

/// Multiplier applied to a result adopted from a peer
pub const ESCALATION_PENALTY: f64 = 0.9;

/// Weight of an imputed axis in the coverage ratio
const IMPUTED_AXIS_WEIGHT: f64 = 0.5;

/// Values below this are flagged as insignificant
pub const SIGNIFICANCE_FLOOR: f64 = 0.1;

// ─────────────────────────────────────────────────────────────────
// Persona Agent
// ─────────────────────────────────────────────────────────────────

/// Long-lived reasoning agent.
///
/// Only `state` and `learning_trace` change between calls. Top-level calls
/// on one agent are serialized by the session lock; nested calls made during
/// escalation run inside the caller's session. A top-level call clears the
/// trace only while no nested call is appending to it.
pub struct PersonaAgent {
    id: Uuid,
    name: String,
    description: String,
    domain_coverage: BTreeSet<String>,
    algorithms_available: Vec<String>,
    confidence_thresholds: BTreeMap<String, f64>,
    algorithms: SharedProvider,
    imputer: Imputer,
    state: RwLock<AgentState>,
    learning_trace: RwLock<LearningTrace>,
    session: tokio::sync::Mutex<()>,
}

#[derive(Default)]
struct LearningTrace {
    entries: Vec<TraceEntry>,
    /// Nested calls currently appending
    nested: usize,
}

/// One in-flight `process_query` call.
///
/// Dropped before `finish`, e.g. on timeout or cancellation, it leaves the
/// agent in `Error` rather than `Processing`.
struct CallGuard<'a> {
    agent: &'a PersonaAgent,
    nested: bool,
    finished: bool,
}

impl CallGuard<'_> {
    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if self.nested {
            let mut trace = self.agent.learning_trace.write();
            trace.nested = trace.nested.saturating_sub(1);
        }
        if !self.finished {
            self.agent.set_state(AgentState::Error);
        }
    }
}

/// Axis data prepared for one algorithm attempt
struct PreparedAxes {
    axes: AxisValues,
    required: usize,
    present: usize,
    imputed: Vec<String>,
    /// Required axes neither present nor imputed
    missing: Vec<String>,
}

impl PreparedAxes {
    /// Share of the required axes backed by data, imputed ones at half weight
    fn coverage(&self) -> f64 {
        if self.required == 0 {
            return 1.0;
        }
        let covered = self.present as f64 + IMPUTED_AXIS_WEIGHT * self.imputed.len() as f64;
        (covered / self.required as f64).clamp(0.0, 1.0)
    }
}

impl PersonaAgent {
    /// Build an agent from a validated definition
    pub fn from_config(config: PersonaConfig, algorithms: SharedProvider) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            name: config.name,
            description: config.description,
            domain_coverage: config.domain_coverage.into_iter().collect(),
            algorithms_available: config.algorithms_available,
            confidence_thresholds: config.confidence_thresholds,
            algorithms,
            imputer: Imputer::default(),
            state: RwLock::new(AgentState::Idle),
            learning_trace: RwLock::new(LearningTrace::default()),
            session: tokio::sync::Mutex::new(()),
        })
    }

    /// Builder: imputation policy
    pub fn with_imputer(mut self, imputer: Imputer) -> Self {
        self.imputer = imputer;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn domain_coverage(&self) -> &BTreeSet<String> {
        &self.domain_coverage
    }

    pub fn algorithms_available(&self) -> &[String] {
        &self.algorithms_available
    }

    /// Primary algorithm
    pub fn primary_algorithm(&self) -> Option<&str> {
        self.algorithms_available.first().map(String::as_str)
    }

    pub fn offers(&self, algorithm_id: &str) -> bool {
        self.algorithms_available.iter().any(|a| a == algorithm_id)
    }

    pub fn confidence_threshold(&self, algorithm_id: &str) -> Option<f64> {
        self.confidence_thresholds.get(algorithm_id).copied()
    }

    pub fn state(&self) -> AgentState {
        *self.state.read()
    }

    /// Snapshot of the learning trace
    pub fn learning_trace(&self) -> Vec<TraceEntry> {
        self.learning_trace.read().entries.clone()
    }

    /// Whether the classification, or one of its ancestors, is covered
    pub fn covers(&self, classification: &str, taxonomy: &dyn TaxonomyResolver) -> bool {
        taxonomy
            .lineage(classification)
            .iter()
            .any(|c| self.domain_coverage.contains(c))
    }

    /// Evaluate `item` with `algorithm_id`, recovering from gaps and failures.
    pub fn process_query<'a>(
        &'a self,
        item: &'a KnowledgeItem,
        algorithm_id: &'a str,
        taxonomy: &'a dyn TaxonomyResolver,
        ctx: RecursionContext,
    ) -> BoxFuture<'a, ProcessResult> {
        Box::pin(async move {
            let _session = if ctx.depth == 0 {
                Some(self.session.lock().await)
            } else {
                None
            };
            let call = self.begin_call(ctx.depth > 0);

            let mut result = ProcessResult::empty(self.id, &self.name, &item.id, algorithm_id, ctx.depth);
            self.set_state(AgentState::Processing);
            self.record(
                &mut result,
                format!("Started processing item {} with algorithm {}", item.id, algorithm_id),
            );

            match self.domain_gap(item, taxonomy, &mut result) {
                Some(classification) => {
                    self.resolve_domain_gap(item, algorithm_id, taxonomy, &ctx, &classification, &mut result)
                        .await
                }
                None => self.compute(item, algorithm_id, &ctx, &mut result).await,
            }

            result.completed_at = Utc::now();
            if ctx.depth == 0 {
                info!(
                    agent = %self.name,
                    item = %item.id,
                    success = result.is_success(),
                    confidence = result.confidence,
                    subcalls = result.subcalls.len(),
                    "Query processed"
                );
            }
            call.finish();
            result
        })
    }

    /// Register a call; a top-level call starts a fresh trace when no nested call is live
    fn begin_call(&self, nested: bool) -> CallGuard<'_> {
        let mut trace = self.learning_trace.write();
        if nested {
            trace.nested += 1;
        } else if trace.nested == 0 {
            trace.entries.clear();
        }
        CallGuard {
            agent: self,
            nested,
            finished: false,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Domain check & escalation
    // ─────────────────────────────────────────────────────────────

    /// Uncovered classification, if any
    fn domain_gap(
        &self,
        item: &KnowledgeItem,
        taxonomy: &dyn TaxonomyResolver,
        result: &mut ProcessResult,
    ) -> Option<String> {
        let Some(classification) = taxonomy.classify(item) else {
            push_unique(&mut result.warnings, "Item has no classification; domain check skipped".to_string());
            return None;
        };

        if !taxonomy.is_known(&classification) {
            push_unique(&mut result.warnings, format!("Unknown classification: {}", classification));
        }

        if self.covers(&classification, taxonomy) {
            None
        } else {
            Some(classification)
        }
    }

    /// First eligible peer in registration order
    fn select_peer(
        &self,
        classification: &str,
        taxonomy: &dyn TaxonomyResolver,
        ctx: &RecursionContext,
    ) -> Option<SharedAgent> {
        ctx.peers
            .iter()
            .find(|peer| {
                peer.id != self.id && !ctx.has_visited(peer.id) && peer.covers(classification, taxonomy)
            })
            .cloned()
    }

    async fn resolve_domain_gap(
        &self,
        item: &KnowledgeItem,
        algorithm_id: &str,
        taxonomy: &dyn TaxonomyResolver,
        ctx: &RecursionContext,
        classification: &str,
        result: &mut ProcessResult,
    ) {
        self.record(result, format!("Domain expertise gap detected: {} not covered", classification));

        let Some(peer) = self.select_peer(classification, taxonomy, ctx) else {
            self.fail_partial(
                item,
                algorithm_id,
                result,
                ReasoningError::new(
                    ReasoningErrorKind::DomainGap,
                    format!("No eligible peer covers {} for agent {}", classification, self.name),
                ),
            );
            return;
        };

        if !ctx.can_escalate() {
            self.record(result, format!("Recursion limit reached at depth {}", ctx.depth));
            self.fail_partial(
                item,
                algorithm_id,
                result,
                ReasoningError::new(
                    ReasoningErrorKind::RecursionLimitExceeded,
                    format!(
                        "Escalation to {} for {} needed at depth {} (max {})",
                        peer.name, classification, ctx.depth, ctx.max_depth
                    ),
                ),
            );
            return;
        }

        self.record(
            result,
            format!("Escalating to peer agent {} for {}", peer.name, classification),
        );

        let child = ctx.descend(self.id);
        let peer_result = peer.process_query(item, algorithm_id, taxonomy, child.clone()).await;

        result.value = peer_result.value;
        result.confidence = (peer_result.confidence * ESCALATION_PENALTY).clamp(0.0, 1.0);
        result.error = peer_result.error.clone();
        result.algorithm_id = peer_result.algorithm_id.clone();
        result.imputed_axes = peer_result.imputed_axes.clone();
        result.metadata = peer_result.metadata.clone();
        for warning in &peer_result.warnings {
            push_unique(&mut result.warnings, warning.clone());
        }

        let adopted = format!(
            "Adopted result from peer agent {} (confidence {:.2})",
            peer.name, result.confidence
        );
        self.record(result, adopted);

        result.subcalls.push(Subcall {
            depth: child.depth,
            max_depth: child.max_depth,
            agent_id: peer.id,
            agent_name: peer.name.clone(),
            reason: format!("Domain expertise gap: {}", classification),
            result: peer_result,
        });

        self.set_state(if result.error.is_some() {
            AgentState::Error
        } else {
            AgentState::Learning
        });
    }

    /// Terminal failure whose confidence reflects only the axes actually present
    fn fail_partial(
        &self,
        item: &KnowledgeItem,
        algorithm_id: &str,
        result: &mut ProcessResult,
        error: ReasoningError,
    ) {
        let required = self.algorithms.required_axes(algorithm_id);
        let available = if required.is_empty() {
            if item.axis_values.is_empty() { 0.0 } else { 1.0 }
        } else {
            required.iter().filter(|a| item.has_axis(a)).count() as f64 / required.len() as f64
        };

        result.value = None;
        result.confidence = 0.5 * available;
        debug!(agent = %self.name, error = %error, "Query failed");
        result.error = Some(error);
        self.set_state(AgentState::Error);
    }

    // ─────────────────────────────────────────────────────────────
    // Axis preparation & execution
    // ─────────────────────────────────────────────────────────────

    fn prepare_axes(&self, item: &KnowledgeItem, algorithm_id: &str, result: &mut ProcessResult) -> PreparedAxes {
        let required = self.algorithms.required_axes(algorithm_id);
        let mut axes = item.axis_values.clone();
        let mut present = 0;
        let mut imputed = Vec::new();
        let mut missing = Vec::new();
        let estimate = self.imputer.impute(item);

        for axis in &required {
            if item.has_axis(axis) {
                present += 1;
                continue;
            }

            self.record(result, format!("Gap detected - missing required axis: {}", axis));
            self.record(result, format!("Attempted axis imputation: {}", axis));

            match &estimate {
                Some(value) => {
                    push_unique(
                        &mut result.warnings,
                        format!("Imputed required axis: {} = {:.2}", axis, value.score().unwrap_or(0.0)),
                    );
                    axes.insert(axis.clone(), value.clone());
                    imputed.push(axis.clone());
                }
                None => {
                    push_unique(&mut result.warnings, format!("Missing required axis: {}", axis));
                    missing.push(axis.clone());
                }
            }
        }

        for axis in self.algorithms.optional_axes(algorithm_id) {
            if !item.has_axis(&axis) {
                push_unique(&mut result.warnings, format!("Missing optional axis: {}", axis));
            }
        }

        PreparedAxes {
            axes,
            required: required.len(),
            present,
            imputed,
            missing,
        }
    }

    /// Requested algorithm first, then the agent's other algorithms in preference order
    fn candidates(&self, algorithm_id: &str) -> Vec<String> {
        std::iter::once(algorithm_id.to_string())
            .chain(self.algorithms_available.iter().filter(|a| *a != algorithm_id).cloned())
            .take(MAX_ALGORITHM_ATTEMPTS)
            .collect()
    }

    async fn compute(
        &self,
        item: &KnowledgeItem,
        algorithm_id: &str,
        ctx: &RecursionContext,
        result: &mut ProcessResult,
    ) {
        let candidates = self.candidates(algorithm_id);
        let mut failures = Vec::new();
        let mut unresolved = BTreeSet::new();
        let mut ran_complete = false;

        for (attempt, candidate) in candidates.iter().enumerate() {
            if attempt > 0 {
                self.record(result, format!("Attempting alternate algorithm {}", candidate));
            }

            let prepared = self.prepare_axes(item, candidate, result);
            if prepared.missing.is_empty() {
                ran_complete = true;
            } else {
                unresolved.extend(prepared.missing.iter().cloned());
            }
            match self.algorithms.execute(candidate, &prepared.axes, &ctx.params).await {
                Ok(output) => {
                    self.accept(candidate, attempt > 0, prepared, output, result);
                    return;
                }
                Err(e) => {
                    self.record(result, format!("Algorithm execution failed: {} ({})", candidate, e));
                    failures.push(e.to_string());
                }
            }
        }

        // Every attempt lacked a required axis imputation could not supply
        let kind = if ran_complete || unresolved.is_empty() {
            ReasoningErrorKind::AlgorithmFailure
        } else {
            ReasoningErrorKind::AxisGap
        };
        let mut message = format!(
            "{} of {} algorithm attempts failed: {}",
            failures.len(),
            candidates.len(),
            failures.join("; ")
        );
        if kind == ReasoningErrorKind::AxisGap {
            let axes: Vec<&str> = unresolved.iter().map(String::as_str).collect();
            message = format!("Required axes unavailable: {}; {}", axes.join(", "), message);
        }

        result.value = None;
        result.confidence = 0.0;
        result.error = Some(ReasoningError::new(kind, message));
        self.set_state(AgentState::Error);
    }

    fn accept(
        &self,
        algorithm_id: &str,
        alternate: bool,
        prepared: PreparedAxes,
        output: AlgorithmOutput,
        result: &mut ProcessResult,
    ) {
        let mut confidence = output.confidence * prepared.coverage();
        if !prepared.imputed.is_empty() {
            confidence *= IMPUTATION_PENALTY;
        }
        if alternate {
            confidence *= ALTERNATE_PENALTY;
        }
        let confidence = confidence.clamp(0.0, 1.0);

        result.value = Some(output.value);
        result.confidence = confidence;
        result.algorithm_id = algorithm_id.to_string();
        result.imputed_axes = prepared.imputed;
        result.metadata = output.metadata;
        result.error = None;
        for warning in output.warnings {
            push_unique(&mut result.warnings, warning);
        }

        if let Some(threshold) = self.confidence_threshold(algorithm_id) {
            if confidence < threshold {
                push_unique(
                    &mut result.warnings,
                    format!("Confidence below threshold: {:.2} < {:.2}", confidence, threshold),
                );
            }
        }
        if output.value < SIGNIFICANCE_FLOOR {
            push_unique(&mut result.warnings, "Result below significance floor".to_string());
        }

        self.record(
            result,
            format!("Computed {} with confidence {:.2}", algorithm_id, confidence),
        );
        self.set_state(AgentState::Idle);
    }

    // ─────────────────────────────────────────────────────────────
    // State & trace
    // ─────────────────────────────────────────────────────────────

    fn set_state(&self, state: AgentState) {
        *self.state.write() = state;
    }

    /// Append an action to the result and the learning trace
    fn record(&self, result: &mut ProcessResult, action: String) {
        debug!(agent = %self.name, depth = result.depth, "{}", action);
        self.learning_trace
            .write()
            .entries
            .push(TraceEntry::new(action.clone(), result.confidence, result.depth));
        result.actions.push(action);
    }
}

impl fmt::Debug for PersonaAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersonaAgent")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("domain_coverage", &self.domain_coverage)
            .field("algorithms_available", &self.algorithms_available)
            .field("state", &self.state())
            .finish()
    }
}

fn push_unique(list: &mut Vec<String>, entry: String) {
    if !list.contains(&entry) {
        list.push(entry);
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::algorithm::{
        AlgorithmRegistry, MockAlgorithm, FAILING_ALGORITHM, KNOWLEDGE_DISCOVERY, RISK_ASSESSMENT,
    };
    use crate::taxonomy::TaxonomyMap;

    fn provider() -> SharedProvider {
        Arc::new(AlgorithmRegistry::with_builtin())
    }

    fn agent(name: &str, domains: &[&str], algorithms: &[&str]) -> SharedAgent {
        let config = PersonaConfig::new(name).covering(domains).using(algorithms);
        Arc::new(PersonaAgent::from_config(config, provider()).unwrap())
    }

    fn full_item() -> KnowledgeItem {
        KnowledgeItem::new("n1")
            .with_classification("PL04")
            .with_axis("pillar_function", 0.9)
            .with_axis("level_hierarchy", 1.0)
    }

    #[tokio::test]
    async fn test_fully_covered_direct_computation() {
        let taxonomy = TaxonomyMap::bundled();
        let a = agent("Algebraist", &["PL04"], &[KNOWLEDGE_DISCOVERY]);

        let result = a
            .process_query(&full_item(), KNOWLEDGE_DISCOVERY, &taxonomy, RecursionContext::isolated(3))
            .await;

        assert!(result.error.is_none());
        assert!(result.confidence > 0.7 && result.confidence <= 1.0);
        assert!(result.subcalls.is_empty());
        assert_eq!(a.state(), AgentState::Idle);
        assert_eq!(a.learning_trace().len(), result.actions.len());
    }

    #[tokio::test]
    async fn test_ancestor_coverage() {
        let taxonomy = TaxonomyMap::bundled();
        // PL04 is a child of PL01
        let a = agent("Mathematician", &["PL01"], &[KNOWLEDGE_DISCOVERY]);

        let result = a
            .process_query(&full_item(), KNOWLEDGE_DISCOVERY, &taxonomy, RecursionContext::isolated(3))
            .await;
        assert!(!result.has_action("Domain expertise gap"));
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_imputation_lowers_confidence() {
        let taxonomy = TaxonomyMap::bundled();
        let a = agent("Algebraist", &["PL04"], &[KNOWLEDGE_DISCOVERY]);
        let partial = KnowledgeItem::new("n2")
            .with_classification("PL04")
            .with_axis("pillar_function", 0.9);

        let full = a
            .process_query(&full_item(), KNOWLEDGE_DISCOVERY, &taxonomy, RecursionContext::isolated(3))
            .await;
        let imputed = a
            .process_query(&partial, KNOWLEDGE_DISCOVERY, &taxonomy, RecursionContext::isolated(3))
            .await;

        assert_eq!(imputed.imputed_axes, vec!["level_hierarchy".to_string()]);
        assert!(imputed.confidence < full.confidence);
        let gap = imputed
            .actions
            .iter()
            .position(|a| a.starts_with("Gap detected - missing required axis"))
            .unwrap();
        assert!(imputed.actions[gap + 1].starts_with("Attempted axis imputation"));
    }

    #[tokio::test]
    async fn test_failing_only_algorithm() {
        let taxonomy = TaxonomyMap::bundled();
        let a = agent("Broken", &["PL04"], &[FAILING_ALGORITHM]);

        let result = a
            .process_query(&full_item(), FAILING_ALGORITHM, &taxonomy, RecursionContext::isolated(3))
            .await;

        let err = result.error.as_ref().unwrap();
        assert_eq!(err.kind, ReasoningErrorKind::AlgorithmFailure);
        assert!(result.has_action("Algorithm execution failed"));
        assert!(!result.has_action("Attempting alternate algorithm"));
        assert_eq!(a.state(), AgentState::Error);
    }

    #[tokio::test]
    async fn test_alternate_algorithm_recovers() {
        let taxonomy = TaxonomyMap::bundled();
        let a = agent("Fallback", &["PL04"], &[FAILING_ALGORITHM, KNOWLEDGE_DISCOVERY]);

        let result = a
            .process_query(&full_item(), FAILING_ALGORITHM, &taxonomy, RecursionContext::isolated(3))
            .await;

        assert!(result.has_action("Algorithm execution failed"));
        assert!(result.has_action("Attempting alternate algorithm"));
        assert!(result.is_success());
        assert_eq!(result.algorithm_id, KNOWLEDGE_DISCOVERY);
        assert!(result.confidence < 0.95 * ALTERNATE_PENALTY + 1e-9);
    }

    #[tokio::test]
    async fn test_retries_only_once() {
        let mut registry = AlgorithmRegistry::new();
        registry.register(Arc::new(MockAlgorithm::failing("f1")));
        registry.register(Arc::new(MockAlgorithm::failing("f2")));
        registry.register(Arc::new(MockAlgorithm::failing("f3")));
        let config = PersonaConfig::new("Unlucky").covering(&["PL04"]).using(&["f1", "f2", "f3"]);
        let a = PersonaAgent::from_config(config, Arc::new(registry)).unwrap();

        let result = a
            .process_query(&full_item(), "f1", &TaxonomyMap::bundled(), RecursionContext::isolated(3))
            .await;

        let failures = result.actions.iter().filter(|a| a.starts_with("Algorithm execution failed")).count();
        assert_eq!(failures, 2);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_domain_gap_without_peer() {
        let taxonomy = TaxonomyMap::bundled();
        let a = agent("Lawyer", &["PL03"], &[KNOWLEDGE_DISCOVERY]);

        let result = a
            .process_query(&full_item(), KNOWLEDGE_DISCOVERY, &taxonomy, RecursionContext::isolated(3))
            .await;

        assert!(result.has_action("Domain expertise gap detected"));
        assert_eq!(result.error.as_ref().unwrap().kind, ReasoningErrorKind::DomainGap);
        assert_eq!(result.confidence, 0.5);
        assert_eq!(a.state(), AgentState::Error);
    }

    #[tokio::test]
    async fn test_escalation_to_peer() {
        let taxonomy = TaxonomyMap::bundled();
        let lawyer = agent("Lawyer", &["PL03"], &[KNOWLEDGE_DISCOVERY]);
        let algebraist = agent("Algebraist", &["PL04"], &[KNOWLEDGE_DISCOVERY]);
        let peers: Arc<[SharedAgent]> = Arc::from(vec![lawyer.clone(), algebraist.clone()]);

        let result = lawyer
            .process_query(&full_item(), KNOWLEDGE_DISCOVERY, &taxonomy, RecursionContext::root(3, peers))
            .await;

        assert!(result.has_action("Escalating to peer agent Algebraist"));
        assert_eq!(result.subcalls.len(), 1);
        let sub = &result.subcalls[0];
        assert_eq!(sub.depth, 1);
        assert!(sub.result.is_success());
        assert!(result.confidence < sub.result.confidence);
        assert_eq!(lawyer.state(), AgentState::Learning);
        assert_eq!(algebraist.state(), AgentState::Idle);
    }

    #[tokio::test]
    async fn test_zero_depth_blocks_escalation() {
        let taxonomy = TaxonomyMap::bundled();
        let lawyer = agent("Lawyer", &["PL03"], &[KNOWLEDGE_DISCOVERY]);
        let algebraist = agent("Algebraist", &["PL04"], &[KNOWLEDGE_DISCOVERY]);
        let peers: Arc<[SharedAgent]> = Arc::from(vec![algebraist]);

        let result = lawyer
            .process_query(&full_item(), KNOWLEDGE_DISCOVERY, &taxonomy, RecursionContext::root(0, peers))
            .await;

        assert!(result.has_action("Recursion limit reached at depth 0"));
        assert_eq!(
            result.error.as_ref().unwrap().kind,
            ReasoningErrorKind::RecursionLimitExceeded
        );
        assert!(result.subcalls.is_empty());
    }

    #[tokio::test]
    async fn test_missing_optional_axis_warning() {
        let taxonomy = TaxonomyMap::bundled();
        let a = agent("Risk", &["PL04"], &[RISK_ASSESSMENT]);
        let item = KnowledgeItem::new("n3")
            .with_classification("PL04")
            .with_axis("unified_system_function", 0.6)
            .with_axis("risk_tensor", 0.8);

        let result = a
            .process_query(&item, RISK_ASSESSMENT, &taxonomy, RecursionContext::isolated(3))
            .await;

        assert!(result
            .warnings
            .contains(&"Missing optional axis: compliance_vector".to_string()));
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_trace_cleared_per_top_level_call() {
        let taxonomy = TaxonomyMap::bundled();
        let a = agent("Algebraist", &["PL04"], &[KNOWLEDGE_DISCOVERY]);

        for _ in 0..3 {
            a.process_query(&full_item(), KNOWLEDGE_DISCOVERY, &taxonomy, RecursionContext::isolated(3))
                .await;
        }
        let trace = a.learning_trace();
        assert!(trace[0].action.starts_with("Started processing"));
        assert_eq!(trace.iter().filter(|t| t.action.starts_with("Started")).count(), 1);
    }
}
