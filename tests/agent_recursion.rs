//! Persona agent recursion tests
//!
//! Escalation, failover and trace behavior through the public API

mod common;

use std::sync::Arc;

use futures_util::future::join_all;

use common::{agent, algebra_item, panel, provider};
use ukg_reasoner::algorithm::{FAILING_ALGORITHM, KNOWLEDGE_DISCOVERY};
use ukg_reasoner::error::ReasoningErrorKind;
use ukg_reasoner::persona::{AgentState, RecursionContext, SharedAgent};
use ukg_reasoner::taxonomy::TaxonomyMap;
use ukg_reasoner::types::KnowledgeItem;

fn peers(agents: &[SharedAgent]) -> Arc<[SharedAgent]> {
    Arc::from(agents.to_vec())
}

#[tokio::test]
async fn test_escalation_picks_first_covering_peer() {
    let provider = provider(0);
    let agents = panel(&provider);
    let taxonomy = TaxonomyMap::bundled();
    let lawyer = &agents[2];

    let item = algebra_item("n1");
    let result = lawyer
        .process_query(&item, KNOWLEDGE_DISCOVERY, &taxonomy, RecursionContext::root(3, peers(&agents)))
        .await;

    assert!(result.is_success());
    assert!(result.has_action("Domain expertise gap detected: PL04 not covered"));
    assert!(result.has_action("Escalating to peer agent Mathematician for PL04"));
    assert_eq!(result.subcalls.len(), 1);

    let sub = &result.subcalls[0];
    assert_eq!(sub.agent_name, "Mathematician");
    assert_eq!(sub.depth, 1);
    assert_eq!(sub.max_depth, 3);
    assert_eq!(sub.result.depth, 1);
    assert!((result.confidence - sub.result.confidence * 0.9).abs() < 1e-9);
    assert_eq!(result.value, sub.result.value);
    assert_eq!(result.deepest_level(), 1);

    assert_eq!(lawyer.state(), AgentState::Learning);
    // The peer records its own actions at depth 1
    let peer_trace = agents[0].learning_trace();
    assert!(!peer_trace.is_empty());
    assert!(peer_trace.iter().all(|e| e.depth == 1));
}

#[tokio::test]
async fn test_unknown_classification_without_coverage() {
    let provider = provider(0);
    let agents = panel(&provider);
    let taxonomy = TaxonomyMap::bundled();

    let item = algebra_item("n1").with_classification("PL99");
    let result = agents[0]
        .process_query(&item, KNOWLEDGE_DISCOVERY, &taxonomy, RecursionContext::root(3, peers(&agents)))
        .await;

    assert!(result.value.is_none());
    assert_eq!(result.error.as_ref().map(|e| e.kind), Some(ReasoningErrorKind::DomainGap));
    assert!(result.warnings.iter().any(|w| w == "Unknown classification: PL99"));
    // Both required axes are present
    assert_eq!(result.confidence, 0.5);
    assert!(result.subcalls.is_empty());
    assert_eq!(agents[0].state(), AgentState::Error);
}

#[tokio::test]
async fn test_depth_limit_blocks_escalation() {
    let provider = provider(0);
    let agents = panel(&provider);
    let taxonomy = TaxonomyMap::bundled();

    let result = agents[1]
        .process_query(
            &algebra_item("n1"),
            KNOWLEDGE_DISCOVERY,
            &taxonomy,
            RecursionContext::root(0, peers(&agents)),
        )
        .await;

    assert_eq!(
        result.error.as_ref().map(|e| e.kind),
        Some(ReasoningErrorKind::RecursionLimitExceeded)
    );
    assert!(result.has_action("Recursion limit reached at depth 0"));
    assert!(!result.has_action("Escalating to peer agent"));
    assert!(agents[0].learning_trace().is_empty());
}

#[tokio::test]
async fn test_missing_axes_are_reported_before_failure() {
    let provider = provider(0);
    let only_discovery = agent("Analyst", &["PL01"], &[KNOWLEDGE_DISCOVERY], &provider);
    let taxonomy = TaxonomyMap::bundled();

    let item = KnowledgeItem::new("bare").with_classification("PL04");
    let result = only_discovery
        .process_query(&item, KNOWLEDGE_DISCOVERY, &taxonomy, RecursionContext::isolated(3))
        .await;

    assert!(result.has_action("Gap detected - missing required axis: pillar_function"));
    assert!(result.has_action("Attempted axis imputation: level_hierarchy"));
    assert!(result.warnings.iter().any(|w| w == "Missing required axis: pillar_function"));
    assert!(result.imputed_axes.is_empty());
    let err = result.error.as_ref().expect("axis gap recorded");
    assert_eq!(err.kind, ReasoningErrorKind::AxisGap);
    assert!(err.message.contains("Required axes unavailable: level_hierarchy, pillar_function"));
    assert_eq!(only_discovery.state(), AgentState::Error);
}

#[tokio::test]
async fn test_escalated_trace_survives_direct_call() {
    let provider = provider(100);
    let lawyer = agent("Lawyer", &["PL03"], &[common::SLOW], &provider);
    let mathematician = agent("Mathematician", &["PL01"], &[common::SLOW], &provider);
    let agents = vec![lawyer.clone(), mathematician.clone()];
    let taxonomy = TaxonomyMap::bundled();
    let escalated = algebra_item("n1");
    let direct = algebra_item("n2");

    let (via_lawyer, _) = tokio::join!(
        lawyer.process_query(&escalated, common::SLOW, &taxonomy, RecursionContext::root(3, peers(&agents))),
        async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            mathematician
                .process_query(&direct, common::SLOW, &taxonomy, RecursionContext::isolated(3))
                .await
        }
    );

    assert_eq!(via_lawyer.subcalls.len(), 1);
    let sub = &via_lawyer.subcalls[0].result;
    let nested: Vec<String> = mathematician
        .learning_trace()
        .into_iter()
        .filter(|e| e.depth == 1)
        .map(|e| e.action)
        .collect();
    assert_eq!(nested, sub.actions);
    assert!(nested[0].starts_with("Started processing item n1"));
}

#[tokio::test]
async fn test_abandoned_query_leaves_error_state() {
    let provider = provider(200);
    let mathematician = agent("Mathematician", &["PL01"], &[common::SLOW], &provider);
    let taxonomy = TaxonomyMap::bundled();
    let item = algebra_item("n1");

    let outcome = tokio::time::timeout(
        std::time::Duration::from_millis(30),
        mathematician.process_query(&item, common::SLOW, &taxonomy, RecursionContext::isolated(3)),
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(mathematician.state(), AgentState::Error);

    // The agent still serves the next call
    let retry = mathematician
        .process_query(&item, common::SLOW, &taxonomy, RecursionContext::isolated(3))
        .await;
    assert!(retry.is_success());
    assert_eq!(mathematician.state(), AgentState::Idle);
}

#[tokio::test]
async fn test_failover_trace_order() {
    let provider = provider(0);
    let flaky = agent("Flaky", &["PL01"], &[FAILING_ALGORITHM, KNOWLEDGE_DISCOVERY], &provider);
    let taxonomy = TaxonomyMap::bundled();

    let result = flaky
        .process_query(&algebra_item("n1"), FAILING_ALGORITHM, &taxonomy, RecursionContext::isolated(3))
        .await;

    let position = |needle: &str| result.actions.iter().position(|a| a.contains(needle));
    let failed = position("Algorithm execution failed").expect("failure recorded");
    let alternate = position("Attempting alternate algorithm ai_knowledge_discovery").expect("alternate recorded");
    assert!(failed < alternate);

    assert!(result.is_success());
    assert_eq!(result.algorithm_id, KNOWLEDGE_DISCOVERY);
    assert_eq!(flaky.state(), AgentState::Idle);

    let trace = flaky.learning_trace();
    assert_eq!(trace.len(), result.actions.len());
    assert!(trace.iter().all(|e| (0.0..=1.0).contains(&e.confidence) && e.depth == 0));
    assert!(trace.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test]
async fn test_concurrent_queries_on_one_agent() {
    let provider = provider(20);
    let mathematician = agent("Mathematician", &["PL01"], &[common::SLOW], &provider);
    let taxonomy = TaxonomyMap::bundled();
    let first = algebra_item("n1");
    let second = algebra_item("n2");

    let results = join_all([&first, &second].into_iter().map(|item| {
        mathematician.process_query(item, common::SLOW, &taxonomy, RecursionContext::isolated(3))
    }))
    .await;

    assert!(results.iter().all(|r| r.is_success()));
    assert_eq!(results[0].item_id, "n1");
    assert_eq!(results[1].item_id, "n2");

    // Top-level calls are serialized; the trace belongs to the last one
    let trace = mathematician.learning_trace();
    assert_eq!(trace.len(), results[1].actions.len());
    assert!(trace[0].action.contains("n2"));
}
