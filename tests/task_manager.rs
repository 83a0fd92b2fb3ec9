//! Task manager integration tests
//!
//! Slot accounting, ensembles, validation chains and research enrichment
//! driven through the public scheduling API

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::{algebra_item, dispatch, panel, provider, started_manager, store};
use ukg_reasoner::executor::{TaskManager, TaskManagerConfig, TaskResult};
use ukg_reasoner::services::{Finding, StaticResearchSource, StaticValidationService};
use ukg_reasoner::types::{TaskParameters, TaskStatus, TaskType, ValidationKind, ValidationMode};

fn research_manager(config: TaskManagerConfig, source: StaticResearchSource) -> TaskManager {
    let provider = provider(0);
    let agents = panel(&provider);
    let items = (1..=10).map(|i| algebra_item(&format!("n{}", i)));
    let ctx = dispatch(agents, provider, store(items)).with_research(Arc::new(source));
    let manager = TaskManager::new(config, ctx);
    manager.start().expect("manager starts");
    manager
}

fn validation_manager(service: StaticValidationService) -> TaskManager {
    let provider = provider(0);
    let agents = panel(&provider);
    let ctx = dispatch(agents, provider, store([algebra_item("n1")])).with_validation(Arc::new(service));
    let manager = TaskManager::new(TaskManagerConfig::default(), ctx);
    manager.start().expect("manager starts");
    manager
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_running_never_exceeds_slots() {
    let source = StaticResearchSource::new().with_latency(50);
    let manager = research_manager(TaskManagerConfig::default().with_max_concurrent(3), source);

    let ids: Vec<_> = (1..=10)
        .map(|i| {
            manager
                .schedule(TaskType::Research, &format!("n{}", i), TaskParameters::default())
                .unwrap()
        })
        .collect();

    let mut peak = 0;
    while manager.stats().in_flight() > 0 {
        let running = manager.running_count();
        assert!(running <= 3, "{} tasks running with 3 slots", running);
        peak = peak.max(running);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(peak >= 1);
    for id in ids {
        assert_eq!(manager.status(id), Some(TaskStatus::Completed));
    }
    let stats = manager.stats();
    assert_eq!(stats.completed, 10);
    assert_eq!(stats.total_completed, 10);
    assert_eq!(stats.failed, 0);
    manager.shutdown();
}

#[tokio::test]
async fn test_single_slot_admits_in_schedule_order() {
    let source = StaticResearchSource::new().with_latency(10);
    let manager = research_manager(TaskManagerConfig::default().with_max_concurrent(1), source);

    let ids: Vec<_> = ["n1", "n2", "n3"]
        .iter()
        .map(|item| manager.schedule(TaskType::Research, item, TaskParameters::default()).unwrap())
        .collect();
    manager.wait_all().await;

    let started: Vec<_> = ids
        .iter()
        .map(|id| manager.get(*id).and_then(|t| t.started_at).expect("task started"))
        .collect();
    assert!(started.windows(2).all(|w| w[0] <= w[1]));

    let tasks = manager.tasks();
    let order: Vec<_> = tasks.iter().map(|t| t.id).collect();
    assert_eq!(order, ids);
}

#[tokio::test]
async fn test_ensemble_collects_every_member() {
    let manager = started_manager(TaskManagerConfig::default(), 0);

    let id = manager
        .schedule(TaskType::Ensemble, "n1", TaskParameters::default().with_ensemble_size(3))
        .unwrap();
    let task = manager.wait(id).await.unwrap();

    assert_eq!(task.status, TaskStatus::Completed);
    let Some(TaskResult::Ensemble(ensemble)) = task.result else {
        panic!("expected ensemble result");
    };
    assert_eq!(ensemble.individual_results.len(), 3);
    assert_eq!(ensemble.succeeded, 3);
    assert_eq!(ensemble.failed, 0);
    assert!(ensemble.consensus.is_some());

    let names: HashSet<_> = ensemble.individual_results.iter().map(|r| r.agent_name.as_str()).collect();
    assert_eq!(names.len(), 3);

    // Two members escalate to the mathematician, so agreement stays high
    let metrics = &ensemble.metrics;
    assert!(metrics.disagreement_level < 0.3);
    assert!((metrics.agreement_score - (1.0 - metrics.disagreement_level)).abs() < 1e-9);
    assert!(ensemble.follow_up_task.is_none());
    assert_eq!(manager.tasks().len(), 1);
}

#[tokio::test]
async fn test_disagreeing_ensemble_schedules_validation() {
    let config = TaskManagerConfig {
        disagreement_threshold: 0.0,
        ..TaskManagerConfig::default()
    };
    let manager = started_manager(config, 0);

    let id = manager.schedule(TaskType::Ensemble, "n1", TaskParameters::default()).unwrap();
    let tasks = manager.wait_all().await;

    let ensemble_task = tasks.iter().find(|t| t.id == id).expect("ensemble task");
    let Some(TaskResult::Ensemble(ensemble)) = &ensemble_task.result else {
        panic!("expected ensemble result");
    };
    let follow_up = ensemble.follow_up_task.expect("follow-up scheduled");

    let validation = tasks.iter().find(|t| t.id == follow_up).expect("follow-up task");
    assert_eq!(validation.task_type, TaskType::Validation);
    assert_eq!(validation.item_ref, "n1");
    assert_eq!(validation.parameters.validation_mode, ValidationMode::Hybrid);
    assert_eq!(validation.status, TaskStatus::Completed);
    assert!(validation.sequence > ensemble_task.sequence);
}

#[tokio::test]
async fn test_follow_up_disabled() {
    let config = TaskManagerConfig {
        disagreement_threshold: 0.0,
        ..TaskManagerConfig::default()
    }
    .with_auto_validate(false);
    let manager = started_manager(config, 0);

    manager.schedule(TaskType::Ensemble, "n1", TaskParameters::default()).unwrap();
    let tasks = manager.wait_all().await;
    assert_eq!(tasks.len(), 1);
}

#[tokio::test]
async fn test_hybrid_validation_runs_every_strategy() {
    let manager = started_manager(TaskManagerConfig::default(), 0);

    let id = manager.schedule(TaskType::Validation, "n1", TaskParameters::default()).unwrap();
    let task = manager.wait(id).await.unwrap();

    assert_eq!(task.status, TaskStatus::Completed);
    let Some(TaskResult::Validation(report)) = task.result else {
        panic!("expected validation report");
    };
    let kinds: Vec<_> = report.validations.iter().map(|v| v.kind).collect();
    assert_eq!(
        kinds,
        vec![ValidationKind::KnowledgeBase, ValidationKind::Statistical, ValidationKind::Pattern]
    );
    assert!(report.validations.iter().all(|v| v.status == TaskStatus::Completed));

    let candidate = report.candidate.as_ref().expect("candidate result");
    assert_eq!(candidate.agent_name, "Mathematician");
    let overall = report.overall_score.expect("overall score");
    assert!((0.0..=1.0).contains(&overall));
}

#[tokio::test]
async fn test_validation_tolerates_failed_strategy() {
    let service = StaticValidationService::new(0.8)
        .with_score(ValidationKind::Pattern, 0.6)
        .failing(ValidationKind::Statistical);
    let manager = validation_manager(service);

    let id = manager.schedule(TaskType::Validation, "n1", TaskParameters::default()).unwrap();
    let task = manager.wait(id).await.unwrap();

    assert_eq!(task.status, TaskStatus::Completed);
    let Some(TaskResult::Validation(report)) = task.result else {
        panic!("expected validation report");
    };
    let failed: Vec<_> = report
        .validations
        .iter()
        .filter(|v| v.status == TaskStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].kind, ValidationKind::Statistical);
    assert_eq!(failed[0].score, 0.0);
    assert!(failed[0].error.as_deref().is_some_and(|e| e.starts_with("[E501]")));

    let overall = report.overall_score.expect("overall score");
    assert!((overall - 0.7).abs() < 1e-9);
}

#[tokio::test]
async fn test_validation_fails_when_no_strategy_completes() {
    let service = StaticValidationService::new(0.8).failing(ValidationKind::KnowledgeBase);
    let manager = validation_manager(service);

    let params = TaskParameters::default().with_validation_mode(ValidationMode::KnowledgeBase);
    let id = manager.schedule(TaskType::Validation, "n1", params).unwrap();
    let task = manager.wait(id).await.unwrap();

    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error.as_deref().is_some_and(|e| e.starts_with("[E501]")));
    // The failed entry is kept on the task
    let Some(TaskResult::Validation(report)) = task.result else {
        panic!("expected partial validation report");
    };
    assert_eq!(report.validations.len(), 1);
    assert!(report.overall_score.is_none());
}

#[tokio::test]
async fn test_research_ranks_and_enriches() {
    let source = StaticResearchSource::new().with_findings(
        "n1",
        vec![
            Finding::new("survey", 0.6).suggesting("pillar_function", 0.1),
            Finding::new("citation graph", 0.2).suggesting("compliance_vector", 0.4),
            Finding::new("benchmark", 0.9).suggesting("risk_tensor", 0.7),
            Finding::new("deep archive", 0.95).suggesting("temporal_context", 0.5).at_depth(3),
        ],
    );
    let manager = research_manager(TaskManagerConfig::default(), source);

    let id = manager
        .schedule(TaskType::Research, "n1", TaskParameters::default().with_research_depth(2))
        .unwrap();
    let task = manager.wait(id).await.unwrap();

    assert_eq!(task.status, TaskStatus::Completed);
    let Some(TaskResult::Research(report)) = task.result else {
        panic!("expected research report");
    };
    assert_eq!(report.depth, 2);
    let relevance: Vec<f64> = report.findings.iter().map(|f| f.relevance).collect();
    assert_eq!(relevance, vec![0.9, 0.6, 0.2]);

    let enrichment = report.enrichment.expect("enrichment requested");
    assert_eq!(enrichment.added_axes, vec!["risk_tensor".to_string()]);
    assert_eq!(enrichment.skipped_axes, vec!["pillar_function".to_string()]);
    assert!(!enrichment.axis_values.contains_key("compliance_vector"));
    assert_eq!(enrichment.axis_values.len(), 4);
}

#[tokio::test]
async fn test_research_without_enrichment() {
    let source = StaticResearchSource::new().with_findings("n1", vec![Finding::new("benchmark", 0.9)]);
    let manager = research_manager(TaskManagerConfig::default(), source);

    let params = TaskParameters {
        enrich: false,
        ..TaskParameters::default()
    };
    let id = manager.schedule(TaskType::Research, "n1", params).unwrap();
    let task = manager.wait(id).await.unwrap();

    let Some(TaskResult::Research(report)) = task.result else {
        panic!("expected research report");
    };
    assert_eq!(report.findings.len(), 1);
    assert!(report.enrichment.is_none());
}

#[tokio::test]
async fn test_research_source_failure() {
    let manager = research_manager(TaskManagerConfig::default(), StaticResearchSource::new().failing());

    let id = manager.schedule(TaskType::Research, "n1", TaskParameters::default()).unwrap();
    let task = manager.wait(id).await.unwrap();

    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error.as_deref().is_some_and(|e| e.starts_with("[E502]")));
    assert!(task.result.is_none());
}

#[tokio::test]
async fn test_analysis_with_named_agent() {
    let manager = started_manager(TaskManagerConfig::default(), 0);

    let params = TaskParameters::default().with_agent("Lawyer");
    let id = manager.schedule_named("analysis", "n1", params).unwrap();
    let task = manager.wait(id).await.unwrap();

    assert_eq!(task.status, TaskStatus::Completed);
    let Some(TaskResult::Analysis(result)) = task.result else {
        panic!("expected analysis result");
    };
    assert_eq!(result.agent_name, "Lawyer");
    assert_eq!(result.subcalls.len(), 1);
    assert_eq!(result.subcalls[0].agent_name, "Mathematician");
}

#[tokio::test]
async fn test_cancel_queued_task_never_starts() {
    let manager = started_manager(TaskManagerConfig::default().with_max_concurrent(1), 100);
    let params = TaskParameters::default().with_algorithm(common::SLOW);

    let first = manager.schedule(TaskType::Analysis, "n1", params.clone()).unwrap();
    let second = manager.schedule(TaskType::Analysis, "n1", params).unwrap();

    assert!(manager.cancel(second).unwrap());
    let cancelled = manager.wait(second).await.unwrap();
    assert_eq!(cancelled.status, TaskStatus::Failed);
    assert!(cancelled.error.as_deref().is_some_and(|e| e.starts_with("[E404]")));

    let done = manager.wait(first).await.unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    manager.wait_all().await;

    assert!(manager.get(second).and_then(|t| t.started_at).is_none());
    assert!(!manager.cancel(first).unwrap());
}

#[tokio::test]
async fn test_timeout_releases_slot() {
    let config = TaskManagerConfig::default()
        .with_max_concurrent(1)
        .with_timeout(Duration::from_millis(30));
    let manager = started_manager(config, 200);

    let slow = manager
        .schedule(TaskType::Analysis, "n1", TaskParameters::default().with_algorithm(common::SLOW))
        .unwrap();
    let quick = manager.schedule(TaskType::Analysis, "n1", TaskParameters::default()).unwrap();

    let timed_out = manager.wait(slow).await.unwrap();
    assert_eq!(timed_out.status, TaskStatus::Failed);
    assert!(timed_out.error.as_deref().is_some_and(|e| e.contains("timed out")));

    let after = manager.wait(quick).await.unwrap();
    assert_eq!(after.status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_cleanup_keeps_newest_finished() {
    let config = TaskManagerConfig::default().with_max_concurrent(1);
    let manager = research_manager(config, StaticResearchSource::new().with_latency(5));

    let ids: Vec<_> = (1..=4)
        .map(|i| {
            manager
                .schedule(TaskType::Research, &format!("n{}", i), TaskParameters::default())
                .unwrap()
        })
        .collect();
    manager.wait_all().await;

    assert_eq!(manager.cleanup_finished(1), 3);
    let remaining = manager.tasks();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, ids[3]);
    assert!(manager.get(ids[0]).is_none());

    let stats = manager.stats();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.total_completed, 4);
}

#[tokio::test]
async fn test_unknown_task_type_rejected() {
    let manager = started_manager(TaskManagerConfig::default(), 0);

    let err = manager
        .schedule_named("summarize", "n1", TaskParameters::default())
        .unwrap_err();
    assert!(err.format_for_log().starts_with("[E400]"));

    let err = manager
        .schedule(TaskType::Ensemble, "n1", TaskParameters::default().with_ensemble_size(0))
        .unwrap_err();
    assert!(err.format_for_log().starts_with("[E401]"));
    assert!(manager.tasks().is_empty());
}
