//! JSON scenarios: items, research findings and a batch of tasks
//!
//! Used by `ukg-reasoner run` to drive a task manager end to end.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::executor::Task;
use crate::orchestrator::Orchestrator;
use crate::services::{Finding, InMemoryItemStore, StaticResearchSource};
use crate::types::{KnowledgeItem, TaskId, TaskParameters};

const DEMO_SCENARIO: &str = include_str!("../config/demo-scenario.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioTask {
    /// Task type name (`ensemble`, `validation`, `research`, `analysis`)
    #[serde(rename = "type")]
    pub task_type: String,
    /// Item reference
    pub item: String,
    #[serde(default)]
    pub parameters: TaskParameters,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub items: Vec<KnowledgeItem>,
    /// Research findings keyed by item id
    pub findings: HashMap<String, Vec<Finding>>,
    pub tasks: Vec<ScenarioTask>,
}

impl Scenario {
    pub fn demo() -> Result<Self> {
        Self::from_json(DEMO_SCENARIO)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::IoRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&content)
    }

    /// Schedule every task on a fresh task manager and wait for all of them,
    /// follow-ups included. Returns snapshots in schedule order.
    pub async fn run(&self, orchestrator: &Orchestrator) -> Result<Vec<Task>> {
        for item in &self.items {
            orchestrator.validate_item(item)?;
        }

        let store = Arc::new(InMemoryItemStore::from_items(self.items.iter().cloned()));
        let research = Arc::new(StaticResearchSource::from_map(self.findings.clone()));
        let dispatch = orchestrator.dispatch_context(store).with_research(research);

        let manager = orchestrator.task_manager(dispatch);
        manager.start()?;

        let scheduled: Vec<TaskId> = self
            .tasks
            .iter()
            .map(|t| manager.schedule_named(&t.task_type, &t.item, t.parameters.clone()))
            .collect::<Result<_>>()?;
        info!(tasks = scheduled.len(), items = self.items.len(), "Scenario scheduled");

        let tasks = manager.wait_all().await;
        manager.shutdown();
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::AlgorithmRegistry;
    use crate::persona::PersonaRegistry;
    use crate::taxonomy::TaxonomyMap;
    use crate::types::TaskStatus;

    #[test]
    fn test_demo_parses() {
        let scenario = Scenario::demo().unwrap();
        assert_eq!(scenario.items.len(), 3);
        assert_eq!(scenario.tasks.len(), 4);
        assert_eq!(scenario.tasks[0].parameters.ensemble_size, Some(3));
        // Unspecified parameters take their defaults
        assert!(scenario.tasks[2].parameters.enrich);
    }

    #[test]
    fn test_invalid_json() {
        let err = Scenario::from_json("{ \"tasks\": 7 }").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[tokio::test]
    async fn test_demo_runs_to_completion() {
        let orchestrator = Orchestrator::new(
            AlgorithmRegistry::with_builtin(),
            TaxonomyMap::bundled(),
            &PersonaRegistry::bundled().unwrap(),
        )
        .unwrap();

        let tasks = Scenario::demo().unwrap().run(&orchestrator).await.unwrap();
        assert!(tasks.len() >= 4);
        assert!(tasks.iter().all(|t| t.is_terminal()));
        assert_eq!(tasks[0].status, TaskStatus::Completed);
    }
}
