//! Orchestrator: composition root for agents and the task manager
//!
//! Holds the algorithm registry and taxonomy map as read-only configuration
//! and hands them to every persona agent and task manager it builds.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use crate::algorithm::{AlgorithmProvider, AlgorithmRegistry, SharedProvider};
use crate::config::ReasonerConfig;
use crate::error::{Error, Result};
use crate::executor::{DispatchContext, TaskManager, TaskManagerConfig};
use crate::persona::{Imputer, PersonaRegistry, ProcessResult, RecursionContext, SharedAgent};
use crate::services::ItemStore;
use crate::taxonomy::{TaxonomyMap, TaxonomyResolver};
use crate::types::KnowledgeItem;

/// History entries kept before the oldest are dropped
pub const MAX_HISTORY_ENTRIES: usize = 1000;

/// Outcome of one agent run through [`Orchestrator::process_item`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub item_id: String,
    pub agent_name: String,
    pub algorithm_id: String,
    pub success: bool,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

pub struct Orchestrator {
    algorithms: Arc<AlgorithmRegistry>,
    taxonomy: Arc<TaxonomyMap>,
    agents: Arc<[SharedAgent]>,
    max_recursion_depth: u32,
    enrichment_min_relevance: f64,
    task_config: TaskManagerConfig,
    history: RwLock<VecDeque<HistoryEntry>>,
    history_limit: usize,
}

impl Orchestrator {
    /// Build agents from `personas` over the given registry and taxonomy
    pub fn new(algorithms: AlgorithmRegistry, taxonomy: TaxonomyMap, personas: &PersonaRegistry) -> Result<Self> {
        Self::build(algorithms, taxonomy, personas, Imputer::default())
    }

    /// Built-in algorithms plus the configured taxonomy, personas and limits
    pub fn from_config(config: &ReasonerConfig) -> Result<Self> {
        let personas = config.persona_registry()?;
        let imputer = Imputer::new(config.engine.imputation_prior);
        let mut orchestrator = Self::build(
            AlgorithmRegistry::with_builtin(),
            config.taxonomy_map(),
            &personas,
            imputer,
        )?;
        orchestrator.max_recursion_depth = config.engine.max_recursion_depth;
        orchestrator.enrichment_min_relevance = config.tasks.enrichment_min_relevance;
        orchestrator.task_config = TaskManagerConfig::from_config(config);
        Ok(orchestrator)
    }

    fn build(
        algorithms: AlgorithmRegistry,
        taxonomy: TaxonomyMap,
        personas: &PersonaRegistry,
        imputer: Imputer,
    ) -> Result<Self> {
        let algorithms = Arc::new(algorithms);
        let provider: SharedProvider = algorithms.clone();
        let agents = personas.build_agents(provider, imputer)?;

        info!(
            agents = agents.len(),
            algorithms = algorithms.len(),
            classifications = taxonomy.len(),
            "Orchestrator initialized"
        );

        Ok(Self {
            algorithms,
            taxonomy: Arc::new(taxonomy),
            agents: Arc::from(agents),
            max_recursion_depth: 3,
            enrichment_min_relevance: 0.5,
            task_config: TaskManagerConfig::default(),
            history: RwLock::new(VecDeque::new()),
            history_limit: MAX_HISTORY_ENTRIES,
        })
    }

    /// Builder: history capacity, at least one entry
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    pub fn with_max_recursion_depth(mut self, depth: u32) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    pub fn with_task_config(mut self, config: TaskManagerConfig) -> Self {
        self.task_config = config;
        self
    }

    pub fn agents(&self) -> &[SharedAgent] {
        &self.agents
    }

    pub fn agent(&self, name: &str) -> Option<SharedAgent> {
        self.agents.iter().find(|a| a.name() == name).cloned()
    }

    pub fn algorithms(&self) -> &AlgorithmRegistry {
        &self.algorithms
    }

    pub fn taxonomy(&self) -> &TaxonomyMap {
        &self.taxonomy
    }

    pub fn max_recursion_depth(&self) -> u32 {
        self.max_recursion_depth
    }

    /// Structural checks applied before an item reaches any agent
    pub fn validate_item(&self, item: &KnowledgeItem) -> Result<()> {
        let invalid = |reason: String| Error::ItemInvalid {
            item_id: item.id.clone(),
            reason,
        };

        if item.id.trim().is_empty() {
            return Err(invalid("Item id must not be empty".to_string()));
        }

        if let Some(classification) = &item.classification {
            if !self.taxonomy.is_known(classification) {
                return Err(invalid(format!("Unknown classification: {}", classification)));
            }
        }

        for (axis, value) in &item.axis_values {
            if let Some(weights) = &value.weights {
                if weights.len() != value.values.len() {
                    return Err(invalid(format!(
                        "Axis {} has {} weights for {} values",
                        axis,
                        weights.len(),
                        value.values.len()
                    )));
                }
            }
            if value.values.iter().any(|v| !(0.0..=1.0).contains(v)) {
                return Err(invalid(format!("Axis {} has values outside [0, 1]", axis)));
            }
        }

        Ok(())
    }

    /// Run the named agents (all agents when `agent_names` is empty) directly
    /// against `item`, skipping those that do not offer `algorithm_id`.
    pub async fn process_item(
        &self,
        item: &KnowledgeItem,
        algorithm_id: &str,
        agent_names: &[&str],
    ) -> Result<Vec<ProcessResult>> {
        self.validate_item(item)?;

        if !self.algorithms.contains(algorithm_id) {
            return Err(Error::AlgorithmNotFound {
                algorithm_id: algorithm_id.to_string(),
            });
        }

        let selected: Vec<SharedAgent> = if agent_names.is_empty() {
            self.agents.to_vec()
        } else {
            agent_names
                .iter()
                .map(|name| {
                    self.agent(name).ok_or_else(|| Error::AgentNotFound {
                        name: name.to_string(),
                    })
                })
                .collect::<Result<_>>()?
        };

        let runnable: Vec<SharedAgent> = selected
            .into_iter()
            .filter(|agent| {
                let offers = agent.offers(algorithm_id);
                if !offers {
                    debug!(agent = %agent.name(), algorithm = %algorithm_id, "Agent skipped: algorithm not offered");
                }
                offers
            })
            .collect();

        let taxonomy: &dyn TaxonomyResolver = self.taxonomy.as_ref();
        let results = join_all(runnable.iter().map(|agent| {
            let ctx = RecursionContext::root(self.max_recursion_depth, self.agents.clone());
            agent.process_query(item, algorithm_id, taxonomy, ctx)
        }))
        .await;

        let mut history = self.history.write();
        for result in &results {
            if history.len() == self.history_limit {
                history.pop_front();
            }
            history.push_back(HistoryEntry {
                item_id: item.id.clone(),
                agent_name: result.agent_name.clone(),
                algorithm_id: result.algorithm_id.clone(),
                success: result.is_success(),
                confidence: result.confidence,
                error: result.error.as_ref().map(|e| e.to_string()),
                timestamp: result.completed_at,
            });
        }

        Ok(results)
    }

    /// History entries, optionally filtered by item and agent
    pub fn history(&self, item_id: Option<&str>, agent_name: Option<&str>) -> Vec<HistoryEntry> {
        self.history
            .read()
            .iter()
            .filter(|e| item_id.map_or(true, |id| e.item_id == id))
            .filter(|e| agent_name.map_or(true, |name| e.agent_name == name))
            .cloned()
            .collect()
    }

    /// Dispatch context over this orchestrator's agents and `store`
    pub fn dispatch_context(&self, store: Arc<dyn ItemStore>) -> DispatchContext {
        let taxonomy: Arc<dyn TaxonomyResolver> = self.taxonomy.clone();
        DispatchContext::new(self.agents.to_vec(), self.algorithms.clone(), taxonomy, store)
            .with_max_recursion_depth(self.max_recursion_depth)
            .with_enrichment_min_relevance(self.enrichment_min_relevance)
    }

    /// Task manager over `dispatch` with the configured limits (not started)
    pub fn task_manager(&self, dispatch: DispatchContext) -> TaskManager {
        TaskManager::new(self.task_config.clone(), dispatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{KNOWLEDGE_DISCOVERY, RISK_ASSESSMENT};
    use crate::types::AxisValue;

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(
            AlgorithmRegistry::with_builtin(),
            TaxonomyMap::bundled(),
            &PersonaRegistry::bundled().unwrap(),
        )
        .unwrap()
    }

    fn item() -> KnowledgeItem {
        KnowledgeItem::new("n1")
            .with_classification("PL04")
            .with_axis("pillar_function", 0.9)
            .with_axis("level_hierarchy", 0.8)
    }

    #[test]
    fn test_validate_item() {
        let o = orchestrator();
        assert!(o.validate_item(&item()).is_ok());

        let err = o.validate_item(&KnowledgeItem::new(" ")).unwrap_err();
        assert!(matches!(err, Error::ItemInvalid { .. }));

        let err = o
            .validate_item(&KnowledgeItem::new("n2").with_classification("PL99"))
            .unwrap_err();
        assert!(err.to_string().contains("PL99"));

        let err = o.validate_item(&KnowledgeItem::new("n3").with_axis("risk_tensor", 1.4)).unwrap_err();
        assert!(err.to_string().contains("outside [0, 1]"));

        let mut bad_weights = KnowledgeItem::new("n4");
        bad_weights
            .axis_values
            .insert("risk_tensor".to_string(), AxisValue::weighted(vec![0.2, 0.4], vec![1.0]));
        assert!(o.validate_item(&bad_weights).is_err());
    }

    #[tokio::test]
    async fn test_process_item_skips_agents_without_algorithm() {
        let o = orchestrator();
        let results = o.process_item(&item(), RISK_ASSESSMENT, &[]).await.unwrap();

        // Only the two risk-capable personas run
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.agent_name != "Mathematical Analysis Expert"));
    }

    #[tokio::test]
    async fn test_process_item_records_history() {
        let o = orchestrator();
        o.process_item(&item(), KNOWLEDGE_DISCOVERY, &["Mathematical Analysis Expert"])
            .await
            .unwrap();
        o.process_item(&item().with_classification("PL03"), KNOWLEDGE_DISCOVERY, &[])
            .await
            .unwrap();

        assert_eq!(o.history(None, None).len(), 4);
        let math = o.history(Some("n1"), Some("Mathematical Analysis Expert"));
        assert_eq!(math.len(), 2);
        assert!(math[0].success);
        assert!(math[0].confidence > 0.0);
    }

    #[tokio::test]
    async fn test_history_drops_oldest_entries() {
        let o = orchestrator().with_history_limit(3);
        o.process_item(&item(), KNOWLEDGE_DISCOVERY, &["Mathematical Analysis Expert"])
            .await
            .unwrap();
        o.process_item(&item().with_classification("PL03"), KNOWLEDGE_DISCOVERY, &[])
            .await
            .unwrap();

        let history = o.history(None, None);
        assert_eq!(history.len(), 3);
        // Only the second run's math entry is left
        assert_eq!(o.history(None, Some("Mathematical Analysis Expert")).len(), 1);
    }

    #[tokio::test]
    async fn test_process_item_rejects_unknowns() {
        let o = orchestrator();
        let err = o.process_item(&item(), "nope", &[]).await.unwrap_err();
        assert!(matches!(err, Error::AlgorithmNotFound { .. }));

        let err = o.process_item(&item(), KNOWLEDGE_DISCOVERY, &["Nobody"]).await.unwrap_err();
        assert!(matches!(err, Error::AgentNotFound { .. }));
        assert!(o.history(None, None).is_empty());
    }

    #[test]
    fn test_from_config_applies_limits() {
        let mut config = ReasonerConfig::default();
        config.engine.max_recursion_depth = 1;
        config.tasks.max_concurrent = 2;

        let o = Orchestrator::from_config(&config).unwrap();
        assert_eq!(o.max_recursion_depth(), 1);
        assert_eq!(o.agents().len(), 3);
        assert_eq!(o.task_config.max_concurrent, 2);
    }
}
