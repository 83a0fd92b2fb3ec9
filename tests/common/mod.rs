//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use ukg_reasoner::algorithm::{AlgorithmRegistry, MockAlgorithm, SharedProvider, KNOWLEDGE_DISCOVERY};
use ukg_reasoner::executor::{DispatchContext, TaskManager, TaskManagerConfig};
use ukg_reasoner::persona::{PersonaAgent, PersonaConfig, SharedAgent};
use ukg_reasoner::services::{InMemoryItemStore, ItemStore};
use ukg_reasoner::taxonomy::TaxonomyMap;
use ukg_reasoner::types::KnowledgeItem;

/// Id of a mock algorithm that sleeps before answering
pub const SLOW: &str = "slow_discovery";

/// Built-in algorithms plus a slow mock with the given latency
pub fn provider(slow_latency_ms: u64) -> SharedProvider {
    let mut registry = AlgorithmRegistry::with_builtin();
    registry.register(Arc::new(
        MockAlgorithm::with_axes(SLOW, &["pillar_function"]).with_latency(slow_latency_ms),
    ));
    Arc::new(registry)
}

pub fn agent(name: &str, domains: &[&str], algorithms: &[&str], provider: &SharedProvider) -> SharedAgent {
    let config = PersonaConfig::new(name).covering(domains).using(algorithms);
    Arc::new(PersonaAgent::from_config(config, provider.clone()).expect("valid persona"))
}

/// Three agents covering mathematics, computer science and law
pub fn panel(provider: &SharedProvider) -> Vec<SharedAgent> {
    vec![
        agent("Mathematician", &["PL01"], &[KNOWLEDGE_DISCOVERY, SLOW], provider),
        agent("Computer Scientist", &["PL02"], &[KNOWLEDGE_DISCOVERY, SLOW], provider),
        agent("Lawyer", &["PL03"], &[KNOWLEDGE_DISCOVERY, SLOW], provider),
    ]
}

/// Fully scored algebra item (PL04, a child of PL01)
pub fn algebra_item(id: &str) -> KnowledgeItem {
    KnowledgeItem::new(id)
        .with_label("Ring theory result")
        .with_classification("PL04")
        .with_axis("pillar_function", 0.9)
        .with_axis("level_hierarchy", 0.8)
        .with_axis("unified_system_function", 0.7)
}

pub fn store(items: impl IntoIterator<Item = KnowledgeItem>) -> Arc<dyn ItemStore> {
    Arc::new(InMemoryItemStore::from_items(items))
}

pub fn dispatch(agents: Vec<SharedAgent>, provider: SharedProvider, store: Arc<dyn ItemStore>) -> DispatchContext {
    DispatchContext::new(agents, provider, Arc::new(TaxonomyMap::bundled()), store)
}

/// Started task manager over the panel and one algebra item `n1`
pub fn started_manager(config: TaskManagerConfig, slow_latency_ms: u64) -> TaskManager {
    let provider = provider(slow_latency_ms);
    let agents = panel(&provider);
    let manager = TaskManager::new(config, dispatch(agents, provider, store([algebra_item("n1")])));
    manager.start().expect("manager starts");
    manager
}

// ─────────────────────────────────────────────────────────────────
// Config files
// ─────────────────────────────────────────────────────────────────

/// Temporary directory holding a reasoner config file
pub struct ConfigFixture {
    pub temp_dir: TempDir,
    pub config_path: PathBuf,
}

impl ConfigFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config_path = temp_dir.path().join("reasoner.toml");
        Self { temp_dir, config_path }
    }

    pub fn with_config(content: &str) -> Self {
        let fixture = Self::new();
        fixture.write_config(content);
        fixture
    }

    pub fn write_config(&self, content: &str) {
        fs::write(&self.config_path, content).expect("Failed to write config");
    }

    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    pub fn path(&self) -> &str {
        self.config_path.to_str().expect("utf-8 temp path")
    }
}
