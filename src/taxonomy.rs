//! Taxonomy resolution
//!
//! Classifications (pillar levels) form a forest through optional parent
//! links. An agent covering `PL01` therefore also covers `PL04` when `PL04`
//! names `PL01` as its parent.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::KnowledgeItem;

// ─────────────────────────────────────────────────────────────────
// Resolver Trait
// ─────────────────────────────────────────────────────────────────

/// Read-only classification lookups
pub trait TaxonomyResolver: Send + Sync {
    /// Classification of an item, if any
    fn classify(&self, item: &KnowledgeItem) -> Option<String>;

    /// Whether a classification id exists
    fn is_known(&self, classification: &str) -> bool;

    /// Parent classification
    fn parent(&self, _classification: &str) -> Option<String> {
        None
    }

    /// The classification followed by its ancestors, nearest first.
    ///
    /// Stops on the first repeated id, so parent cycles terminate.
    fn lineage(&self, classification: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut chain = Vec::new();
        let mut current = Some(classification.to_string());

        while let Some(id) = current {
            if !seen.insert(id.clone()) {
                break;
            }
            current = self.parent(&id);
            chain.push(id);
        }

        chain
    }
}

// ─────────────────────────────────────────────────────────────────
// Taxonomy Map
// ─────────────────────────────────────────────────────────────────

/// One taxonomy node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl TaxonomyEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

/// In-memory taxonomy keyed by classification id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxonomyMap {
    entries: BTreeMap<String, TaxonomyEntry>,
}

impl TaxonomyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default pillar hierarchy
    pub fn bundled() -> Self {
        let mut map = Self::new();
        map.insert("PL01", TaxonomyEntry::new("Mathematics"));
        map.insert("PL02", TaxonomyEntry::new("Computer Science"));
        map.insert("PL03", TaxonomyEntry::new("Law"));
        map.insert("PL04", TaxonomyEntry::new("Algebra").with_parent("PL01"));
        map.insert("PL05", TaxonomyEntry::new("Analysis").with_parent("PL01"));
        map.insert("PL06", TaxonomyEntry::new("Artificial Intelligence").with_parent("PL02"));
        map.insert("PL07", TaxonomyEntry::new("Quantum Computing").with_parent("PL02"));
        map
    }

    pub fn insert(&mut self, id: impl Into<String>, entry: TaxonomyEntry) {
        self.entries.insert(id.into(), entry);
    }

    pub fn get(&self, id: &str) -> Option<&TaxonomyEntry> {
        self.entries.get(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &TaxonomyEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parent ids that do not resolve to an entry
    pub fn dangling_parents(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter_map(|(id, entry)| {
                entry
                    .parent
                    .as_ref()
                    .filter(|p| !self.entries.contains_key(*p))
                    .map(|p| (id.clone(), p.clone()))
            })
            .collect()
    }
}

impl TaxonomyResolver for TaxonomyMap {
    fn classify(&self, item: &KnowledgeItem) -> Option<String> {
        item.classification.clone()
    }

    fn is_known(&self, classification: &str) -> bool {
        self.entries.contains_key(classification)
    }

    fn parent(&self, classification: &str) -> Option<String> {
        self.entries.get(classification).and_then(|e| e.parent.clone())
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
