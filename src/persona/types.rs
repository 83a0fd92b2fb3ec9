//! Core types for persona agents.
//!
//! A persona is defined by its domain coverage (taxonomy ids it is
//! authoritative for) and its ordered algorithm preferences.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::algorithm::{KNOWLEDGE_DISCOVERY, RISK_ASSESSMENT};
use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────
// Agent State
// ─────────────────────────────────────────────────────────────────

/// Operating state of an agent.
///
/// `Idle -> Processing -> {Idle | Learning | Error}`. `Error` only describes
/// the last call; the next call moves the agent back to `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    #[default]
    Idle,
    Processing,
    /// Last call folded in knowledge from a peer escalation
    Learning,
    Error,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentState::Idle => "idle",
            AgentState::Processing => "processing",
            AgentState::Learning => "learning",
            AgentState::Error => "error",
        };
        f.write_str(s)
    }
}

// ─────────────────────────────────────────────────────────────────
// Learning Trace
// ─────────────────────────────────────────────────────────────────

/// One learning trace entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    /// Confidence known at the time of the action
    pub confidence: f64,
    /// Recursion depth of the call that recorded it
    pub depth: u32,
}

impl TraceEntry {
    pub fn new(action: impl Into<String>, confidence: f64, depth: u32) -> Self {
        Self {
            timestamp: Utc::now(),
            action: action.into(),
            confidence: confidence.clamp(0.0, 1.0),
            depth,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Persona Config (loaded from TOML)
// ─────────────────────────────────────────────────────────────────

/// Persona definition, deserialized from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Display name, unique within a registry.
    pub name: String,

    /// Short human-readable description.
    #[serde(default)]
    pub description: String,

    /// Taxonomy ids this persona is authoritative for.
    #[serde(default)]
    pub domain_coverage: Vec<String>,

    /// Algorithm ids in preference order (first = primary).
    #[serde(default)]
    pub algorithms_available: Vec<String>,

    /// Minimum confidence per algorithm before a result is flagged.
    #[serde(default = "default_confidence_thresholds")]
    pub confidence_thresholds: BTreeMap<String, f64>,
}

fn default_confidence_thresholds() -> BTreeMap<String, f64> {
    let mut thresholds = BTreeMap::new();
    thresholds.insert(KNOWLEDGE_DISCOVERY.to_string(), 0.7);
    thresholds.insert(RISK_ASSESSMENT.to_string(), 0.8);
    thresholds
}

impl PersonaConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            domain_coverage: Vec::new(),
            algorithms_available: Vec::new(),
            confidence_thresholds: default_confidence_thresholds(),
        }
    }

    /// Builder: covered taxonomy ids
    pub fn covering(mut self, domains: &[&str]) -> Self {
        self.domain_coverage = domains.iter().map(|d| d.to_string()).collect();
        self
    }

    /// Builder: algorithm preferences
    pub fn using(mut self, algorithms: &[&str]) -> Self {
        self.algorithms_available = algorithms.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Check the definition is well-formed.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Error::PersonaInvalid {
            name: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("Name must not be empty".to_string()));
        }
        if self.algorithms_available.is_empty() {
            return Err(invalid("At least one algorithm is required".to_string()));
        }
        if let Some(dup) = first_duplicate(&self.algorithms_available) {
            return Err(invalid(format!("Algorithm '{}' listed twice", dup)));
        }
        if let Some((algo, t)) = self
            .confidence_thresholds
            .iter()
            .find(|(_, t)| !(0.0..=1.0).contains(*t))
        {
            return Err(invalid(format!("Threshold {} for '{}' outside [0, 1]", t, algo)));
        }
        Ok(())
    }
}

fn first_duplicate(values: &[String]) -> Option<&str> {
    values
        .iter()
        .enumerate()
        .find(|(i, v)| values[..*i].contains(v))
        .map(|(_, v)| v.as_str())
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
