//! Recursion context and query results.
//!
//! The context travels by value down the call tree; each escalation hands the
//! peer a copy one level deeper. Results nest the same way through
//! [`Subcall`] records.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::algorithm::AlgorithmParams;
use crate::error::ReasoningError;

use super::SharedAgent;

// ─────────────────────────────────────────────────────────────────
// Recursion Context
// ─────────────────────────────────────────────────────────────────

/// Bounded recursion state for one `process_query` call tree.
///
/// Holds `0 <= depth <= max_depth`; escalation is only attempted while
/// `depth < max_depth`.
#[derive(Clone)]
pub struct RecursionContext {
    /// Current depth, 0 at the top-level call
    pub depth: u32,

    /// Ceiling supplied by the caller
    pub max_depth: u32,

    /// Candidate peers, in registration order
    pub peers: Arc<[SharedAgent]>,

    /// Agents already on the current call path
    pub visited: Vec<Uuid>,

    /// Parameters forwarded to every algorithm execution
    pub params: AlgorithmParams,
}

impl RecursionContext {
    /// Top-level context
    pub fn root(max_depth: u32, peers: Arc<[SharedAgent]>) -> Self {
        Self {
            depth: 0,
            max_depth,
            peers,
            visited: Vec::new(),
            params: AlgorithmParams::default(),
        }
    }

    /// Top-level context without peers
    pub fn isolated(max_depth: u32) -> Self {
        Self::root(max_depth, Arc::from(Vec::new()))
    }

    /// Builder: algorithm parameters
    pub fn with_params(mut self, params: AlgorithmParams) -> Self {
        self.params = params;
        self
    }

    /// Whether another level of escalation fits the budget
    pub fn can_escalate(&self) -> bool {
        self.depth < self.max_depth
    }

    pub fn has_visited(&self, agent_id: Uuid) -> bool {
        self.visited.contains(&agent_id)
    }

    /// Context for a peer call one level deeper, recording the caller as visited
    pub(crate) fn descend(&self, caller: Uuid) -> Self {
        let mut next = self.clone();
        next.depth = self.depth + 1;
        if !next.visited.contains(&caller) {
            next.visited.push(caller);
        }
        next
    }
}

impl fmt::Debug for RecursionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecursionContext")
            .field("depth", &self.depth)
            .field("max_depth", &self.max_depth)
            .field("peers", &self.peers.len())
            .field("visited", &self.visited)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────────────────────────

/// Outcome of one `process_query` invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResult {
    pub agent_id: Uuid,
    pub agent_name: String,
    pub item_id: String,
    /// Algorithm that produced the value (the alternate after failover)
    pub algorithm_id: String,
    pub depth: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    /// Final score; `None` when no usable result exists
    pub value: Option<f64>,

    /// Certainty of `value` in [0, 1]
    pub confidence: f64,

    /// This invocation's trace strings (nested calls keep their own)
    pub actions: Vec<String>,

    pub warnings: Vec<String>,

    /// Present only when every recovery attempt failed
    pub error: Option<ReasoningError>,

    /// Required axes filled by imputation
    #[serde(default)]
    pub imputed_axes: Vec<String>,

    /// Algorithm-specific detail
    #[serde(default)]
    pub metadata: serde_json::Value,

    /// One record per escalation
    #[serde(default)]
    pub subcalls: Vec<Subcall>,
}

impl ProcessResult {
    /// Blank result for a call that has not produced anything yet
    pub fn empty(
        agent_id: Uuid,
        agent_name: impl Into<String>,
        item_id: impl Into<String>,
        algorithm_id: impl Into<String>,
        depth: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            agent_id,
            agent_name: agent_name.into(),
            item_id: item_id.into(),
            algorithm_id: algorithm_id.into(),
            depth,
            started_at: now,
            completed_at: now,
            value: None,
            confidence: 0.0,
            actions: Vec::new(),
            warnings: Vec::new(),
            error: None,
            imputed_axes: Vec::new(),
            metadata: serde_json::Value::Null,
            subcalls: Vec::new(),
        }
    }

    /// Usable value and no error
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.value.is_some()
    }

    /// Any action containing `needle`
    pub fn has_action(&self, needle: &str) -> bool {
        self.actions.iter().any(|a| a.contains(needle))
    }

    /// Deepest recursion level reached in this result tree
    pub fn deepest_level(&self) -> u32 {
        self.subcalls
            .iter()
            .map(|s| s.result.deepest_level().max(s.depth))
            .fold(self.depth, u32::max)
    }

    pub fn duration_ms(&self) -> i64 {
        (self.completed_at - self.started_at).num_milliseconds()
    }
}

/// Record of one escalation: the context snapshot plus the peer's result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subcall {
    pub depth: u32,
    pub max_depth: u32,
    pub agent_id: Uuid,
    pub agent_name: String,
    /// Why the caller escalated
    pub reason: String,
    pub result: ProcessResult,
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
