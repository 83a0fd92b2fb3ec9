//! Persona agents: recursive reasoning units.
//!
//! Each agent is authoritative for a set of taxonomy ids and carries an
//! ordered list of algorithms. When an item falls outside its coverage it
//! escalates to a peer one recursion level deeper; when an algorithm fails it
//! retries once with an alternate.

use std::sync::Arc;

pub mod agent;
pub mod context;
pub mod imputation;
pub mod registry;
pub mod types;

pub use agent::PersonaAgent;
pub use context::{ProcessResult, RecursionContext, Subcall};
pub use imputation::{Imputer, DEFAULT_IMPUTATION_PRIOR};
pub use registry::PersonaRegistry;
pub use types::{AgentState, PersonaConfig, TraceEntry};

/// Shared agent handle
pub type SharedAgent = Arc<PersonaAgent>;
