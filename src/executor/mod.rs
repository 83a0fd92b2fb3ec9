//! Background task manager
//!
//! Handles the task lifecycle:
//! - Validating and scheduling work
//! - Admitting tasks into a fixed pool of worker slots
//! - Dispatching by task type to agents and collaborators
//! - Publishing whole-value task snapshots

pub mod consensus;
pub mod dispatch;
pub mod enrichment;
mod runner;
mod state;

pub use consensus::{ConfidenceStats, EnsembleMetrics};
pub use dispatch::{
    DispatchContext, EnsembleResult, ResearchReport, TaskResult, ValidationEntry, ValidationReport,
};
pub use enrichment::EnrichmentResult;
pub use runner::*;
pub use state::*;
