//! UKG Reasoner
//!
//! Persona agents evaluate knowledge items with pluggable algorithms,
//! recovering from domain gaps by escalating to peers under a bounded depth
//! and from algorithm failures by falling back to alternates. A background
//! task manager runs ensembles, validation chains and research lookups over
//! a fixed number of worker slots.

pub mod algorithm;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod orchestrator;
pub mod persona;
pub mod scenario;
pub mod services;
pub mod taxonomy;
pub mod types;
pub mod version;

pub use error::{Error, Result};
pub use orchestrator::{HistoryEntry, Orchestrator};
