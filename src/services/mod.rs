//! Collaborator services
//!
//! Interfaces the reasoner consumes but does not own, each with an in-memory
//! implementation:
//! - [`ItemStore`] - read-only item lookup
//! - [`ValidationService`] - knowledge-base, statistical and pattern checks
//! - [`ResearchSource`] - enrichment findings

mod research;
mod store;
mod validation;

pub use research::{Finding, ResearchSource, StaticResearchSource};
pub use store::{InMemoryItemStore, ItemStore};
pub use validation::{HeuristicValidator, StaticValidationService, ValidationOutcome, ValidationService};
