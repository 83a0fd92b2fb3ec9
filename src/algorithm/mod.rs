//! Algorithm registry and built-in algorithms
//!
//! Each algorithm id maps to one [`Algorithm`] implementation:
//! - `ai_knowledge_discovery` - weighted pillar/hierarchy scoring
//! - `risk_assessment` - system/risk/compliance scoring
//! - `failing_algorithm` - always fails, for recovery paths
//!
//! Agents execute through the [`AlgorithmProvider`] trait so tests and callers
//! can substitute their own registry.

mod discovery;
mod mock;
mod registry;
mod risk;
mod traits;

pub use discovery::{KnowledgeDiscovery, KNOWLEDGE_DISCOVERY};
pub use mock::{MockAlgorithm, MockAlgorithmConfig, FAILING_ALGORITHM};
pub use registry::{AlgorithmKind, AlgorithmRegistry};
pub use risk::{RiskAssessment, RISK_ASSESSMENT};
pub use traits::*;
