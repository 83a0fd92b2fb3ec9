//! Bundled persona registry: default definitions and agent construction.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::algorithm::SharedProvider;
use crate::error::{Error, Result};

use super::agent::PersonaAgent;
use super::imputation::Imputer;
use super::types::PersonaConfig;
use super::SharedAgent;

const BUNDLED_PERSONAS: &str = include_str!("../../config/personas.toml");

#[derive(Deserialize)]
struct PersonaFile {
    #[serde(default)]
    personas: Vec<PersonaConfig>,
}

/// Registry of persona definitions.
///
/// Serves the bundled defaults unless explicit definitions are supplied.
#[derive(Debug, Clone, Default)]
pub struct PersonaRegistry {
    definitions: Vec<PersonaConfig>,
}

impl PersonaRegistry {
    pub fn new(definitions: Vec<PersonaConfig>) -> Self {
        Self { definitions }
    }

    /// Registry of the bundled definitions
    pub fn bundled() -> Result<Self> {
        Self::from_toml(BUNDLED_PERSONAS)
    }

    /// Explicit definitions, or the bundled set when none are given
    pub fn or_bundled(definitions: Vec<PersonaConfig>) -> Result<Self> {
        if definitions.is_empty() {
            Self::bundled()
        } else {
            Ok(Self::new(definitions))
        }
    }

    /// Parse a `[[personas]]` document
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: PersonaFile = toml::from_str(content)
            .map_err(|e| Error::config_parse(format!("Invalid persona definitions: {}", e)))?;
        Ok(Self::new(file.personas))
    }

    pub fn definitions(&self) -> &[PersonaConfig] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Validate every definition and reject duplicate names
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for def in &self.definitions {
            def.validate()?;
            if !names.insert(def.name.as_str()) {
                return Err(Error::PersonaInvalid {
                    name: def.name.clone(),
                    reason: "Duplicate persona name".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Build agents in definition order
    pub fn build_agents(&self, algorithms: SharedProvider, imputer: Imputer) -> Result<Vec<SharedAgent>> {
        self.validate()?;

        self.definitions
            .iter()
            .map(|def| {
                for algo in &def.algorithms_available {
                    if !algorithms.contains(algo) {
                        debug!(persona = %def.name, algorithm = %algo, "Persona lists an unregistered algorithm");
                    }
                }
                let agent = PersonaAgent::from_config(def.clone(), algorithms.clone())?.with_imputer(imputer);
                Ok(Arc::new(agent))
            })
            .collect()
    }
}
