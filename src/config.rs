//! Configuration system for the UKG reasoner
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (UKG_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::persona::{PersonaConfig, PersonaRegistry, DEFAULT_IMPUTATION_PRIOR};
use crate::taxonomy::TaxonomyMap;

/// Main reasoner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasonerConfig {
    /// Persona agent engine settings
    pub engine: EngineSettings,

    /// Background task manager settings
    pub tasks: TaskSettings,

    /// Logging configuration
    pub logging: LoggingSettings,

    /// Classification hierarchy (empty = bundled pillars)
    #[serde(skip_serializing_if = "TaxonomyMap::is_empty")]
    pub taxonomy: TaxonomyMap,

    /// Persona definitions (empty = bundled personas)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub personas: Vec<PersonaConfig>,
}

/// Reasoning engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Maximum number of peer escalations below a root query
    pub max_recursion_depth: u32,

    /// Upper bound used when estimating a missing axis
    pub imputation_prior: f64,
}

/// Task manager settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    /// Worker slots
    pub max_concurrent: usize,

    /// Per-task wall clock limit in seconds
    pub task_timeout_secs: u64,

    /// Terminal tasks retained in the registry
    pub keep_finished: usize,

    /// Ensemble disagreement above which a follow-up validation runs
    pub disagreement_threshold: f64,

    /// Minimum finding relevance for enrichment
    pub enrichment_min_relevance: f64,

    /// Schedule follow-up validation for contested ensembles
    pub auto_validate: bool,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_recursion_depth: 3,
            imputation_prior: DEFAULT_IMPUTATION_PRIOR,
        }
    }
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            task_timeout_secs: 300,
            keep_finished: 1000,
            disagreement_threshold: 0.3,
            enrichment_min_relevance: 0.5,
            auto_validate: true,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_files: 5,
            json_format: false,
        }
    }
}

impl ReasonerConfig {
    /// Load configuration from file, environment, and defaults
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path).map_err(|e| Error::IoRead {
                path: path.clone(),
                source: e,
            })?;
            config = Self::from_toml(&content)?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration document without validating it
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse {
            message: e.to_string(),
            source: Some(e),
        })
    }

    /// Find configuration file in standard locations
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // If explicit path provided, use it (error if not found)
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::config_not_found(path));
        }

        let search_paths = [
            // Current directory
            PathBuf::from("ukg-reasoner.toml"),
            PathBuf::from("config.toml"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("ukg").join("reasoner.toml"))
                .unwrap_or_default(),
            // Home directory
            dirs::home_dir()
                .map(|p| p.join(".ukg").join("reasoner.toml"))
                .unwrap_or_default(),
            // System config (Linux)
            PathBuf::from("/etc/ukg/reasoner.toml"),
        ];

        for path in &search_paths {
            if !path.as_os_str().is_empty() && path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("UKG_MAX_RECURSION_DEPTH") {
            if let Ok(n) = val.parse() {
                self.engine.max_recursion_depth = n;
            }
        }

        if let Ok(val) = std::env::var("UKG_MAX_CONCURRENT") {
            if let Ok(n) = val.parse() {
                self.tasks.max_concurrent = n;
            }
        }
        if let Ok(val) = std::env::var("UKG_TASK_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.tasks.task_timeout_secs = n;
            }
        }

        if let Ok(val) = std::env::var("UKG_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("UKG_LOG_FILE") {
            self.logging.file = if val.is_empty() { None } else { Some(val) };
        }
        if let Ok(val) = std::env::var("UKG_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }
    }

    fn expand_paths(&mut self) {
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.engine.imputation_prior > 0.0 && self.engine.imputation_prior <= 1.0) {
            return Err(Error::config_field_invalid(
                "engine.imputation_prior",
                "imputation_prior must be in (0, 1]",
            ));
        }

        if self.tasks.max_concurrent == 0 {
            return Err(Error::config_field_invalid(
                "tasks.max_concurrent",
                "max_concurrent must be at least 1",
            ));
        }
        if self.tasks.task_timeout_secs == 0 {
            return Err(Error::config_field_invalid(
                "tasks.task_timeout_secs",
                "task_timeout_secs must be at least 1",
            ));
        }
        for (field, value) in [
            ("tasks.disagreement_threshold", self.tasks.disagreement_threshold),
            ("tasks.enrichment_min_relevance", self.tasks.enrichment_min_relevance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::config_field_invalid(
                    field,
                    format!("{} must be between 0 and 1", field),
                ));
            }
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        let dangling = self.taxonomy.dangling_parents();
        if let Some((id, parent)) = dangling.first() {
            return Err(Error::config_field_invalid(
                "taxonomy",
                format!("Entry '{}' has unknown parent '{}'", id, parent),
            ));
        }

        PersonaRegistry::new(self.personas.clone()).validate()?;

        Ok(())
    }

    /// Configured taxonomy, or the bundled pillar hierarchy when none is set
    pub fn taxonomy_map(&self) -> TaxonomyMap {
        if self.taxonomy.is_empty() {
            TaxonomyMap::bundled()
        } else {
            self.taxonomy.clone()
        }
    }

    /// Configured personas, or the bundled definitions when none are set
    pub fn persona_registry(&self) -> Result<PersonaRegistry> {
        PersonaRegistry::or_bundled(self.personas.clone())
    }
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or(std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Default location written by `config init`
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ukg")
        .join("reasoner.toml")
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(default_config_path);

    if config_path.exists() && !force {
        return Err(Error::config_validation(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(&config_path, generate_default_config()).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    info!(path = %config_path.display(), "Configuration file created");
    Ok(config_path)
}

/// Generate default configuration content with comments
fn generate_default_config() -> String {
    r#"# UKG Reasoner Configuration

[engine]
# Maximum peer escalations below a root query (0 disables escalation)
max_recursion_depth = 3

# Upper bound for imputed axis scores, in (0, 1]
imputation_prior = 0.5

[tasks]
# Number of tasks that may run at the same time
max_concurrent = 5

# Wall clock limit for a single task
task_timeout_secs = 300

# Finished tasks kept in memory before the oldest are dropped
keep_finished = 1000

# Ensembles whose disagreement exceeds this get a follow-up validation
disagreement_threshold = 0.3
auto_validate = true

# Findings below this relevance are ignored during enrichment
enrichment_min_relevance = 0.5

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (uncomment to enable file logging)
# file = "~/.ukg/logs/reasoner.log"

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logs
json_format = false

# Classification hierarchy. Leave empty to use the bundled pillars.
# [taxonomy.PL01]
# name = "Mathematics"
#
# [taxonomy.PL04]
# name = "Algebra"
# parent = "PL01"

# Persona definitions. Leave empty to use the bundled personas.
# [[personas]]
# name = "Mathematical Analysis Expert"
# description = "Pure and applied mathematics"
# domain_coverage = ["PL01"]
# algorithms_available = ["ai_knowledge_discovery"]
"#
    .to_string()
}
