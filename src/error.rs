//! Error types for the UKG reasoner
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Exit codes for CLI
//! - A serializable [`ReasoningError`] carried inside agent results
//!
//! Reasoning friction (gaps, algorithm failures) is absorbed by the agent and
//! reported as data. Only programmer-error-class conditions surface as `Err`.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for reasoner operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,
    Serialization = 204,

    // Reasoning errors (3xx)
    DomainGap = 300,
    AxisGap = 301,
    AlgorithmNotFound = 302,
    AlgorithmFailure = 303,
    RecursionLimit = 304,

    // Scheduling errors (4xx)
    InvalidTaskType = 400,
    InvalidParameters = 401,
    TaskNotFound = 402,
    TaskNotPending = 403,
    TaskCancelled = 404,
    TaskTimeout = 405,
    ItemNotFound = 406,
    ItemInvalid = 407,

    // Aggregation and collaborator errors (5xx)
    AggregationFailure = 500,
    ValidationFailed = 501,
    ResearchFailed = 502,
    AgentNotFound = 503,
    PersonaInvalid = 504,

    // Internal errors (9xx)
    InternalError = 900,
    NotSupported = 902,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10, // Config errors
            200..=299 => 20, // IO errors
            300..=399 => 30, // Reasoning errors
            400..=499 => 40, // Scheduling errors
            500..=599 => 50, // Aggregation errors
            900..=999 => 90, // Internal errors
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for the reasoner
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Reasoning Errors
    // ─────────────────────────────────────────────────────────────

    /// Item classification outside the agent's coverage
    #[error("Domain gap: {classification} is outside the coverage of {agent}")]
    DomainGap { classification: String, agent: String },

    /// Required axis missing and unresolvable
    #[error("Missing required axis: {axis}")]
    AxisGap { axis: String },

    /// Algorithm id not registered
    #[error("Algorithm not found: {algorithm_id}")]
    AlgorithmNotFound { algorithm_id: String },

    /// Algorithm raised an error during execution
    #[error("Algorithm {algorithm_id} failed: {message}")]
    AlgorithmFailed { algorithm_id: String, message: String },

    /// Escalation needed but depth budget exhausted
    #[error("Recursion limit reached at depth {depth} (max {max_depth})")]
    RecursionLimitExceeded { depth: u32, max_depth: u32 },

    // ─────────────────────────────────────────────────────────────
    // Scheduling Errors
    // ─────────────────────────────────────────────────────────────

    /// Unknown task type name
    #[error("Invalid task type: {0}")]
    InvalidTaskType(String),

    /// Malformed task parameters
    #[error("Invalid task parameters: {message}")]
    InvalidParameters { message: String },

    /// Unknown task id
    #[error("Task not found: {task_id}")]
    TaskNotFound { task_id: String },

    /// Task was already picked up or finished
    #[error("Task {task_id} is not pending (status: {status})")]
    TaskNotPending { task_id: String, status: String },

    /// Task was cancelled by request
    #[error("Task {task_id} cancelled")]
    TaskCancelled { task_id: String },

    /// Task timeout
    #[error("Task {task_id} timed out after {timeout_secs}s")]
    TaskTimeout { task_id: String, timeout_secs: u64 },

    /// Item reference not present in the item store
    #[error("Item not found: {item_ref}")]
    ItemNotFound { item_ref: String },

    /// Item failed structural validation
    #[error("Invalid item {item_id}: {reason}")]
    ItemInvalid { item_id: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // Aggregation and Collaborator Errors
    // ─────────────────────────────────────────────────────────────

    /// Reasoning failure reported by an agent result
    #[error("{}: {}", .0.kind, .0.message)]
    Reasoning(ReasoningError),

    /// No usable member result to aggregate
    #[error("Aggregation failed: {0}")]
    AggregationFailure(String),

    /// Validation service failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Research source failure
    #[error("Research failed: {0}")]
    ResearchFailed(String),

    /// Persona agent lookup failed
    #[error("Agent not found: {name}")]
    AgentNotFound { name: String },

    /// Persona definition is malformed
    #[error("Invalid persona {name}: {reason}")]
    PersonaInvalid { name: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Feature not supported
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::Serialization,
            Error::Json(_) => ErrorCode::Serialization,

            Error::DomainGap { .. } => ErrorCode::DomainGap,
            Error::AxisGap { .. } => ErrorCode::AxisGap,
            Error::AlgorithmNotFound { .. } => ErrorCode::AlgorithmNotFound,
            Error::AlgorithmFailed { .. } => ErrorCode::AlgorithmFailure,
            Error::RecursionLimitExceeded { .. } => ErrorCode::RecursionLimit,
            Error::Reasoning(e) => e.kind.code(),

            Error::InvalidTaskType(_) => ErrorCode::InvalidTaskType,
            Error::InvalidParameters { .. } => ErrorCode::InvalidParameters,
            Error::TaskNotFound { .. } => ErrorCode::TaskNotFound,
            Error::TaskNotPending { .. } => ErrorCode::TaskNotPending,
            Error::TaskCancelled { .. } => ErrorCode::TaskCancelled,
            Error::TaskTimeout { .. } => ErrorCode::TaskTimeout,
            Error::ItemNotFound { .. } => ErrorCode::ItemNotFound,
            Error::ItemInvalid { .. } => ErrorCode::ItemInvalid,

            Error::AggregationFailure(_) => ErrorCode::AggregationFailure,
            Error::ValidationFailed(_) => ErrorCode::ValidationFailed,
            Error::ResearchFailed(_) => ErrorCode::ResearchFailed,
            Error::AgentNotFound { .. } => ErrorCode::AgentNotFound,
            Error::PersonaInvalid { .. } => ErrorCode::PersonaInvalid,

            Error::NotSupported(_) => ErrorCode::NotSupported,
            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::TaskTimeout { .. }
                | Error::AlgorithmFailed { .. }
                | Error::ValidationFailed(_)
                | Error::ResearchFailed(_)
                | Error::Io(_)
                | Error::IoRead { .. }
                | Error::IoWrite { .. }
        )
    }

    /// Check if the error is fatal (process should exit)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConfigNotFound { .. }
                | Error::ConfigParse { .. }
                | Error::ConfigValidation { .. }
                | Error::PersonaInvalid { .. }
                | Error::Internal(_)
        )
    }

    /// Check if the error is a caller mistake raised from schedule/run/cancel
    pub fn is_scheduling(&self) -> bool {
        (400..500).contains(&(self.code() as u16))
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'ukg-reasoner config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'ukg-reasoner config validate' to see details."
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration file and fix the invalid values."
            ),
            Error::AlgorithmNotFound { .. } => Some(
                "Run 'ukg-reasoner algorithms' to list the registered algorithm ids."
            ),
            Error::InvalidTaskType(_) => Some(
                "Valid task types are: ensemble, validation, research, analysis."
            ),
            Error::AgentNotFound { .. } => Some(
                "Run 'ukg-reasoner agents' to list the configured personas."
            ),
            Error::TaskTimeout { .. } => Some(
                "Increase 'task_timeout_secs' in the [tasks] section of the configuration."
            ),
            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let mut output = format!("\x1b[31mError [{}]\x1b[0m: {}\n", self.code().as_str(), self);

        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging and task records (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound {
            path: path.into(),
            source: None,
        }
    }

    /// Create a config parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Error::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config validation error
    pub fn config_validation(message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create an invalid parameters error
    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        Error::InvalidParameters {
            message: message.into(),
        }
    }

    /// Create an algorithm failure
    pub fn algorithm_failed(algorithm_id: impl Into<String>, message: impl Into<String>) -> Self {
        Error::AlgorithmFailed {
            algorithm_id: algorithm_id.into(),
            message: message.into(),
        }
    }

    /// Create a task not found error
    pub fn task_not_found(task_id: impl fmt::Display) -> Self {
        Error::TaskNotFound {
            task_id: task_id.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Reasoning Errors (result data)
// ─────────────────────────────────────────────────────────────────

/// Category of a reasoning failure recorded on a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningErrorKind {
    DomainGap,
    AxisGap,
    AlgorithmFailure,
    RecursionLimitExceeded,
}

impl ReasoningErrorKind {
    /// Matching numeric code
    pub fn code(&self) -> ErrorCode {
        match self {
            ReasoningErrorKind::DomainGap => ErrorCode::DomainGap,
            ReasoningErrorKind::AxisGap => ErrorCode::AxisGap,
            ReasoningErrorKind::AlgorithmFailure => ErrorCode::AlgorithmFailure,
            ReasoningErrorKind::RecursionLimitExceeded => ErrorCode::RecursionLimit,
        }
    }
}

impl fmt::Display for ReasoningErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReasoningErrorKind::DomainGap => "DomainGap",
            ReasoningErrorKind::AxisGap => "AxisGap",
            ReasoningErrorKind::AlgorithmFailure => "AlgorithmFailure",
            ReasoningErrorKind::RecursionLimitExceeded => "RecursionLimitExceeded",
        };
        f.write_str(name)
    }
}

/// Structured failure attached to a `ProcessResult` after all recovery attempts
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("[{}] {kind}: {message}", kind.code().as_str())]
pub struct ReasoningError {
    pub kind: ReasoningErrorKind,
    pub message: String,
}

impl ReasoningError {
    pub fn new(kind: ReasoningErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Convert a crate error raised during reasoning into result data
    pub fn from_error(error: &Error) -> Self {
        let kind = match error {
            Error::Reasoning(e) => return e.clone(),
            Error::DomainGap { .. } => ReasoningErrorKind::DomainGap,
            Error::AxisGap { .. } => ReasoningErrorKind::AxisGap,
            Error::RecursionLimitExceeded { .. } => ReasoningErrorKind::RecursionLimitExceeded,
            _ => ReasoningErrorKind::AlgorithmFailure,
        };
        Self::new(kind, error.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
