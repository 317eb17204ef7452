//! Error types for Prism.
//!
//! Errors are organized by concern (configuration, provider calls,
//! templating, persistence, evaluation) so callers can tell a bad config
//! apart from a flaky provider or a broken template.

use thiserror::Error;

/// Top-level error type for Prism operations.
#[derive(Error, Debug)]
pub enum PrismError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Provider call errors
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Prompt template errors
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Persistence errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Evaluation errors
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    /// A task name that is not configured
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    /// Input data is structurally unusable (missing columns, empty body)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// CSV import/export errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to parse JSON configuration
    #[error("Failed to parse JSON config: {0}")]
    JsonParseError(#[from] serde_json::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Errors produced by a single provider call.
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    /// The provider answered with a non-success HTTP status
    #[error("{provider} HTTP {status}: {message}")]
    Http {
        provider: String,
        status: u16,
        message: String,
    },

    /// Connection, DNS or other transport failure
    #[error("{provider} request failed: {message}")]
    Network { provider: String, message: String },

    /// The call did not finish in time
    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The response body could not be decoded
    #[error("Failed to parse {provider} response: {message}")]
    InvalidResponse { provider: String, message: String },

    /// The provider returned no text
    #[error("{provider} returned empty response")]
    EmptyResponse { provider: String },

    /// No API key configured for the provider
    #[error("{provider} API key not set. Set {env_var} env var.")]
    MissingApiKey { provider: String, env_var: String },

    /// Endpoint references an environment variable that is not set
    #[error("{provider} endpoint could not be resolved: {endpoint}")]
    UnresolvedEndpoint { provider: String, endpoint: String },

    /// Provider name is not one we know how to build
    #[error("Unknown LLM provider: {0}")]
    UnknownProvider(String),
}

/// Prompt template errors.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// The template body does not parse
    #[error("Invalid template '{name}': {message}")]
    Syntax { name: String, message: String },

    /// The context lacks values for some placeholders
    #[error("Missing placeholders for '{name}': {}", .missing.join(", "))]
    MissingPlaceholders { name: String, missing: Vec<String> },

    /// Rendering failed after parsing
    #[error("Failed to render '{name}': {message}")]
    Render { name: String, message: String },
}

/// Persistence errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failure
    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Database file or directory could not be created
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Lookup by key found nothing
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Stored value could not be interpreted
    #[error("Invalid stored value: {0}")]
    Invalid(String),
}

impl StoreError {
    /// Whether the error is a uniqueness or foreign key violation.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::Database(db)) => matches!(
                db.kind(),
                sqlx::error::ErrorKind::UniqueViolation
                    | sqlx::error::ErrorKind::ForeignKeyViolation
            ),
            _ => false,
        }
    }
}

/// LLM-as-judge errors.
#[derive(Error, Debug)]
pub enum EvaluationError {
    /// No judge provider configured
    #[error("No judge configured")]
    NoJudge,

    /// The judge call failed after retries
    #[error("Judge call failed after {attempts} attempt(s): {error}")]
    JudgeFailed { error: LlmError, attempts: u32 },

    /// Judge prompt could not be rendered
    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Convenience type alias for Prism results.
pub type Result<T> = std::result::Result<T, PrismError>;

/// Convenience type alias for store results.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
