//! Error types for the sales pipeline.

use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A source resource (file, object, in-memory table) does not exist.
    #[error("source table '{table}' not found: {location}")]
    NotFound { table: String, location: String },

    /// A required column is absent from a table.
    #[error("table '{table}' is missing required column '{column}'")]
    Schema { table: String, column: String },

    /// A value could not be coerced to the type its column requires.
    #[error("table '{table}' row {row}: cannot convert {column} value '{value}': {reason}")]
    TypeConversion {
        table: String,
        column: String,
        row: usize,
        value: String,
        reason: String,
    },

    /// A required value is null.
    #[error("table '{table}' row {row}: required column '{column}' is empty")]
    MissingValue {
        table: String,
        column: String,
        row: usize,
    },

    /// A sale date does not match any accepted date shape.
    #[error("sale '{sale_id}': cannot parse sale date '{value}'")]
    DateParse { sale_id: String, value: String },

    /// A source table has zero rows.
    #[error("source table '{table}' is empty")]
    EmptySource { table: String },

    /// A key that must be unique appears more than once.
    #[error("table '{table}' has duplicate key '{key}'")]
    DuplicateKey { table: String, key: String },

    /// Post-load validation failed.
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    /// The table store rejected an operation.
    #[error("storage error on table '{table}': {message}")]
    Storage { table: String, message: String },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A stage asked for an artifact no upstream stage produced.
    #[error("stage '{stage}' requires artifact '{artifact}' which was not produced")]
    MissingArtifact { stage: String, artifact: String },

    /// Stage graph is malformed.
    #[error("invalid stage graph: {0}")]
    Graph(String),

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn storage(table: &str, message: impl ToString) -> Self {
        PipelineError::Storage {
            table: table.to_string(),
            message: message.to_string(),
        }
    }

    pub fn schema(table: &str, column: &str) -> Self {
        PipelineError::Schema {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    /// Short machine-readable name of the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::NotFound { .. } => "not_found",
            PipelineError::Schema { .. } => "schema",
            PipelineError::TypeConversion { .. } => "type_conversion",
            PipelineError::MissingValue { .. } => "missing_value",
            PipelineError::DateParse { .. } => "date_parse",
            PipelineError::EmptySource { .. } => "empty_source",
            PipelineError::DuplicateKey { .. } => "duplicate_key",
            PipelineError::Validation { .. } => "validation",
            PipelineError::Storage { .. } => "storage",
            PipelineError::Config(_) => "config",
            PipelineError::MissingArtifact { .. } => "missing_artifact",
            PipelineError::Graph(_) => "graph",
            PipelineError::Polars(_) => "polars",
            PipelineError::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
