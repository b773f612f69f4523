//! Error types for the ingest pipeline
//!
//! Only [`IngestError`] (and the [`SchemaError`] / [`ConfigError`] it wraps) is
//! fatal. Per-item problems never surface as errors from a cycle; they are
//! routed to the failure channel as a [`crate::batch::FailureCause`].

use thiserror::Error;

/// Result type alias for connector setup operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Schema text could not be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema text is empty")]
    Empty,

    #[error("empty column name in field {position}")]
    EmptyColumnName { position: usize },

    #[error("invalid data type \"{token}\" for column {column}")]
    InvalidDataType { column: String, token: String },

    #[error("primary key ordinal for column {column} exceeds 4294967295")]
    OrdinalOverflow { column: String },
}

/// Connector configuration is unusable
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Missing(&'static str),

    #[error("batch size must be a positive integer")]
    InvalidBatchSize,

    #[error("unknown time zone '{0}'")]
    InvalidTimeZone(String),

    #[error("username and password must be given together")]
    PartialCredentials,

    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: &'static str, message: String },
}

/// Errors reported by a sink collaborator
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("sink request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("sink rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("table '{0}' does not exist")]
    TableNotFound(String),

    #[error("table '{0}' already exists")]
    TableExists(String),

    #[error("invalid sink response: {0}")]
    InvalidResponse(String),

    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Fatal connector error
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Table '{table}' does not exist and no schema was configured to create it")]
    MissingSchema { table: String },

    #[error(transparent)]
    Common(#[from] attrload_common::CommonError),
}
