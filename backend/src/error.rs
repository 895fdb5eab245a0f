//! Error types for the ingestion and normalization pipeline.
//!
//! This module defines the error hierarchy shared by the parser, the
//! envelope decoder, the remote client and the HTTP layer:
//!
//! - [`ParseError`] - a file could not be decoded as the dispatched kind (hard)
//! - [`TableError`] - rows handed to [`crate::models::NormalizedTable::try_new`]
//!   violate the column key-set invariant
//! - [`RemoteCallError`] - a remote collaborator answered with a failure (hard)
//! - [`MetadataDecodeFailure`] - one side-channel field could not be decoded (soft)
//! - [`ConfigError`] - invalid environment configuration
//! - [`PipelineError`] - top-level orchestration errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Parse Errors
// =============================================================================

/// Why a byte stream could not be turned into a table.
#[derive(Debug, Error)]
pub enum ParseFailure {
    /// The bytes look like binary content rather than text.
    #[error("content is binary, not delimited text")]
    BinaryContent,

    /// The text is neither UTF-8 nor a supported legacy encoding.
    #[error("undecodable text (detected encoding: {0})")]
    Encoding(String),

    /// The delimited-text reader rejected a record.
    #[error("invalid delimited text: {0}")]
    Delimited(#[from] csv::Error),

    /// The workbook container or a worksheet could not be read.
    #[error("unreadable workbook: {0}")]
    Workbook(String),
}

/// A hard parse failure, carrying the file name it happened on.
#[derive(Debug, Error)]
#[error("Failed to parse '{filename}': {cause}")]
pub struct ParseError {
    /// Name of the file that failed.
    pub filename: String,
    /// Underlying cause.
    #[source]
    pub cause: ParseFailure,
}

impl ParseError {
    pub fn new(filename: impl Into<String>, cause: impl Into<ParseFailure>) -> Self {
        Self {
            filename: filename.into(),
            cause: cause.into(),
        }
    }
}

// =============================================================================
// Table Errors
// =============================================================================

/// Invariant violations when assembling a table from parts.
#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    /// Column id is empty or has characters outside `[A-Za-z0-9_]`.
    #[error("Invalid column id: '{0}'")]
    InvalidColumnId(String),

    /// Two columns share an id.
    #[error("Duplicate column id: '{0}'")]
    DuplicateColumnId(String),

    /// A row's keys differ from the column ids.
    #[error("Row {row_index} keys do not match the table columns")]
    RowKeyMismatch { row_index: usize },
}

// =============================================================================
// Remote Call Errors
// =============================================================================

/// Failures talking to the remote transform / pattern services.
#[derive(Debug, Error)]
pub enum RemoteCallError {
    /// The service answered with a non-success status.
    #[error("{operation} failed ({status}){}", .message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
    Status {
        operation: String,
        status: u16,
        message: Option<String>,
    },

    /// The request never got a usable response.
    #[error("{operation} request failed: {source}")]
    Transport {
        operation: String,
        #[source]
        source: reqwest::Error,
    },

    /// The success body did not have the expected shape.
    #[error("{operation} returned an invalid body: {message}")]
    InvalidBody { operation: String, message: String },
}

// =============================================================================
// Metadata Decode Failures (soft)
// =============================================================================

/// A side-channel field that failed structured decoding even after repair.
///
/// Never returned as an error: the decoder logs it and yields `None` for
/// that field only.
#[derive(Debug, Error)]
#[error("Side-channel field '{key}' is not valid JSON: {message}")]
pub struct MetadataDecodeFailure {
    pub key: String,
    pub message: String,
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Invalid environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level orchestration errors.
///
/// This is the error type returned by [`crate::pipeline::apply_prompt`] and
/// friends. It wraps all lower-level errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Parsing error.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Remote service error.
    #[error(transparent)]
    Remote(#[from] RemoteCallError),

    /// A parse running on the blocking pool panicked or was cancelled.
    #[error("Background parse failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Apply was requested without an instruction.
    #[error("Prompt is empty")]
    EmptyPrompt,
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for parse operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteCallError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
