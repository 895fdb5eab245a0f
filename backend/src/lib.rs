//! # Regex Assist - tabular ingestion and result normalization
//!
//! Regex Assist turns uploaded spreadsheets and delimited text files into a
//! canonical table, sends them to a remote pattern/transform service together
//! with a natural-language instruction, and normalizes what comes back.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ CSV / XLSX  │────▶│   Parser    │────▶│  Remote     │────▶│  Envelope   │
//! │  (any enc)  │     │ (hdr+names) │     │  transform  │     │  decoder    │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────┬──────┘
//!                            ▲                                       │
//!                            └──────────── processed file ───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use regex_assist::{parse_file, UploadedFile};
//!
//! let file = UploadedFile::new("people.csv", b"Name,E-mail\nJohn,j@x.com\n".to_vec());
//! let table = parse_file(&file).unwrap();
//! assert_eq!(table.column_ids(), vec!["Name", "Email"]);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Constants and environment settings
//! - [`models`] - Cells, rows, normalized tables, pattern metadata
//! - [`parser`] - Header detection, column sanitization, file parsing
//! - [`envelope`] - Processed-file response decoding
//! - [`client`] - Remote transform service client
//! - [`pipeline`] - Upload / pattern / apply orchestration
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Ingestion
pub mod parser;

// Results
pub mod envelope;

// Remote service
pub mod client;
pub mod pipeline;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, MetadataDecodeFailure, ParseError, ParseFailure, PipelineError, RemoteCallError,
    ServerError, TableError,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{Settings, PREVIEW_ROWS};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    CellValue, Column, MatchStats, NormalizedTable, PatternDescriptor, PreviewResult, RegexInfo,
    Row,
};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    parse_file, parse_file_with_limit, resolve_header_row, sanitize_column_names,
    sanitize_columns, FileKind, RawGrid, UploadedFile,
};

// =============================================================================
// Re-exports - Envelope
// =============================================================================

pub use envelope::{decode, extract_filename, DecodedEnvelope, ResponseEnvelope};

// =============================================================================
// Re-exports - Client & Pipeline
// =============================================================================

pub use client::TransformClient;
pub use pipeline::{
    apply_prompt, generate_pattern, load_original, load_original_blocking, preview, ApplyOutcome,
};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
