//! High-level pipeline API: ingest, ask, apply, reparse.
//!
//! These functions are the library form of the interactive flow:
//!
//! 1. [`load_original`] parses the uploaded file for display.
//! 2. [`generate_pattern`] asks the inference service for a pattern.
//! 3. [`preview`] asks for a transformed sample.
//! 4. [`apply_prompt`] sends the original file, decodes the response
//!    envelope and reparses the processed file.
//!
//! # Example
//!
//! ```rust,ignore
//! use regex_assist::{apply_prompt, Settings, TransformClient, UploadedFile};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = TransformClient::new(&Settings::from_env()?)?;
//!     let file = UploadedFile::from_path(Path::new("customers.xlsx"))?;
//!     let outcome = apply_prompt(&client, &file, "redact email addresses").await?;
//!     println!("{} rows in {}", outcome.table.total_rows, outcome.filename);
//!     Ok(())
//! }
//! ```

use crate::api::logs::{log_info, log_success, log_warning};
use crate::client::TransformClient;
use crate::config::PATTERN_SAMPLE_ROWS;
use crate::envelope::decode;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{MatchStats, NormalizedTable, PatternDescriptor, PreviewResult, RegexInfo};
use crate::parser::{parse_file, UploadedFile};

/// Everything produced by one apply round trip.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    /// Name extracted from `Content-Disposition`.
    pub filename: String,
    /// Processed file bytes, as returned.
    pub payload: Vec<u8>,
    /// The processed file, normalized like any upload.
    pub table: NormalizedTable,
    pub regex_info: Option<RegexInfo>,
    pub match_stats: Option<MatchStats>,
}

/// Parse the user's file into the "original" table.
pub fn load_original(file: &UploadedFile) -> PipelineResult<NormalizedTable> {
    log_info(format!("Reading {} ({} bytes)", file.name, file.bytes.len()));

    let table = parse_file(file)?;
    if table.is_empty() {
        log_warning(format!("{} has no header row", file.name));
    } else {
        log_success(format!(
            "{} columns, {} rows",
            table.columns.len(),
            table.total_rows
        ));
    }
    Ok(table)
}

/// [`load_original`] on the blocking pool; hands the file back with its table.
pub async fn load_original_blocking(file: UploadedFile) -> PipelineResult<(UploadedFile, NormalizedTable)> {
    on_blocking_pool(file, load_original).await
}

/// Run a parse step on the blocking pool; workbooks can take a while to decode.
async fn on_blocking_pool<E>(
    file: UploadedFile,
    parse: fn(&UploadedFile) -> Result<NormalizedTable, E>,
) -> PipelineResult<(UploadedFile, NormalizedTable)>
where
    E: Into<PipelineError> + Send + 'static,
{
    let (file, table) = tokio::task::spawn_blocking(move || {
        let table = parse(&file);
        (file, table)
    })
    .await?;
    Ok((file, table.map_err(Into::<PipelineError>::into)?))
}

/// Ask for a pattern over `table`'s columns, sending a small row sample.
pub async fn generate_pattern(
    client: &TransformClient,
    prompt: &str,
    table: &NormalizedTable,
) -> PipelineResult<PatternDescriptor> {
    let prompt = non_empty_prompt(prompt)?;
    let schema = table.column_ids();
    let sample = &table.rows[..table.rows.len().min(PATTERN_SAMPLE_ROWS)];

    log_info(format!("Generating pattern from {} sample rows", sample.len()));
    let descriptor = client.infer_pattern(prompt, &schema, sample).await?;
    log_success(format!("Pattern: /{}/{}", descriptor.pattern, descriptor.flags));

    Ok(descriptor)
}

/// Transformed sample for a previously uploaded file.
pub async fn preview(
    client: &TransformClient,
    file_id: &str,
    descriptor: &PatternDescriptor,
) -> PipelineResult<PreviewResult> {
    Ok(client.preview_transform(file_id, descriptor).await?)
}

/// Send the original file with `prompt` and normalize what comes back.
///
/// An empty prompt is rejected before any remote call.
pub async fn apply_prompt(
    client: &TransformClient,
    file: &UploadedFile,
    prompt: &str,
) -> PipelineResult<ApplyOutcome> {
    let prompt = non_empty_prompt(prompt)?;

    log_info(format!("Applying instruction to {}", file.name));
    let envelope = client.get_results(file, prompt).await?;
    let decoded = decode(envelope);

    let regex_info = decoded.regex_info();
    let match_stats = decoded.match_stats();
    if regex_info.is_none() {
        log_warning("Response carried no pattern metadata");
    }

    let processed = decoded.into_file();
    log_info(format!("Reparsing {}", processed.name));
    let (processed, table) = on_blocking_pool(processed, parse_file).await?;

    if let Some(stats) = &match_stats {
        let total: u64 = stats.values().sum();
        log_success(format!("{} matches across {} columns", total, stats.len()));
    }

    Ok(ApplyOutcome {
        filename: processed.name,
        payload: processed.bytes,
        table,
        regex_info,
        match_stats,
    })
}

fn non_empty_prompt(prompt: &str) -> PipelineResult<&str> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(PipelineError::EmptyPrompt);
    }
    Ok(prompt)
}
