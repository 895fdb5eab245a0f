//! Regex Assist CLI - parse tables and apply instructions from the shell
//!
//! # Main Commands
//!
//! ```bash
//! regex-assist serve                                  # Start HTTP server (port 3000)
//! regex-assist apply people.xlsx --prompt "redact emails" --save out.csv
//! regex-assist pattern people.csv --prompt "mask phone numbers"
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! regex-assist parse people.csv --rows 5              # Normalized table as JSON
//! regex-assist decode --disposition 'attachment; filename="processed.csv"' body.csv
//! ```

use clap::{Parser, Subcommand};
use regex_assist::api::ApplyResponse;
use regex_assist::{
    apply_prompt, decode, generate_pattern, load_original, parse_file, parse_file_with_limit,
    ResponseEnvelope, Settings, TransformClient, UploadedFile,
};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "regex-assist")]
#[command(about = "Normalize spreadsheets and apply natural-language pattern transformations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV or workbook and output the normalized table
    Parse {
        /// Input file
        input: PathBuf,

        /// Number of rows to keep (default: 20)
        #[arg(long)]
        rows: Option<usize>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Send a file and instruction to the transform service
    Apply {
        /// Input file
        input: PathBuf,

        /// Natural-language instruction
        #[arg(short, long)]
        prompt: String,

        /// Transform service base URL (overrides REGEX_ASSIST_API_BASE)
        #[arg(long)]
        api: Option<String>,

        /// Save the processed file as returned
        #[arg(long)]
        save: Option<PathBuf>,

        /// Output file for the processed table (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Infer a pattern for a file from an instruction
    Pattern {
        /// Input file
        input: PathBuf,

        /// Natural-language instruction
        #[arg(short, long)]
        prompt: String,

        /// Pattern service base URL (overrides REGEX_ASSIST_API_BASE)
        #[arg(long)]
        api: Option<String>,
    },

    /// Decode a saved processed-file response
    Decode {
        /// Saved response body
        payload: PathBuf,

        /// Raw Content-Disposition header value
        #[arg(long)]
        disposition: Option<String>,

        /// Raw X-Regex-Info header value
        #[arg(long)]
        regex_info: Option<String>,

        /// Raw X-Match-Stats header value
        #[arg(long)]
        match_stats: Option<String>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (overrides REGEX_ASSIST_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Transform service base URL (overrides REGEX_ASSIST_API_BASE)
        #[arg(long)]
        api: Option<String>,
    },
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse { input, rows, output } => cmd_parse(&input, rows, output.as_deref()),

        Commands::Apply {
            input,
            prompt,
            api,
            save,
            output,
        } => cmd_apply(&input, &prompt, api.as_deref(), save.as_deref(), output.as_deref()).await,

        Commands::Pattern { input, prompt, api } => cmd_pattern(&input, &prompt, api.as_deref()).await,

        Commands::Decode {
            payload,
            disposition,
            regex_info,
            match_stats,
        } => cmd_decode(&payload, disposition, regex_info, match_stats),

        Commands::Serve { port, api } => cmd_serve(port, api.as_deref()).await,
    };

    if let Err(e) = result {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn settings(api: Option<&str>) -> Result<Settings, Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    Ok(match api {
        Some(base) => settings.with_api_base(base),
        None => settings,
    })
}

fn cmd_parse(input: &Path, rows: Option<usize>, output: Option<&Path>) -> CliResult {
    let file = UploadedFile::from_path(input)?;
    let table = match rows {
        Some(limit) => parse_file_with_limit(&file, limit)?,
        None => parse_file(&file)?,
    };

    tracing::info!(
        columns = table.columns.len(),
        rows = table.rows.len(),
        total_rows = table.total_rows,
        "parsed {}",
        input.display()
    );

    write_output(&serde_json::to_string_pretty(&table)?, output)
}

async fn cmd_apply(
    input: &Path,
    prompt: &str,
    api: Option<&str>,
    save: Option<&Path>,
    output: Option<&Path>,
) -> CliResult {
    let client = TransformClient::new(&settings(api)?)?;
    let file = UploadedFile::from_path(input)?;

    let outcome = apply_prompt(&client, &file, prompt).await?;

    if let Some(path) = save {
        fs::write(path, &outcome.payload)?;
        tracing::info!("processed file saved to {}", path.display());
    }

    let response = ApplyResponse::from(outcome);
    write_output(&serde_json::to_string_pretty(&response)?, output)
}

async fn cmd_pattern(input: &Path, prompt: &str, api: Option<&str>) -> CliResult {
    let client = TransformClient::new(&settings(api)?)?;
    let file = UploadedFile::from_path(input)?;

    let table = load_original(&file)?;
    let descriptor = generate_pattern(&client, prompt, &table).await?;

    write_output(&serde_json::to_string_pretty(&descriptor)?, None)
}

fn cmd_decode(
    payload: &Path,
    disposition: Option<String>,
    regex_info: Option<String>,
    match_stats: Option<String>,
) -> CliResult {
    let mut envelope = ResponseEnvelope::new(fs::read(payload)?)
        .with_side_channel(regex_assist::config::REGEX_INFO_HEADER, regex_info)
        .with_side_channel(regex_assist::config::MATCH_STATS_HEADER, match_stats);
    if let Some(value) = disposition {
        envelope = envelope.with_content_disposition(value);
    }

    let decoded = decode(envelope);
    let regex_info = decoded.regex_info();
    let match_stats = decoded.match_stats();
    let file = decoded.into_file();
    let table = parse_file(&file)?;

    let report = json!({
        "filename": file.name,
        "regexInfo": regex_info,
        "matchStats": match_stats,
        "table": table,
    });
    write_output(&serde_json::to_string_pretty(&report)?, None)
}

async fn cmd_serve(port: Option<u16>, api: Option<&str>) -> CliResult {
    let mut settings = settings(api)?;
    if let Some(port) = port {
        settings.port = port;
    }
    regex_assist::server::start_server(settings).await
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            tracing::info!("output written to {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
