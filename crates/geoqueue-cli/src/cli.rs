//! CLI argument definitions for geoqueue.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `resolve` | Resolve one postal code or address |
//! | `batch` | Resolve every pending record of a JSON file |
//! | `providers` | Show the configured resolution chain |
//!
//! # Global Options
//!
//! Flags override the matching `GEOQUEUE_*` environment variables.
//!
//! | Option | Description |
//! |--------|-------------|
//! | `--providers` | Comma-separated resolution order |
//! | `--batch-size` | Items resolved concurrently per batch |
//! | `--delay-ms` | Pause between batches |
//! | `--timeout-ms` | Per-request timeout |
//! | `--max-attempts` | Attempts per request, first one included |
//! | `--pretty` | Pretty-print JSON output |
//! | `--log-json` | Emit logs as JSON on stderr |
//!
//! # Examples
//!
//! ```bash
//! geoqueue resolve 01310-100 --pretty
//! geoqueue resolve --street "Av. Paulista, 1578" --locality "São Paulo" --region SP
//! geoqueue batch --input customers.json --output geocoded.json
//! geoqueue --providers awesomeapi,nominatim providers
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Postal-code geocoding over free-tier providers.
#[derive(Debug, Parser)]
#[command(name = "geoqueue", author, version, about = "Postal-code geocoding over free-tier providers")]
pub struct Cli {
    /// Comma-separated provider order, e.g. `viacep_nominatim,awesomeapi`.
    #[arg(long, global = true)]
    pub providers: Option<String>,

    /// Items resolved concurrently per batch.
    #[arg(long, global = true)]
    pub batch_size: Option<usize>,

    /// Pause between batches in milliseconds.
    #[arg(long, global = true)]
    pub delay_ms: Option<u64>,

    /// Per-request timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Attempts per HTTP request, the first one included.
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,

    /// Accept coordinates outside Brazil.
    #[arg(long, global = true, default_value_t = false)]
    pub allow_outside_brazil: bool,

    /// Pretty-print JSON output.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve one postal code or free-text address.
    Resolve(ResolveArgs),
    /// Resolve every record of a JSON file that still lacks coordinates.
    Batch(BatchArgs),
    /// Show the resolution chain built from the current configuration.
    Providers,
}

#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Postal code (CEP), with or without the hyphen.
    pub postal_code: Option<String>,

    #[arg(long)]
    pub street: Option<String>,

    #[arg(long)]
    pub neighborhood: Option<String>,

    /// City.
    #[arg(long)]
    pub locality: Option<String>,

    /// State abbreviation.
    #[arg(long)]
    pub region: Option<String>,
}

#[derive(Debug, Args)]
pub struct BatchArgs {
    /// JSON array of records.
    #[arg(long)]
    pub input: PathBuf,

    /// Where to write updated records; defaults to the input file.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Resolve without writing anything back.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}
