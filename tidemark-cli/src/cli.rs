//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Tidemark -- beacon lifecycle inspection tool.
///
/// Use `tidemark <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "tidemark", version, about, long_about = None)]
pub struct Cli {
    /// Path to the tidemark.toml configuration file.
    #[arg(short, long, global = true, default_value = "tidemark.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decode or build session cookie values.
    Cookie(CookieArgs),

    /// Compute the navigation hash of a URL.
    Hash(HashArgs),

    /// Compress or decompress error payloads.
    Errors(ErrorsArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- cookie ----

/// Decode or build session cookie values.
#[derive(Args, Debug)]
pub struct CookieArgs {
    #[command(subcommand)]
    pub action: CookieAction,
}

#[derive(Subcommand, Debug)]
pub enum CookieAction {
    /// Decode a session cookie value (e.g. `si*abc&ss*loyw3v28&sl*1&se*1e0`).
    Decode {
        /// Raw cookie value, with or without surrounding quotes.
        value: String,

        /// Evaluate expiry at this epoch-millisecond time (default: now).
        #[arg(long)]
        now_ms: Option<u64>,
    },
    /// Build a cookie value and the full cookie string for a session.
    Encode {
        /// Session start in epoch milliseconds (default: now).
        #[arg(long)]
        start_ms: Option<u64>,

        /// Number of beacons already sent in the session.
        #[arg(long, default_value_t = 0)]
        length: u32,

        /// Session identifier (default: a fresh random id).
        #[arg(long)]
        id: Option<String>,

        /// Page URL whose navigation hash is stored in the cookie.
        #[arg(long)]
        url: Option<String>,

        /// Add the `Secure` attribute.
        #[arg(long)]
        secure: bool,
    },
}

// ---- hash ----

/// Compute the navigation hash of a URL.
#[derive(Args, Debug)]
pub struct HashArgs {
    /// URL to hash.
    pub url: String,
}

// ---- errors ----

/// Compress or decompress error payloads.
#[derive(Args, Debug)]
pub struct ErrorsArgs {
    #[command(subcommand)]
    pub action: ErrorsAction,
}

#[derive(Subcommand, Debug)]
pub enum ErrorsAction {
    /// Compress a JSON array of error records into the `err` beacon value.
    Compress {
        /// JSON input, or `-` to read from stdin.
        input: String,
    },
    /// Decompress an `err` beacon value into error records.
    Decompress {
        /// Compressed value, or `-` to read from stdin.
        input: String,
    },
}

// ---- config ----

/// Manage tidemark configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, beacon, session, consent,
        /// resource_timing, errors, continuity, unload, early).
        #[arg(long)]
        section: Option<String>,
    },
}
