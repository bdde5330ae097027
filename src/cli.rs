//! CLI argument definitions using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Multi-layer duplicate code detector
#[derive(Parser, Debug)]
#[command(name = "clonemap")]
#[command(about = "Groups duplicated code patterns and emits consolidation suggestions")]
#[command(version)]
pub struct Cli {
    /// Read the input document from a file instead of standard input
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Output format for the report
    #[arg(short, long, default_value = "json", value_enum)]
    pub format: OutputFormat,

    /// Emit per-layer decision logs to standard error
    /// (equivalent to PIPELINE_DEBUG=1)
    #[arg(long)]
    pub debug: bool,

    /// Print the resolved configuration to standard error before running
    #[arg(long)]
    pub show_config: bool,
}

/// Output format options
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// Single-line JSON
    Compact,
}

impl Cli {
    /// Parse CLI arguments from the command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
