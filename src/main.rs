//! clonemap CLI entry point

use std::fs;
use std::io::Read;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use clonemap::cli::OutputFormat;
use clonemap::similarity::CancellationFlag;
use clonemap::{
    generate_suggestions, group_by_similarity, ingest_document, Cli, CloneMapError, Config,
    ScanReport,
};

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let mut config = Config::from_env();
    config.debug |= cli.debug;

    init_logging(config.debug);

    if cli.show_config {
        eprintln!("{:#?}", config);
    }

    match run(&cli, &config) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

/// Initialize tracing to stderr. Debug mode surfaces every per-layer
/// decision; otherwise only warnings get through unless RUST_LOG says
/// more.
fn init_logging(debug: bool) {
    let default_directive = if debug { "clonemap=debug" } else { "clonemap=warn" };
    let filter = EnvFilter::from_default_env()
        .add_directive(default_directive.parse().expect("valid directive"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: &Cli, config: &Config) -> clonemap::Result<String> {
    let raw = read_input(cli)?;

    let blocks = ingest_document(&raw, config)?;
    let groups = group_by_similarity(&blocks, config, &CancellationFlag::new())?;
    let suggestions = generate_suggestions(&groups);

    let report = ScanReport::new(blocks, groups, suggestions);
    let output = match cli.format {
        OutputFormat::Json => serde_json::to_string_pretty(&report),
        OutputFormat::Compact => serde_json::to_string(&report),
    }
    .map_err(|e| CloneMapError::SerializationFailure {
        message: e.to_string(),
    })?;

    Ok(output)
}

fn read_input(cli: &Cli) -> clonemap::Result<String> {
    match &cli.input {
        Some(path) => Ok(fs::read_to_string(path)?),
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}
