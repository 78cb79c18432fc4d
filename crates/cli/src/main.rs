//! Command-line driver: wires argument parsing to the `calasm` library's
//! pass driver, the way the rest of this pack's CLI front ends stay thin
//! wrappers over their library crate.

use std::fs::File;
use std::io::Read;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use calasm::lexer::{LexerConfig, SourceFormat};
use calasm::object::cos::DatasetWriter;
use calasm::textpath::TextPath;
use calasm::AssemblerState;

/// Assemble CAL source into a COS relocatable object file.
#[derive(Parser, Debug)]
#[command(name = "calasm", version, about)]
struct Cli {
    /// Source files to assemble, in order.
    #[arg(required = true)]
    sources: Vec<String>,

    /// Use old (fixed-column) source format instead of the default new
    /// (free-field) format.
    #[arg(short = 'i', long, conflicts_with = "new_format")]
    old_format: bool,

    /// Use new (free-field) source format. The default; accepted
    /// explicitly for symmetry with `-i`.
    #[arg(short = 'n', long)]
    new_format: bool,

    /// Enable flexible syntax (`label:` shorthand, local numeric
    /// labels).
    #[arg(short = 'f', long)]
    flexible: bool,

    /// Write a listing to this file.
    #[arg(short = 'l', long, value_name = "FILE")]
    listing: Option<String>,

    /// Write the object output to this file (default: first source
    /// file's name with a `.bin` extension).
    #[arg(short = 'o', long, value_name = "FILE")]
    output: Option<String>,

    /// Suppress listing lines that produced no diagnostic.
    #[arg(short = 's', long)]
    suppress_clean_lines: bool,

    /// Append a directory to the `TEXTPATH` search order.
    #[arg(short = 'T', long = "text-path", value_name = "DIR")]
    text_path_append: Vec<String>,

    /// Replace the whole `TEXTPATH` search order with a single
    /// directory.
    #[arg(short = 't', long = "text-path-only", value_name = "DIR")]
    text_path_only: Option<String>,

    /// Suppress warning-class diagnostics from the exit status.
    #[arg(short = 'w', long)]
    ignore_warnings: bool,

    /// Treat an otherwise-undefined name used only as a reference as an
    /// implicit external declaration instead of an error.
    #[arg(short = 'x', long)]
    implicit_externals: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let format = if cli.old_format { SourceFormat::Old } else { SourceFormat::New };
    let lexer_config = LexerConfig {
        format,
        flexible: cli.flexible,
        ..LexerConfig::default()
    };

    let mut text_path = TextPath::from_env(std::env::var("TEXTPATH").ok().as_deref());
    for dir in &cli.text_path_append {
        text_path.append(dir);
    }
    if let Some(dir) = &cli.text_path_only {
        text_path.replace(dir);
    }

    let mut state = AssemblerState::new(lexer_config, text_path);
    state.listing_enabled = cli.listing.is_some();
    state.implicit_externals = cli.implicit_externals;
    if cli.implicit_externals {
        info!("treating undefined reference-only names as implicit externals");
    }
    if cli.suppress_clean_lines {
        info!("listing will omit lines without a diagnostic");
    }

    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_name(&cli.sources[0]));
    let out_file = File::create(&output_path).with_context(|| format!("creating {output_path}"))?;
    let mut writer = DatasetWriter::new(out_file);

    for source_path in &cli.sources {
        info!("assembling {source_path}");
        let mut text = String::new();
        File::open(source_path)
            .with_context(|| format!("opening {source_path}"))?
            .read_to_string(&mut text)
            .with_context(|| format!("reading {source_path}"))?;
        calasm::assemble(&text, &mut state, &mut writer)
            .map_err(|e| anyhow::anyhow!("{source_path}: {e}"))?;
    }

    let errors = state.diagnostics.error_count();
    let warnings = state.diagnostics.warning_count();
    info!("{errors} errors, {warnings} warnings");

    let failing = errors > 0 || (!cli.ignore_warnings && warnings > 0);
    Ok(if failing { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn default_output_name(first_source: &str) -> String {
    match first_source.rsplit_once('.') {
        Some((stem, _)) => format!("{stem}.bin"),
        None => format!("{first_source}.bin"),
    }
}
