//! Spritegen CLI - build SVG sprites from sprites.config.json
//!
//! Commands: build, targets
//! Progress goes to stderr; `--json` prints the report to stdout.
//! Exit codes: 0 ok, 1 configuration error, 2 a sprite failed.

use clap::{Parser, Subcommand};
use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt as tracing_fmt, prelude::*, EnvFilter};

use spritegen_core::{
    canonical_json,
    config::DEFAULT_CONFIG_FILE,
    SpriteConfig, SpritePipeline,
};

#[derive(Parser)]
#[command(name = "spritegen-cli")]
#[command(about = "Spritegen CLI - SVG sprite compiler")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Print a JSON report on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every sprite (default)
    Build {
        /// Compile without writing any file
        #[arg(long)]
        dry_run: bool,
    },

    /// List the sprites the config produces and where they go
    Targets,
}

fn init_tracing(verbose: bool) {
    let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(tracing_fmt::layer().with_target(verbose).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// The stdout payload for every fatal error under `--json`.
fn error_json(error: &dyn fmt::Display) -> Result<String, serde_json::Error> {
    canonical_json(&serde_json::json!({ "success": false, "error": error.to_string() }))
}

/// Report a fatal error; `--json` also gets it on stdout.
fn fail(json: bool, error: &dyn fmt::Display) -> ExitCode {
    error!("{error}");
    if json {
        match error_json(error) {
            Ok(out) => println!("{out}"),
            Err(e) => error!("Failed to serialize error: {e}"),
        }
    }
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match SpriteConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => return fail(cli.json, &e),
    };

    match cli.command.unwrap_or(Commands::Build { dry_run: false }) {
        Commands::Targets => {
            let plans = match SpritePipeline::plan(&config) {
                Ok(p) => p,
                Err(e) => return fail(cli.json, &e),
            };

            let summaries: Vec<_> = plans.iter().map(|p| p.summary()).collect();
            if cli.json {
                match canonical_json(&summaries) {
                    Ok(out) => println!("{out}"),
                    Err(e) => return fail(cli.json, &e),
                }
            } else {
                for s in &summaries {
                    println!("{}\t{}\t{}", s.name, s.output_path.display(), s.source);
                }
            }
            ExitCode::SUCCESS
        }

        Commands::Build { dry_run } => {
            let pipeline = SpritePipeline::from_config(&config).dry_run(dry_run);
            let report = match pipeline.run(&config) {
                Ok(r) => r,
                Err(e) => return fail(cli.json, &e),
            };

            if cli.json {
                match canonical_json(&report) {
                    Ok(out) => println!("{out}"),
                    Err(e) => error!("Failed to serialize report: {e}"),
                }
            }

            let skipped: usize = report.targets.iter().map(|t| t.failures.len()).sum();
            if skipped > 0 {
                warn!("{skipped} icon(s) skipped");
            }

            if report.has_failures() {
                error!("{} of {} sprite(s) failed", report.failed(), report.targets.len());
                ExitCode::from(2)
            } else {
                info!("{} sprite(s) done", report.targets.len());
                ExitCode::SUCCESS
            }
        }
    }
}
