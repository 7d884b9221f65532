// Allow dead code for functions that are part of the API surface but not used in all code paths
#![allow(dead_code)]

use anyhow::Result;
use clap::Parser;
use ctrlc;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

mod cli;
mod config;
mod fetch;
mod retry;
mod payload;
mod mapper;
mod extractor;
mod classifier;
mod profile;
mod partial;
mod degrade;
mod record;
mod validate;
mod pipeline;
mod roster;
mod stats;
mod logger;
mod export;

use cli::Cli;
use config::AppConfig;
use fetch::HttpContentFetcher;
use logger::IngestLogger;
use pipeline::{BatchPipeline, PipelineOptions};
use record::EntityKind;
use roster::RosterEntry;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle --init flag first (before any other processing)
    if cli.init {
        match AppConfig::create_default_config() {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to customize settings, then run dexharvest again.");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    // Load configuration
    let mut config = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(config::ConfigError::FileNotFound(path)) => {
            // Config not found - prompt to create if interactive
            match AppConfig::prompt_create_config() {
                Ok(Some(created_path)) => {
                    println!(
                        "✅ Created default configuration file at: {}",
                        created_path.display()
                    );
                    println!("   Edit this file to customize settings, then run dexharvest again.");
                    std::process::exit(0);
                }
                Ok(None) => {
                    eprintln!("❌ Configuration file not found at: {}", path.display());
                    eprintln!("   Run with --init to create a default configuration file.");
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("❌ Failed to create configuration file: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let logger = IngestLogger::new(cli.verbosity());

    // Validate arguments
    if let Err(e) = cli.validate() {
        logger.error(&format!("Invalid arguments: {}", e));
        std::process::exit(1);
    }

    cli.apply_to(&mut config);

    // Set up Ctrl-C handling: the first signal asks the pipeline to stop
    // between entities so partial results can still be exported; a second
    // signal force-exits.
    let interrupt = Arc::new(AtomicBool::new(false));
    let interrupt_handle = interrupt.clone();
    ctrlc::set_handler(move || {
        if interrupt_handle.swap(true, Ordering::SeqCst) {
            eprintln!("\n⚠️  Force exiting without exporting results.");
            std::process::exit(130); // 130 = 128 + SIGINT(2), standard exit code for Ctrl-C
        }
        eprintln!("\n⚠️  Interrupt received. Finishing the current entity, then exporting partial results...");
    })
    .unwrap_or_else(|e| {
        eprintln!(
            "⚠️  Warning: Failed to set Ctrl-C handler: {}. Interrupt signals may not be handled gracefully.",
            e
        );
    });

    // Build the roster from --input or the single --id/--kind pair
    let (roster, source) = if let Some(input) = &cli.input {
        match roster::load_roster(Path::new(input)) {
            Ok(entries) => (entries, input.clone()),
            Err(e) => {
                logger.error(&format!("Failed to load roster: {}", e));
                std::process::exit(1);
            }
        }
    } else {
        let id = cli
            .id
            .as_ref()
            .expect("Entity id is required when not using --init or --input");
        let kind = cli
            .kind
            .as_deref()
            .and_then(EntityKind::from_label)
            .expect("A valid kind is required with --id");
        (vec![RosterEntry::new(id.clone(), kind)], format!("--id {}", id))
    };

    let output_file = export::output_file_for(&config.export.output, &config.export.format);

    let fetcher = match HttpContentFetcher::new(&config.api) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            logger.error(&format!("Failed to initialize HTTP client: {}", e));
            std::process::exit(1);
        }
    };

    logger.log_run_start(roster.len(), &source);

    let options = PipelineOptions::from_config(&config);
    let pipeline =
        BatchPipeline::new(fetcher, options, logger.clone()).with_interrupt(interrupt.clone());

    match pipeline.run(&roster).await {
        Ok(outcome) => {
            logger.log_export_start(&config.export.format);
            match config.export.format.as_str() {
                "csv" => export::export_csv(&outcome.successful, &output_file)?,
                _ => export::export_json(
                    &outcome.successful,
                    &outcome.failed,
                    &outcome.statistics,
                    &output_file,
                )?,
            }
            if !outcome.failed.is_empty() {
                let failures_file = export::failures_file_for(&output_file);
                export::export_failures_json(&outcome.failed, &failures_file)?;
            }
            logger.log_export_success(&output_file);

            logger.print_final_summary(&outcome, Some(&output_file));

            if outcome.interrupted {
                std::process::exit(130);
            }

            // Post-hoc floor: the run completed, but too little of it succeeded
            if outcome.statistics.success_rate < config.pipeline.min_success_rate {
                logger.error(&format!(
                    "Success rate {:.1}% is below the required minimum of {:.1}%",
                    outcome.statistics.success_rate * 100.0,
                    config.pipeline.min_success_rate * 100.0
                ));
                std::process::exit(1);
            }

            Ok(())
        }
        Err(abort) => {
            logger.print_abort_summary(&abort);
            std::process::exit(1);
        }
    }
}
