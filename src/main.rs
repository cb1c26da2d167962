// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LeyIA - legal assistant for your terminal
//!
//! Entry point for the LeyIA CLI application.

use std::io::Write;

use anyhow::Context;
use clap::Parser;

use leyia::cli::{ChatArgs, Cli, Commands, ExtractArgs};
use leyia::config::Settings;
use leyia::ingest::DocumentExtractor;

#[path = "main/repl.rs"]
mod repl;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `-v` raises the engine targets without requiring users to know their names.
    // `RUST_LOG` still takes precedence.
    let level = match cli.verbose {
        0 => None,
        1 => Some("debug"),
        _ => Some("trace"),
    };
    if let Some(level) = level {
        if let Ok(parsed) = format!("leyia={}", level).parse() {
            env_filter = env_filter.add_directive(parsed);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    // Load settings
    let settings = match cli.config {
        Some(ref path) => Settings::load_from(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => Settings::load().context("failed to load settings")?,
    };
    settings.validate()?;

    match cli.command {
        None => repl::run_chat(ChatArgs::default(), settings).await,
        Some(Commands::Chat(args)) => repl::run_chat(args, settings).await,
        Some(Commands::Extract(args)) => run_extract(args, settings).await,
    }
}

/// Run the ingestion pipeline on one file and print the text
async fn run_extract(args: ExtractArgs, settings: Settings) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(&args.path)
        .await
        .with_context(|| format!("failed to read {}", args.path.display()))?;
    let filename = args
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("path has no file name")?;

    let mut config = settings.ingestion;
    if args.no_ocr {
        config.enable_ocr = false;
    }
    let extractor = DocumentExtractor::new(config);

    let document = extractor
        .extract_text(&bytes, &filename, &|p| {
            eprint!("\rOCR: página {} de {}", p.page, p.total);
            let _ = std::io::stderr().flush();
        })
        .await?;
    if document.ocr_used {
        eprintln!();
    }

    println!("{}", document.text);
    Ok(())
}
