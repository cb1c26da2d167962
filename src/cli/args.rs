// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap
//!
//! Defines all command-line arguments and subcommands for LeyIA.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// LeyIA - legal assistant for your terminal
#[derive(Parser, Debug)]
#[command(name = "leyia")]
#[command(version, about = "Legal assistant backed by an OpenAI assistant")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start interactive chat session (default when no command given)
    Chat(ChatArgs),

    /// Extract the text of a document and print it
    Extract(ExtractArgs),
}

/// Arguments for the chat subcommand
#[derive(clap::Args, Debug, Default)]
pub struct ChatArgs {
    /// Initial prompt (optional)
    pub prompt: Option<String>,

    /// Documents to upload before the first prompt
    #[arg(short, long, num_args = 1..)]
    pub file: Vec<PathBuf>,

    /// Assistant id (overrides settings and environment)
    #[arg(long)]
    pub assistant: Option<String>,
}

/// Arguments for the extract subcommand
#[derive(clap::Args, Debug)]
pub struct ExtractArgs {
    /// Document to extract (.txt, .docx or .pdf)
    pub path: PathBuf,

    /// Skip the OCR fallback for scanned PDFs
    #[arg(long)]
    pub no_ocr: bool,
}
