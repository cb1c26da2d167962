// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LeyIA - conversation engine for a legal assistant.
//!
//! This crate exposes the runtime used by the `leyia` CLI (`src/main.rs`)
//! and by any frontend that embeds a chat session.
//!
//! Architecture highlights:
//! - `chat`: session façade, turn orchestration, streaming, usage accounting
//!   and background tasks
//! - `llm`: assistant service abstraction, OpenAI Assistants v2 client and a
//!   scriptable mock
//! - `tools`: legal document and web search capabilities plus their dispatcher
//! - `ingest`: text extraction for uploads with an OCR fallback
//! - `files`: uploaded file handles and their lifecycle
//! - `config`: settings loaded from `~/.leyia/settings.json`

pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod files;
pub mod ingest;
pub mod llm;
pub mod tools;

pub use error::{LeyiaError, Result};
