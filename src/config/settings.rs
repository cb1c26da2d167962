// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for LeyIA
//!
//! Handles loading and saving settings from ~/.leyia/settings.json

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

mod io;
mod validation;

/// Main settings structure, stored in ~/.leyia/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Assistant service credentials and identity
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Streaming flush policy and visible history limits
    #[serde(default)]
    pub streaming: StreamingConfig,

    /// Turn, run and tool time limits
    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// Uploaded file lifecycle policy
    #[serde(default)]
    pub files: FilesConfig,

    /// Document ingestion and OCR settings
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// External search capability used by the tools
    #[serde(default)]
    pub search: SearchConfig,

    /// USD price per million tokens, keyed by model name
    #[serde(default = "default_pricing")]
    pub pricing: HashMap<String, ModelPricing>,
}

/// Assistant service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_assistant_api_key_env")]
    pub api_key_env: String,

    /// Assistant identifier (if stored directly)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,

    /// Environment variable name for the assistant identifier
    #[serde(default = "default_assistant_id_env")]
    pub assistant_id_env: String,

    /// Base URL for API (for custom endpoints)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model assumed when the assistant's model cannot be looked up
    #[serde(default = "default_model")]
    pub default_model: String,
}

/// Streaming update policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Buffered characters that force a flush into the visible message
    #[serde(default = "default_min_flush_chars")]
    pub min_flush_chars: usize,

    /// Minimum time between flushes in milliseconds
    #[serde(default = "default_min_flush_interval_ms")]
    pub min_flush_interval_ms: u64,

    /// Visible history cap (oldest messages are dropped first)
    #[serde(default = "default_max_chat_messages")]
    pub max_chat_messages: usize,
}

/// Time limits for a turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Maximum wait for the run stream to open
    #[serde(default = "default_run_create_secs")]
    pub run_create_secs: u64,

    /// Ceiling for a whole turn, enforced by the thinking timer
    #[serde(default = "default_turn_secs")]
    pub turn_secs: u64,

    /// Per tool call limit
    #[serde(default = "default_tool_call_secs")]
    pub tool_call_secs: u64,

    /// Limit for the best-effort remote run cancellation
    #[serde(default = "default_remote_cancel_secs")]
    pub remote_cancel_secs: u64,
}

/// Uploaded file lifecycle policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Most recent uploads attached to each outgoing message
    #[serde(default = "default_max_attachments")]
    pub max_attachments: usize,

    /// Age after which the reaper deletes a handle
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,

    /// Interval between remote thread health checks
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,

    /// Interval between age-based reaper sweeps
    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,
}

/// Document ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Whether scanned PDFs fall back to OCR
    #[serde(default = "default_true")]
    pub enable_ocr: bool,

    /// Direct PDF extraction below this many characters triggers OCR
    #[serde(default = "default_min_pdf_text_chars")]
    pub min_pdf_text_chars: usize,

    /// Maximum pages recognized per document
    #[serde(default = "default_ocr_max_pages")]
    pub ocr_max_pages: usize,

    /// Rasterization resolution
    #[serde(default = "default_ocr_dpi")]
    pub ocr_dpi: u32,

    /// Recognition language hint
    #[serde(default = "default_ocr_language")]
    pub ocr_language: String,

    /// Path of the `pdfinfo` binary
    #[serde(default = "default_pdfinfo_path")]
    pub pdfinfo_path: String,

    /// Path of the `pdftoppm` binary
    #[serde(default = "default_pdftoppm_path")]
    pub pdftoppm_path: String,

    /// Path of the `tesseract` binary
    #[serde(default = "default_tesseract_path")]
    pub tesseract_path: String,
}

/// Search capability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_search_api_key_env")]
    pub api_key_env: String,

    /// Base URL for the search endpoint
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Results returned per query
    #[serde(default = "default_search_max_results")]
    pub max_results: usize,

    /// Snippet length cap in characters
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,

    /// HTTP timeout for a single search
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

/// Price of a model in USD per million tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_assistant_api_key_env(),
            assistant_id: None,
            assistant_id_env: default_assistant_id_env(),
            base_url: None,
            default_model: default_model(),
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            min_flush_chars: default_min_flush_chars(),
            min_flush_interval_ms: default_min_flush_interval_ms(),
            max_chat_messages: default_max_chat_messages(),
        }
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            run_create_secs: default_run_create_secs(),
            turn_secs: default_turn_secs(),
            tool_call_secs: default_tool_call_secs(),
            remote_cancel_secs: default_remote_cancel_secs(),
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            max_attachments: default_max_attachments(),
            max_age_secs: default_max_age_secs(),
            health_check_interval_secs: default_health_check_interval_secs(),
            reaper_interval_secs: default_reaper_interval_secs(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            enable_ocr: true,
            min_pdf_text_chars: default_min_pdf_text_chars(),
            ocr_max_pages: default_ocr_max_pages(),
            ocr_dpi: default_ocr_dpi(),
            ocr_language: default_ocr_language(),
            pdfinfo_path: default_pdfinfo_path(),
            pdftoppm_path: default_pdftoppm_path(),
            tesseract_path: default_tesseract_path(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_search_api_key_env(),
            base_url: default_search_base_url(),
            max_results: default_search_max_results(),
            snippet_chars: default_snippet_chars(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

impl StreamingConfig {
    /// Minimum interval between flushes.
    pub fn min_flush_interval(&self) -> Duration {
        Duration::from_millis(self.min_flush_interval_ms)
    }
}

impl TimeoutsConfig {
    pub fn run_create(&self) -> Duration {
        Duration::from_secs(self.run_create_secs)
    }

    pub fn turn(&self) -> Duration {
        Duration::from_secs(self.turn_secs)
    }

    pub fn tool_call(&self) -> Duration {
        Duration::from_secs(self.tool_call_secs)
    }

    pub fn remote_cancel(&self) -> Duration {
        Duration::from_secs(self.remote_cancel_secs)
    }
}

impl FilesConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_assistant_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_assistant_id_env() -> String {
    "ASSISTANT_ID_CONSTITUCIONAL".to_string()
}

pub(crate) fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_min_flush_chars() -> usize {
    120
}

fn default_min_flush_interval_ms() -> u64 {
    150
}

fn default_max_chat_messages() -> usize {
    80
}

fn default_run_create_secs() -> u64 {
    300
}

fn default_turn_secs() -> u64 {
    600
}

fn default_tool_call_secs() -> u64 {
    120
}

fn default_remote_cancel_secs() -> u64 {
    10
}

fn default_max_attachments() -> usize {
    3
}

fn default_max_age_secs() -> u64 {
    7200
}

fn default_health_check_interval_secs() -> u64 {
    300
}

fn default_reaper_interval_secs() -> u64 {
    3600
}

fn default_min_pdf_text_chars() -> usize {
    100
}

fn default_ocr_max_pages() -> usize {
    100
}

fn default_ocr_dpi() -> u32 {
    200
}

fn default_ocr_language() -> String {
    "spa+eng".to_string()
}

fn default_pdfinfo_path() -> String {
    "pdfinfo".to_string()
}

fn default_pdftoppm_path() -> String {
    "pdftoppm".to_string()
}

fn default_tesseract_path() -> String {
    "tesseract".to_string()
}

fn default_search_api_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_search_base_url() -> String {
    "https://api.tavily.com/search".to_string()
}

fn default_search_max_results() -> usize {
    5
}

fn default_snippet_chars() -> usize {
    2000
}

fn default_search_timeout_secs() -> u64 {
    30
}

pub(crate) fn default_pricing() -> HashMap<String, ModelPricing> {
    let rows = [
        ("gpt-4o", 5.00, 15.00),
        ("gpt-4o-mini", 0.150, 0.600),
        ("gpt-4.1", 5.00, 15.00),
        ("gpt-4.1-mini", 2.400, 3.600),
        ("gpt-4-turbo", 10.00, 30.00),
        ("gpt-3.5-turbo", 0.50, 1.50),
    ];
    rows.into_iter()
        .map(|(model, input, output)| {
            (
                model.to_string(),
                ModelPricing {
                    input_per_million: input,
                    output_per_million: output,
                },
            )
        })
        .collect()
}
