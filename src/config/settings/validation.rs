// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{LeyiaError, Result};

use super::{ModelPricing, Settings};

impl Settings {
    /// Get the assistant service API key, checking env var first.
    pub fn get_assistant_api_key(&self) -> Option<String> {
        // Priority: env var > config file.
        non_empty_env(&self.assistant.api_key_env).or_else(|| self.assistant.api_key.clone())
    }

    /// Get the assistant identifier, checking env var first.
    pub fn get_assistant_id(&self) -> Option<String> {
        non_empty_env(&self.assistant.assistant_id_env)
            .or_else(|| self.assistant.assistant_id.clone())
    }

    /// Get the search API key, checking env var first.
    pub fn get_search_api_key(&self) -> Option<String> {
        non_empty_env(&self.search.api_key_env).or_else(|| self.search.api_key.clone())
    }

    /// Pricing for a model, falling back to the default model's row.
    pub fn pricing_for(&self, model: &str) -> Option<ModelPricing> {
        self.pricing
            .get(model)
            .or_else(|| self.pricing.get(&self.assistant.default_model))
            .copied()
    }

    /// Reject values that would stall or disable the engine.
    pub fn validate(&self) -> Result<()> {
        let zero_checks: [(&str, u64); 8] = [
            ("streaming.min_flush_chars", self.streaming.min_flush_chars as u64),
            ("streaming.max_chat_messages", self.streaming.max_chat_messages as u64),
            ("timeouts.run_create_secs", self.timeouts.run_create_secs),
            ("timeouts.turn_secs", self.timeouts.turn_secs),
            ("timeouts.tool_call_secs", self.timeouts.tool_call_secs),
            ("files.max_attachments", self.files.max_attachments as u64),
            ("files.health_check_interval_secs", self.files.health_check_interval_secs),
            ("files.reaper_interval_secs", self.files.reaper_interval_secs),
        ];
        for (name, value) in zero_checks {
            if value == 0 {
                return Err(LeyiaError::Config(format!("{} must be greater than zero", name)));
            }
        }
        if self.ingestion.enable_ocr && self.ingestion.ocr_max_pages == 0 {
            return Err(LeyiaError::Config(
                "ingestion.ocr_max_pages must be greater than zero when OCR is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
