// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Token and cost accounting

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::{ModelPricing, Settings};
use crate::llm::assistant::Usage;

/// Last-turn and cumulative token counts with the estimated cost
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub last_input_tokens: u64,
    pub last_output_tokens: u64,
    pub last_total_tokens: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_tokens: u64,
    /// Estimated USD spent in the session
    pub cost_usd: f64,
}

impl UsageStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Prices usage against a per-model table
#[derive(Debug, Clone)]
pub struct UsageAccountant {
    pricing: HashMap<String, ModelPricing>,
    fallback_model: String,
}

impl UsageAccountant {
    pub fn new(pricing: HashMap<String, ModelPricing>, fallback_model: impl Into<String>) -> Self {
        Self {
            pricing,
            fallback_model: fallback_model.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.pricing.clone(),
            settings.assistant.default_model.clone(),
        )
    }

    /// Pricing row for `model`, the fallback model's row when unknown, free otherwise
    pub fn pricing_for(&self, model: &str) -> ModelPricing {
        self.pricing
            .get(model)
            .or_else(|| self.pricing.get(&self.fallback_model))
            .copied()
            .unwrap_or(ModelPricing {
                input_per_million: 0.0,
                output_per_million: 0.0,
            })
    }

    pub fn estimate_cost(&self, model: &str, usage: Usage) -> f64 {
        let price = self.pricing_for(model);
        (usage.input_tokens as f64 * price.input_per_million
            + usage.output_tokens as f64 * price.output_per_million)
            / 1_000_000.0
    }

    /// Record one turn's usage as the last turn and add it to the totals
    pub fn commit(&self, stats: &mut UsageStats, model: &str, usage: Usage) {
        stats.last_input_tokens = usage.input_tokens;
        stats.last_output_tokens = usage.output_tokens;
        stats.last_total_tokens = usage.total_tokens();
        stats.total_input_tokens += usage.input_tokens;
        stats.total_output_tokens += usage.output_tokens;
        stats.total_tokens += usage.total_tokens();
        stats.cost_usd += self.estimate_cost(model, usage);

        tracing::info!(
            target: "leyia.chat.usage",
            input = usage.input_tokens,
            output = usage.output_tokens,
            model,
            "usage applied"
        );
    }
}

/// Guards a turn so usage is committed at most once
#[derive(Debug, Default)]
pub struct TurnUsage {
    applied: bool,
}

impl TurnUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }

    /// Commit `usage` unless this turn already committed some. Returns whether it was applied.
    pub fn apply(
        &mut self,
        accountant: &UsageAccountant,
        stats: &mut UsageStats,
        model: &str,
        usage: Usage,
    ) -> bool {
        if self.applied {
            tracing::debug!(target: "leyia.chat.usage", "usage already applied for this turn");
            return false;
        }
        accountant.commit(stats, model, usage);
        self.applied = true;
        true
    }
}

/// Rough output-token estimate for streamed text (about 4 characters per token)
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() / 4) as u64
}
