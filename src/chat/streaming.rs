// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Streaming response handling
//!
//! Content deltas are batched before they reach the visible message. A
//! batch is released when it is large enough, when enough time has passed
//! since the previous release, or when it contains a newline. Released
//! batches are always in arrival order; concatenating every batch plus the
//! final drain gives back the exact streamed text.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::StreamingConfig;

#[derive(Debug)]
pub struct FlushBuffer {
    pending: String,
    last_flush: Instant,
    min_chars: usize,
    min_interval: Duration,
}

impl FlushBuffer {
    pub fn new(min_chars: usize, min_interval: Duration, now: Instant) -> Self {
        Self {
            pending: String::new(),
            last_flush: now,
            min_chars,
            min_interval,
        }
    }

    pub fn from_config(config: &StreamingConfig, now: Instant) -> Self {
        Self::new(config.min_flush_chars, config.min_flush_interval(), now)
    }

    /// Add a delta. Returns the batch to display if a flush condition is met.
    pub fn push(&mut self, delta: &str, now: Instant) -> Option<String> {
        if delta.is_empty() {
            return None;
        }
        self.pending.push_str(delta);

        let due = self.pending.chars().count() >= self.min_chars
            || now.saturating_duration_since(self.last_flush) >= self.min_interval
            || delta.contains('\n');
        if !due {
            return None;
        }
        self.last_flush = now;
        Some(std::mem::take(&mut self.pending))
    }

    /// Release whatever is still buffered
    pub fn drain(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }
}
