// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mutable session state
//!
//! All session fields live in one [`SessionState`] behind a per-session
//! `tokio::sync::Mutex`. Callers take the lock for short, synchronous
//! updates only and release it before any network call.
//!
//! Turns are identified by a monotonically increasing id. A turn can be
//! finalized by the orchestrator, the thinking timer or a cancel request;
//! [`SessionState::finish_turn`] only succeeds for the active turn, so the
//! first finalizer wins and the others become no-ops.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::files::{FileHandle, FileRegistry};

use super::usage::UsageStats;

pub const GREETING: &str = "¡Hola! Soy LeyIA, tu Asistente Legal. Puedes hacerme una pregunta o subir un documento para analizarlo.";
pub const THINKING_PLACEHOLDER: &str = "Estoy pensando...";
pub const FAILURE_NOTICE: &str = "Repite la solicitud por favor.";
pub const TIMEOUT_NOTICE: &str = "Error: La respuesta tardó demasiado.";
pub const CANCELLED_NOTICE: &str = "Solicitud cancelada.";
pub const EMPTY_REPLY: &str = "Sin contenido.";

pub type SharedState = Arc<Mutex<SessionState>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl TurnOutcome {
    /// Text shown in place of the reply, given what was streamed so far
    pub fn final_text(self, streamed: &str) -> String {
        match self {
            TurnOutcome::Completed if streamed.trim().is_empty() => EMPTY_REPLY.to_string(),
            TurnOutcome::Completed => streamed.to_string(),
            TurnOutcome::Failed => FAILURE_NOTICE.to_string(),
            TurnOutcome::TimedOut => TIMEOUT_NOTICE.to_string(),
            TurnOutcome::Cancelled if streamed.trim().is_empty() => {
                CANCELLED_NOTICE.to_string()
            }
            TurnOutcome::Cancelled => streamed.to_string(),
        }
    }
}

/// Read-only copy of the observable session state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub messages: Vec<ChatMessage>,
    pub processing: bool,
    pub streaming: bool,
    pub uploading: bool,
    pub thinking_seconds: u64,
    pub approx_output_tokens: u64,
    pub usage: UsageStats,
    pub files: Vec<FileHandle>,
    pub thread_id: Option<String>,
    pub model_name: Option<String>,
}

#[derive(Debug)]
pub struct SessionState {
    pub messages: Vec<ChatMessage>,
    pub thread_id: Option<String>,
    pub run_id: Option<String>,
    pub processing: bool,
    pub streaming: bool,
    pub thinking_seconds: u64,
    /// Output-token estimate of the text streamed so far in the active turn
    pub approx_output_tokens: u64,
    pub usage: UsageStats,
    pub files: FileRegistry,
    /// Model behind the assistant, resolved once per session
    pub model_name: Option<String>,
    active_turn: Option<u64>,
    last_turn_id: u64,
    streamed: String,
    max_messages: usize,
}

impl SessionState {
    pub fn new(max_messages: usize, max_attachments: usize) -> Self {
        Self {
            messages: Vec::new(),
            thread_id: None,
            run_id: None,
            processing: false,
            streaming: false,
            thinking_seconds: 0,
            approx_output_tokens: 0,
            usage: UsageStats::default(),
            files: FileRegistry::new(max_attachments),
            model_name: None,
            active_turn: None,
            last_turn_id: 0,
            streamed: String::new(),
            max_messages: max_messages.max(1),
        }
    }

    pub fn shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }

    /// Append a message, dropping the oldest ones beyond the cap
    pub fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(..excess);
        }
    }

    /// Seed the greeting if the history is empty. Returns whether it was added.
    pub fn seed_greeting(&mut self) -> bool {
        if !self.messages.is_empty() {
            return false;
        }
        self.push_message(ChatMessage::assistant(GREETING));
        true
    }

    /// Start a turn for `text`. Returns `None` when busy or when `text` is blank.
    pub fn begin_turn(&mut self, text: &str) -> Option<u64> {
        let text = text.trim();
        if self.processing || text.is_empty() {
            return None;
        }
        self.last_turn_id += 1;
        self.active_turn = Some(self.last_turn_id);
        self.processing = true;
        self.streaming = true;
        self.thinking_seconds = 0;
        self.approx_output_tokens = 0;
        self.streamed.clear();
        self.run_id = None;
        self.push_message(ChatMessage::user(text));
        self.push_message(ChatMessage::assistant(THINKING_PLACEHOLDER));
        Some(self.last_turn_id)
    }

    pub fn active_turn(&self) -> Option<u64> {
        self.active_turn
    }

    pub fn is_active(&self, turn_id: u64) -> bool {
        self.active_turn == Some(turn_id)
    }

    /// Text flushed so far in the active turn
    pub fn streamed_text(&self) -> &str {
        &self.streamed
    }

    pub fn set_run_id(&mut self, turn_id: u64, run_id: &str) {
        if self.is_active(turn_id) {
            self.run_id = Some(run_id.to_string());
        }
    }

    /// Append a flushed chunk to the in-flight assistant message.
    /// Returns the full visible text, or `None` if the turn is no longer active.
    pub fn append_stream_text(&mut self, turn_id: u64, chunk: &str) -> Option<String> {
        if !self.is_active(turn_id) {
            return None;
        }
        self.streamed.push_str(chunk);
        self.approx_output_tokens = super::usage::estimate_tokens(&self.streamed);
        let content = self.streamed.clone();
        self.set_last_assistant(content.clone());
        Some(content)
    }

    /// Show a transient status (e.g. tool activity) while nothing has streamed yet
    pub fn show_status(&mut self, turn_id: u64, status: &str) {
        if self.is_active(turn_id) && self.streamed.is_empty() {
            self.set_last_assistant(status.to_string());
        }
    }

    /// Discard what the active turn has streamed and show the placeholder again
    pub fn restart_stream(&mut self, turn_id: u64) {
        if !self.is_active(turn_id) {
            return;
        }
        self.streamed.clear();
        self.approx_output_tokens = 0;
        self.run_id = None;
        self.set_last_assistant(THINKING_PLACEHOLDER.to_string());
    }

    /// Count one second of thinking. Returns the new count, or `None` if the turn ended.
    pub fn tick(&mut self, turn_id: u64) -> Option<u64> {
        if !self.is_active(turn_id) {
            return None;
        }
        self.thinking_seconds += 1;
        Some(self.thinking_seconds)
    }

    /// Finalize a turn: write its final text and clear every in-flight flag.
    /// Only the first call for the active turn has any effect.
    pub fn finish_turn(&mut self, turn_id: u64, outcome: TurnOutcome) -> bool {
        if !self.is_active(turn_id) {
            return false;
        }
        let text = outcome.final_text(&self.streamed);
        self.set_last_assistant(text);
        self.clear_turn_flags();
        true
    }

    /// Drop the active turn without touching the transcript
    pub fn abandon_turn(&mut self) -> Option<u64> {
        let turn = self.active_turn;
        self.clear_turn_flags();
        turn
    }

    /// Back to a fresh conversation: greeting only, no thread, zeroed usage
    pub fn reset(&mut self) {
        self.clear_turn_flags();
        self.messages.clear();
        self.thread_id = None;
        self.usage.reset();
        self.seed_greeting();
    }

    pub fn snapshot(&self, uploading: bool) -> SessionSnapshot {
        SessionSnapshot {
            messages: self.messages.clone(),
            processing: self.processing,
            streaming: self.streaming,
            uploading,
            thinking_seconds: self.thinking_seconds,
            approx_output_tokens: self.approx_output_tokens,
            usage: self.usage,
            files: self.files.uploaded().to_vec(),
            thread_id: self.thread_id.clone(),
            model_name: self.model_name.clone(),
        }
    }

    fn clear_turn_flags(&mut self) {
        self.active_turn = None;
        self.processing = false;
        self.streaming = false;
        self.run_id = None;
        self.thinking_seconds = 0;
        self.approx_output_tokens = 0;
        self.streamed.clear();
    }

    fn set_last_assistant(&mut self, content: String) {
        match self.messages.last_mut() {
            Some(last) if last.role == Role::Assistant => last.content = content,
            _ => self.push_message(ChatMessage::assistant(content)),
        }
    }
}
