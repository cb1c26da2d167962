// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session event channel
//!
//! Everything a frontend needs to render a session is published here as a
//! `{type, payload}` event. The engine itself never renders anything.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::files::FileHandle;

use super::state::{Role, TurnOutcome};
use super::usage::UsageStats;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A message was appended to the visible history
    MessageAppended { role: Role, content: String },
    /// The in-flight assistant message now reads `content`
    AssistantText { turn_id: u64, content: String },
    /// Tool activity for the in-flight turn
    ToolStatus { turn_id: u64, status: String },
    ThinkingTick { turn_id: u64, seconds: u64 },
    TurnFinished { turn_id: u64, outcome: TurnOutcome },
    UsageUpdated(UsageStats),
    /// OCR page progress for an upload
    UploadProgress {
        filename: String,
        page: usize,
        total: usize,
    },
    FilesChanged { files: Vec<FileHandle> },
    /// Something the user should know that is not part of the transcript
    Notice { message: String },
    SessionReset,
}

/// Broadcast sender shared by every component of a session
#[derive(Debug, Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<SessionEvent>,
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventEmitter {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: SessionEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!(target: "leyia.chat.session", "event dropped, no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_shape() {
        let event = SessionEvent::ToolStatus {
            turn_id: 3,
            status: "Buscando: 'tutela'...".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tool_status");
        assert_eq!(json["payload"]["turn_id"], 3);
        assert_eq!(json["payload"]["status"], "Buscando: 'tutela'...");

        let json = serde_json::to_value(SessionEvent::SessionReset).unwrap();
        assert_eq!(json["type"], "session_reset");
    }

    #[test]
    fn test_turn_finished_serializes_outcome() {
        let json = serde_json::to_value(SessionEvent::TurnFinished {
            turn_id: 1,
            outcome: TurnOutcome::TimedOut,
        })
        .unwrap();
        assert_eq!(json["payload"]["outcome"], "timed_out");
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_fine() {
        let emitter = EventEmitter::new();
        emitter.emit(SessionEvent::SessionReset);

        let mut rx = emitter.subscribe();
        emitter.emit(SessionEvent::Notice {
            message: "hola".to_string(),
        });
        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::Notice {
                message: "hola".to_string()
            }
        );
    }
}
