// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation engine
//!
//! This module drives chat sessions against the assistant service: session
//! state, turn orchestration, streaming, usage accounting and the background
//! tasks that run alongside turns.

pub mod background;
pub mod events;
pub mod orchestrator;
pub mod session;
pub mod state;
pub mod streaming;
pub mod usage;

pub use events::{EventEmitter, SessionEvent};
pub use session::{ChatSession, ChatSessionBuilder, SubmitOutcome};
pub use state::{ChatMessage, Role, SessionSnapshot, TurnOutcome};
pub use usage::{UsageAccountant, UsageStats};
