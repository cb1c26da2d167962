// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat session management
//!
//! [`ChatSession`] is the façade a frontend talks to. It owns the session
//! state, starts turns and their thinking timers, exposes cancellation and
//! file management, and publishes everything observable as
//! [`SessionEvent`]s.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::error::{LeyiaError, Result};
use crate::files::{FileHandle, FileLifecycleManager};
use crate::ingest::DocumentExtractor;
use crate::llm::assistant::{AssistantService, FileStore};
use crate::tools::{SearchBackend, ToolDispatcher};

use super::background::{
    cancel_remote_run, spawn_health_monitor, spawn_thinking_timer, spawn_timestamp_reaper,
    BackgroundTask,
};
use super::events::{EventEmitter, SessionEvent};
use super::orchestrator::{OrchestratorConfig, TurnOrchestrator};
use super::state::{
    ChatMessage, Role, SessionSnapshot, SessionState, SharedState, TurnOutcome, GREETING,
    THINKING_PLACEHOLDER,
};
use super::usage::UsageAccountant;

/// Result of [`ChatSession::submit_message`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A turn was started
    Accepted { turn_id: u64 },
    /// A turn is already in flight; nothing changed
    Busy,
    /// The message was blank; nothing changed
    Empty,
}

struct ActiveTurn {
    turn_id: u64,
    token: CancellationToken,
    task: Option<JoinHandle<Option<TurnOutcome>>>,
    timer: Option<BackgroundTask>,
}

/// Builder for creating ChatSession instances
pub struct ChatSessionBuilder {
    settings: Settings,
    assistant: Option<Arc<dyn AssistantService>>,
    file_store: Option<Arc<dyn FileStore>>,
    search: Option<Arc<dyn SearchBackend>>,
    extractor: Option<Arc<DocumentExtractor>>,
    assistant_id: Option<String>,
}

impl ChatSessionBuilder {
    /// Create a new builder with settings
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            assistant: None,
            file_store: None,
            search: None,
            extractor: None,
            assistant_id: None,
        }
    }

    /// Set the assistant service
    pub fn with_assistant(mut self, assistant: Arc<dyn AssistantService>) -> Self {
        self.assistant = Some(assistant);
        self
    }

    /// Set the store uploads are sent to
    pub fn with_file_store(mut self, store: Arc<dyn FileStore>) -> Self {
        self.file_store = Some(store);
        self
    }

    /// Set the backend behind the search tools
    pub fn with_search_backend(mut self, backend: Arc<dyn SearchBackend>) -> Self {
        self.search = Some(backend);
        self
    }

    /// Replace the default document extractor
    pub fn with_extractor(mut self, extractor: Arc<DocumentExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Override the assistant id from settings
    pub fn with_assistant_id(mut self, id: impl Into<String>) -> Self {
        self.assistant_id = Some(id.into());
        self
    }

    /// Build the ChatSession
    pub fn build(self) -> Result<ChatSession> {
        self.settings.validate()?;

        let assistant = self
            .assistant
            .ok_or_else(|| LeyiaError::Config("No assistant service set".into()))?;
        let file_store = self
            .file_store
            .ok_or_else(|| LeyiaError::Config("No file store set".into()))?;
        let assistant_id = self
            .assistant_id
            .or_else(|| self.settings.get_assistant_id())
            .ok_or_else(|| {
                LeyiaError::Config(format!(
                    "No assistant id configured (set {})",
                    self.settings.assistant.assistant_id_env
                ))
            })?;
        let extractor = self
            .extractor
            .unwrap_or_else(|| Arc::new(DocumentExtractor::new(self.settings.ingestion.clone())));

        if self.search.is_none() {
            tracing::warn!(target: "leyia.chat.session", "no search backend, search tools will report an error");
        }

        let state = SessionState::new(
            self.settings.streaming.max_chat_messages,
            self.settings.files.max_attachments,
        )
        .shared();
        let events = EventEmitter::new();

        let files = Arc::new(FileLifecycleManager::new(
            file_store,
            extractor,
            state.clone(),
            events.clone(),
            self.settings.files.max_age(),
        ));
        let dispatcher = Arc::new(ToolDispatcher::with_builtins(
            self.search,
            &self.settings.search,
            self.settings.timeouts.tool_call(),
        ));
        let orchestrator = Arc::new(TurnOrchestrator::new(
            Arc::clone(&assistant),
            dispatcher,
            Arc::clone(&files),
            UsageAccountant::from_settings(&self.settings),
            state.clone(),
            events.clone(),
            OrchestratorConfig::from_settings(&self.settings, assistant_id),
        ));

        Ok(ChatSession {
            state,
            events,
            assistant,
            files,
            orchestrator,
            settings: self.settings,
            turn: Mutex::new(None),
            monitors: Mutex::new(Vec::new()),
            root: CancellationToken::new(),
        })
    }
}

/// One conversation with the legal assistant
pub struct ChatSession {
    state: SharedState,
    events: EventEmitter,
    assistant: Arc<dyn AssistantService>,
    files: Arc<FileLifecycleManager>,
    orchestrator: Arc<TurnOrchestrator>,
    settings: Settings,
    turn: Mutex<Option<ActiveTurn>>,
    monitors: Mutex<Vec<BackgroundTask>>,
    root: CancellationToken,
}

impl ChatSession {
    /// Create a builder for constructing a ChatSession
    pub fn builder(settings: Settings) -> ChatSessionBuilder {
        ChatSessionBuilder::new(settings)
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Seed the greeting and start the session monitors if they are not running
    pub async fn initialize(&self) {
        if self.state.lock().await.seed_greeting() {
            self.events.emit(SessionEvent::MessageAppended {
                role: Role::Assistant,
                content: GREETING.to_string(),
            });
        }
        self.start_monitors().await;
    }

    async fn start_monitors(&self) {
        let mut monitors = self.monitors.lock().await;
        monitors.retain(|task| !task.is_finished());
        if !monitors.is_empty() {
            return;
        }
        monitors.push(spawn_health_monitor(
            self.state.clone(),
            Arc::clone(&self.assistant),
            Arc::clone(&self.files),
            self.settings.files.health_check_interval(),
            self.root.child_token(),
        ));
        monitors.push(spawn_timestamp_reaper(
            Arc::clone(&self.files),
            self.settings.files.reaper_interval(),
            self.root.child_token(),
        ));
    }

    async fn stop_monitors(&self) {
        let monitors = std::mem::take(&mut *self.monitors.lock().await);
        for task in monitors {
            task.shutdown().await;
        }
    }

    /// Start a turn for `text` unless one is already in flight or `text` is blank
    pub async fn submit_message(&self, text: &str) -> SubmitOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SubmitOutcome::Empty;
        }

        // Held until the slot is filled so a cancel racing this submit
        // always finds the new turn's token
        let mut slot = self.turn.lock().await;
        let Some(turn_id) = self.state.lock().await.begin_turn(text) else {
            tracing::debug!(target: "leyia.chat.session", "turn in progress, message ignored");
            return SubmitOutcome::Busy;
        };

        tracing::info!(target: "leyia.chat.session", turn_id, "turn started");
        self.events.emit(SessionEvent::MessageAppended {
            role: Role::User,
            content: text.to_string(),
        });
        self.events.emit(SessionEvent::MessageAppended {
            role: Role::Assistant,
            content: THINKING_PLACEHOLDER.to_string(),
        });

        let token = self.root.child_token();
        let orchestrator = Arc::clone(&self.orchestrator);
        let task = tokio::spawn({
            let token = token.clone();
            let text = text.to_string();
            async move { orchestrator.run_turn(turn_id, text, token).await }
        });
        let timer = spawn_thinking_timer(
            self.state.clone(),
            self.events.clone(),
            Arc::clone(&self.assistant),
            turn_id,
            self.settings.timeouts.turn(),
            self.settings.timeouts.remote_cancel(),
            token.clone(),
        );

        *slot = Some(ActiveTurn {
            turn_id,
            token,
            task: Some(task),
            timer: Some(timer),
        });
        SubmitOutcome::Accepted { turn_id }
    }

    /// Cancel the in-flight turn.
    ///
    /// Local state is finalized first, so `processing` is cleared even when
    /// the remote cancel fails or hangs. Returns whether a turn was active.
    pub async fn cancel_active_turn(&self) -> bool {
        let (turn_id, remote) = {
            let mut state = self.state.lock().await;
            let Some(turn_id) = state.active_turn() else {
                return false;
            };
            let remote = state.thread_id.clone().zip(state.run_id.clone());
            state.finish_turn(turn_id, TurnOutcome::Cancelled);
            (turn_id, remote)
        };

        tracing::info!(target: "leyia.chat.session", turn_id, "turn cancelled");
        self.events.emit(SessionEvent::TurnFinished {
            turn_id,
            outcome: TurnOutcome::Cancelled,
        });

        match self.turn.lock().await.as_ref() {
            Some(active) if active.turn_id == turn_id => active.token.cancel(),
            _ => {
                tracing::warn!(target: "leyia.chat.session", turn_id, "no task registered for the cancelled turn");
            }
        }

        match remote {
            Some((thread_id, run_id)) => {
                let timeout = self.settings.timeouts.remote_cancel();
                if !cancel_remote_run(&*self.assistant, &thread_id, &run_id, timeout).await {
                    self.events.emit(SessionEvent::Notice {
                        message: "No se pudo cancelar la ejecución remota.".to_string(),
                    });
                }
            }
            None => {
                tracing::debug!(target: "leyia.chat.session", turn_id, "no run started yet, nothing to cancel remotely");
            }
        }
        true
    }

    /// Cancel any turn, drop every file and start over with the greeting
    pub async fn reset_session(&self) {
        self.cancel_active_turn().await;
        let purged = self.files.purge_all().await;

        let usage = {
            let mut state = self.state.lock().await;
            state.reset();
            state.usage
        };
        tracing::info!(target: "leyia.chat.session", purged, "session reset");

        self.events.emit(SessionEvent::SessionReset);
        self.events.emit(SessionEvent::UsageUpdated(usage));
        self.events.emit(SessionEvent::MessageAppended {
            role: Role::Assistant,
            content: GREETING.to_string(),
        });

        // Monitors belong to the session that just ended
        let were_running = !self.monitors.lock().await.is_empty();
        self.stop_monitors().await;
        if were_running {
            self.start_monitors().await;
        }
    }

    /// Zero the token and cost counters
    pub async fn reset_usage(&self) {
        let usage = {
            let mut state = self.state.lock().await;
            state.usage.reset();
            state.usage
        };
        self.events.emit(SessionEvent::UsageUpdated(usage));
    }

    /// Extract, upload and register one document
    pub async fn upload_file(&self, bytes: &[u8], filename: &str) -> Result<FileHandle> {
        let events = self.events.clone();
        let name = filename.to_string();
        self.files
            .register(bytes, filename, &move |p| {
                events.emit(SessionEvent::UploadProgress {
                    filename: name.clone(),
                    page: p.page,
                    total: p.total,
                })
            })
            .await
    }

    /// Upload several documents; each gets its own result
    pub async fn upload_files(
        &self,
        uploads: Vec<(String, Vec<u8>)>,
    ) -> Vec<(String, Result<FileHandle>)> {
        let events = self.events.clone();
        self.files
            .register_batch(uploads, &move |filename, p| {
                events.emit(SessionEvent::UploadProgress {
                    filename: filename.to_string(),
                    page: p.page,
                    total: p.total,
                })
            })
            .await
    }

    /// Forget a file locally and delete it remotely
    pub async fn delete_file(&self, file_id: &str) -> Result<()> {
        self.files.delete(file_id).await.map(|_| ())
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.snapshot(self.files.is_uploading())
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.state.lock().await.messages.clone()
    }

    pub async fn is_processing(&self) -> bool {
        self.state.lock().await.processing
    }

    /// Wait for the current turn task and its timer to finish
    pub async fn wait_idle(&self) {
        let (task, timer) = {
            let mut turn = self.turn.lock().await;
            match turn.as_mut() {
                Some(active) => (active.task.take(), active.timer.take()),
                None => return,
            }
        };

        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(target: "leyia.chat.session", error = %e, "turn task panicked");
                // The turn never finalized itself
                let mut state = self.state.lock().await;
                if let Some(turn_id) = state.active_turn() {
                    state.finish_turn(turn_id, TurnOutcome::Failed);
                }
            }
        }
        if let Some(timer) = timer {
            timer.shutdown().await;
        }
    }

    /// Cancel the active turn and stop every background task
    pub async fn shutdown(&self) {
        self.cancel_active_turn().await;
        self.root.cancel();
        self.wait_idle().await;
        self.stop_monitors().await;
        tracing::debug!(target: "leyia.chat.session", "session shut down");
    }
}
