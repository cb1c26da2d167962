// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Turn orchestration
//!
//! Drives one conversational turn against the assistant service:
//!
//! ```text
//! Start -> ThreadEnsured -> RunStreaming -> (ToolsRequired <-> RunStreaming)
//!       -> Completed | Failed | TimedOut | Cancelled
//! ```
//!
//! Tool calls are executed between streams; submitting their outputs yields
//! a new stream that replaces the previous one. Whatever happens, the turn
//! ends in [`SessionState::finish_turn`](super::state::SessionState::finish_turn).

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{Settings, StreamingConfig};
use crate::error::Result;
use crate::files::{FileHandle, FileLifecycleManager};
use crate::llm::assistant::{
    AssistantService, MessageRequest, RunEvent, RunEventStream, RunRequest, Usage,
};
use crate::tools::{status_line, ToolDispatcher};

use super::events::{EventEmitter, SessionEvent};
use super::state::{SharedState, TurnOutcome};
use super::streaming::FlushBuffer;
use super::usage::{TurnUsage, UsageAccountant};

/// Static inputs of the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub assistant_id: String,
    /// Model used for pricing when the assistant's model cannot be looked up
    pub default_model: String,
    pub streaming: StreamingConfig,
    pub run_create_timeout: Duration,
    pub max_attachments: usize,
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &Settings, assistant_id: impl Into<String>) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            default_model: settings.assistant.default_model.clone(),
            streaming: settings.streaming.clone(),
            run_create_timeout: settings.timeouts.run_create(),
            max_attachments: settings.files.max_attachments,
        }
    }
}

/// How the event stream of a run ended
#[derive(Debug, Clone, PartialEq)]
enum StreamEnd {
    Completed { usage: Option<Usage> },
    Failed(String),
    Cancelled,
}

/// Outgoing message text annotated with the attached file names
pub fn compose_content(text: &str, attached: &[FileHandle]) -> String {
    if attached.is_empty() {
        format!("{}\n\n[SISTEMA: No hay archivos subidos]", text)
    } else {
        let names: Vec<&str> = attached.iter().map(|h| h.filename.as_str()).collect();
        format!("{}\n\n[Archivos adjuntos: {}]", text, names.join(", "))
    }
}

pub struct TurnOrchestrator {
    assistant: Arc<dyn AssistantService>,
    dispatcher: Arc<ToolDispatcher>,
    files: Arc<FileLifecycleManager>,
    accountant: UsageAccountant,
    state: SharedState,
    events: EventEmitter,
    config: OrchestratorConfig,
}

impl TurnOrchestrator {
    pub fn new(
        assistant: Arc<dyn AssistantService>,
        dispatcher: Arc<ToolDispatcher>,
        files: Arc<FileLifecycleManager>,
        accountant: UsageAccountant,
        state: SharedState,
        events: EventEmitter,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            assistant,
            dispatcher,
            files,
            accountant,
            state,
            events,
            config,
        }
    }

    /// Run turn `turn_id` to completion.
    ///
    /// Returns the outcome if this call finalized the turn, or `None` when the
    /// turn was stopped through `cancel` or finalized elsewhere first.
    pub async fn run_turn(
        &self,
        turn_id: u64,
        text: String,
        cancel: CancellationToken,
    ) -> Option<TurnOutcome> {
        let mut usage_guard = TurnUsage::new();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(target: "leyia.chat.orchestrator", turn_id, "turn task stopped");
                return None;
            }
            result = self.drive(turn_id, &text, &mut usage_guard) => result,
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) if e.is_timeout() => {
                tracing::error!(target: "leyia.chat.orchestrator", turn_id, "run creation timed out");
                TurnOutcome::TimedOut
            }
            Err(e) => {
                tracing::error!(target: "leyia.chat.orchestrator", turn_id, error = %e, "turn failed");
                TurnOutcome::Failed
            }
        };

        let finalized = self.finalize(turn_id, outcome).await;
        // Stops the thinking timer
        cancel.cancel();
        finalized.then_some(outcome)
    }

    async fn drive(
        &self,
        turn_id: u64,
        text: &str,
        usage_guard: &mut TurnUsage,
    ) -> Result<TurnOutcome> {
        let model = self.resolve_model().await;
        let thread_id = self.ensure_thread().await?;
        let (mut thread_id, mut attached) = self.post_message(&thread_id, text).await?;

        // A thread can vanish after the message was accepted; recover once
        let mut recovered = false;
        let end = loop {
            let attempt = match self.open_run(turn_id, &thread_id, &attached).await {
                Ok(stream) => self.consume(turn_id, &thread_id, stream).await,
                Err(e) => Err(e),
            };
            match attempt {
                Err(e) if e.is_not_found() && !recovered => {
                    tracing::warn!(target: "leyia.chat.orchestrator", turn_id, %thread_id, "thread missing during run, starting a new one");
                    recovered = true;
                    self.state.lock().await.restart_stream(turn_id);
                    (thread_id, attached) = self.recover_thread(text).await?;
                }
                attempt => break attempt?,
            }
        };

        let (outcome, usage) = match end {
            StreamEnd::Completed { usage } => (TurnOutcome::Completed, usage),
            StreamEnd::Failed(message) => {
                tracing::warn!(target: "leyia.chat.orchestrator", turn_id, %message, "run failed");
                (TurnOutcome::Failed, None)
            }
            StreamEnd::Cancelled => (TurnOutcome::Cancelled, None),
        };

        let usage = match usage {
            Some(usage) => Some(usage),
            None if outcome != TurnOutcome::Cancelled => self.fetch_usage(turn_id, &thread_id).await,
            None => None,
        };
        if let Some(usage) = usage {
            let stats = {
                let mut state = self.state.lock().await;
                let mut stats = state.usage;
                usage_guard.apply(&self.accountant, &mut stats, &model, usage);
                state.usage = stats;
                stats
            };
            self.events.emit(SessionEvent::UsageUpdated(stats));
        }

        Ok(outcome)
    }

    /// Model name behind the assistant, looked up once per session
    async fn resolve_model(&self) -> String {
        if let Some(model) = self.state.lock().await.model_name.clone() {
            return model;
        }

        let model = match self.assistant.assistant_model(&self.config.assistant_id).await {
            Ok(model) if !model.is_empty() => model,
            Ok(_) => self.config.default_model.clone(),
            Err(e) => {
                tracing::debug!(target: "leyia.chat.orchestrator", error = %e, "model lookup failed, using default");
                self.config.default_model.clone()
            }
        };

        let mut state = self.state.lock().await;
        state.model_name.get_or_insert(model).clone()
    }

    async fn ensure_thread(&self) -> Result<String> {
        if let Some(thread_id) = self.state.lock().await.thread_id.clone() {
            return Ok(thread_id);
        }
        self.new_thread().await
    }

    async fn new_thread(&self) -> Result<String> {
        let thread_id = self.assistant.create_thread().await?;
        tracing::info!(target: "leyia.chat.orchestrator", %thread_id, "thread created");
        self.state.lock().await.thread_id = Some(thread_id.clone());
        Ok(thread_id)
    }

    async fn compose_message(&self, text: &str) -> (MessageRequest, Vec<FileHandle>) {
        let attached = self
            .state
            .lock()
            .await
            .files
            .attachable(self.config.max_attachments);
        let request = MessageRequest::new(compose_content(text, &attached))
            .with_attachments(attached.iter().map(|h| h.id.clone()));
        (request, attached)
    }

    /// Post the user message, recovering once from a thread that no longer exists
    async fn post_message(&self, thread_id: &str, text: &str) -> Result<(String, Vec<FileHandle>)> {
        let (request, attached) = self.compose_message(text).await;
        match self.assistant.create_message(thread_id, request).await {
            Ok(_) => Ok((thread_id.to_string(), attached)),
            Err(e) if e.is_not_found() => {
                tracing::warn!(target: "leyia.chat.orchestrator", %thread_id, "thread missing, starting a new one");
                self.recover_thread(text).await
            }
            Err(e) => Err(e),
        }
    }

    /// Reap the orphaned files, open a fresh thread and post `text` there
    async fn recover_thread(&self, text: &str) -> Result<(String, Vec<FileHandle>)> {
        self.files.reap_orphans().await;
        let thread_id = self.new_thread().await?;
        let (request, attached) = self.compose_message(text).await;
        self.assistant.create_message(&thread_id, request).await?;
        Ok((thread_id, attached))
    }

    async fn open_run(
        &self,
        turn_id: u64,
        thread_id: &str,
        attached: &[FileHandle],
    ) -> Result<RunEventStream> {
        let mut request = RunRequest::new(self.config.assistant_id.clone())
            .with_functions(self.dispatcher.definitions());
        if attached.is_empty() {
            tracing::debug!(target: "leyia.chat.orchestrator", turn_id, "no attachments, document search disabled");
        } else {
            request = request.with_file_search();
        }

        let stream = tokio::time::timeout(
            self.config.run_create_timeout,
            self.assistant.create_run_stream(thread_id, request),
        )
        .await??;
        Ok(stream)
    }

    async fn consume(
        &self,
        turn_id: u64,
        thread_id: &str,
        mut stream: RunEventStream,
    ) -> Result<StreamEnd> {
        let mut buffer = FlushBuffer::from_config(&self.config.streaming, Instant::now());

        loop {
            let Some(item) = stream.next().await else {
                self.flush(turn_id, buffer.drain()).await;
                return Ok(StreamEnd::Failed(
                    "stream ended before the run finished".to_string(),
                ));
            };

            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    self.flush(turn_id, buffer.drain()).await;
                    return Err(e);
                }
            };

            match event {
                RunEvent::MessageDelta { text } => {
                    let batch = buffer.push(&text, Instant::now());
                    self.flush(turn_id, batch).await;
                }
                RunEvent::RunStatus { run_id, status } => {
                    tracing::debug!(target: "leyia.chat.orchestrator", turn_id, %run_id, %status, "run status");
                    self.state.lock().await.set_run_id(turn_id, &run_id);
                }
                RunEvent::RequiresAction { run_id, tool_calls } => {
                    self.flush(turn_id, buffer.drain()).await;
                    self.state.lock().await.set_run_id(turn_id, &run_id);

                    if let Some(status) = status_line(&tool_calls) {
                        self.state.lock().await.show_status(turn_id, &status);
                        self.events.emit(SessionEvent::ToolStatus { turn_id, status });
                    }

                    tracing::info!(
                        target: "leyia.chat.orchestrator",
                        turn_id,
                        calls = tool_calls.len(),
                        "run requires tool outputs"
                    );
                    let outputs = self.dispatcher.dispatch_all(&tool_calls).await;
                    // The resumed stream supersedes the old one
                    stream = self
                        .assistant
                        .submit_tool_outputs_stream(thread_id, &run_id, outputs)
                        .await?;
                }
                RunEvent::Completed { run_id, usage } => {
                    self.flush(turn_id, buffer.drain()).await;
                    self.state.lock().await.set_run_id(turn_id, &run_id);
                    return Ok(StreamEnd::Completed { usage });
                }
                RunEvent::Failed { message, .. } | RunEvent::Error { message } => {
                    self.flush(turn_id, buffer.drain()).await;
                    return Ok(StreamEnd::Failed(message));
                }
                RunEvent::Cancelled { .. } => {
                    self.flush(turn_id, buffer.drain()).await;
                    return Ok(StreamEnd::Cancelled);
                }
                RunEvent::Done => {
                    self.flush(turn_id, buffer.drain()).await;
                    return Ok(StreamEnd::Failed(
                        "stream closed before the run finished".to_string(),
                    ));
                }
                RunEvent::Other { .. } => {}
            }
        }
    }

    async fn flush(&self, turn_id: u64, batch: Option<String>) {
        let Some(batch) = batch else {
            return;
        };
        let content = self.state.lock().await.append_stream_text(turn_id, &batch);
        if let Some(content) = content {
            self.events.emit(SessionEvent::AssistantText { turn_id, content });
        }
    }

    /// One follow-up lookup when the terminal event carried no usage
    async fn fetch_usage(&self, turn_id: u64, thread_id: &str) -> Option<Usage> {
        let run_id = self.state.lock().await.run_id.clone()?;
        match self.assistant.retrieve_run_usage(thread_id, &run_id).await {
            Ok(usage) => usage,
            Err(e) => {
                tracing::debug!(target: "leyia.chat.orchestrator", turn_id, error = %e, "could not fetch run usage");
                None
            }
        }
    }

    async fn finalize(&self, turn_id: u64, outcome: TurnOutcome) -> bool {
        let finished = self.state.lock().await.finish_turn(turn_id, outcome);
        if finished {
            tracing::info!(target: "leyia.chat.orchestrator", turn_id, ?outcome, "turn finished");
            self.events.emit(SessionEvent::TurnFinished { turn_id, outcome });
        }
        finished
    }
}
