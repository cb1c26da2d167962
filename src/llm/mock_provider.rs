// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock assistant service for testing
//!
//! Provides a scriptable implementation of `AssistantService` and `FileStore`
//! that can be used in tests without making real API calls.

use async_trait::async_trait;
use futures::stream;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{ApiError, LeyiaError, Result};
use crate::llm::assistant::{
    AssistantService, FileStore, MessageRequest, RunEvent, RunEventStream, RunRequest,
    ToolCallRequest, ToolOutput, Usage,
};

/// One step of a scripted run stream
#[derive(Clone, Debug)]
pub enum MockStep {
    /// Yield an event
    Event(RunEvent),
    /// Yield a stream-level error
    Error(String),
    /// Sleep before the next step (honours paused tokio time)
    Delay(Duration),
    /// Never yield again
    Hang,
}

/// A scripted run stream
#[derive(Clone, Debug, Default)]
pub struct MockRun {
    pub steps: Vec<MockStep>,
}

impl MockRun {
    pub fn new() -> Self {
        Self::default()
    }

    /// A run that streams `text` in one delta and completes
    pub fn reply(run_id: &str, text: &str, usage: Option<Usage>) -> Self {
        Self::new()
            .status(run_id, "queued")
            .delta(text)
            .completed(run_id, usage)
            .done()
    }

    /// A run that immediately asks for tool outputs
    pub fn tool_calls(run_id: &str, calls: Vec<ToolCallRequest>) -> Self {
        Self::new()
            .status(run_id, "queued")
            .event(RunEvent::RequiresAction {
                run_id: run_id.to_string(),
                tool_calls: calls,
            })
    }

    pub fn event(mut self, event: RunEvent) -> Self {
        self.steps.push(MockStep::Event(event));
        self
    }

    pub fn status(self, run_id: &str, status: &str) -> Self {
        self.event(RunEvent::RunStatus {
            run_id: run_id.to_string(),
            status: status.to_string(),
        })
    }

    pub fn delta(self, text: &str) -> Self {
        self.event(RunEvent::MessageDelta {
            text: text.to_string(),
        })
    }

    pub fn completed(self, run_id: &str, usage: Option<Usage>) -> Self {
        self.event(RunEvent::Completed {
            run_id: run_id.to_string(),
            usage,
        })
    }

    pub fn failed(self, run_id: &str, message: &str) -> Self {
        self.event(RunEvent::Failed {
            run_id: run_id.to_string(),
            message: message.to_string(),
        })
    }

    pub fn done(self) -> Self {
        self.event(RunEvent::Done)
    }

    pub fn error(mut self, message: &str) -> Self {
        self.steps.push(MockStep::Error(message.to_string()));
        self
    }

    pub fn delay(mut self, duration: Duration) -> Self {
        self.steps.push(MockStep::Delay(duration));
        self
    }

    pub fn hang(mut self) -> Self {
        self.steps.push(MockStep::Hang);
        self
    }

    fn into_stream(self) -> RunEventStream {
        let steps: VecDeque<MockStep> = self.steps.into();
        Box::pin(stream::unfold(steps, |mut steps| async move {
            loop {
                match steps.pop_front()? {
                    MockStep::Event(event) => return Some((Ok(event), steps)),
                    MockStep::Error(message) => {
                        return Some((
                            Err(LeyiaError::Api(ApiError::StreamError(message))),
                            steps,
                        ))
                    }
                    MockStep::Delay(duration) => tokio::time::sleep(duration).await,
                    MockStep::Hang => futures::future::pending::<()>().await,
                }
            }
        }))
    }
}

/// Outcome of a remote cancel request
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CancelBehavior {
    #[default]
    Succeed,
    Fail,
    Hang,
}

#[derive(Default)]
struct MockState {
    runs: VecDeque<MockRun>,
    resumes: VecDeque<MockRun>,
    missing_threads: HashSet<String>,
    /// Threads that accept messages but 404 when a run is opened
    missing_on_run: HashSet<String>,
    /// Threads that 404 when tool outputs are submitted
    missing_on_resume: HashSet<String>,
    messages: Vec<(String, MessageRequest)>,
    run_requests: Vec<(String, RunRequest)>,
    tool_outputs: Vec<Vec<ToolOutput>>,
    cancels: Vec<(String, String)>,
    cancel_behavior: CancelBehavior,
    run_usage: Option<Usage>,
    model: Option<String>,
    uploads: Vec<(String, Vec<u8>)>,
    deleted: Vec<String>,
}

/// A scriptable mock assistant service
#[derive(Clone, Default)]
pub struct MockAssistant {
    state: Arc<Mutex<MockState>>,
    threads_created: Arc<AtomicUsize>,
    files_created: Arc<AtomicUsize>,
    usage_fetches: Arc<AtomicUsize>,
    failing_thread_checks: Arc<AtomicUsize>,
    hang_run_creation: Arc<AtomicBool>,
    fail_deletes: Arc<AtomicBool>,
    fail_uploads: Arc<AtomicBool>,
}

impl MockAssistant {
    /// Create a new mock assistant
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Mock assistant state lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Queue a run stream returned by the next `create_run_stream`
    pub fn push_run(&self, run: MockRun) -> &Self {
        self.lock().runs.push_back(run);
        self
    }

    /// Queue a stream returned by the next `submit_tool_outputs_stream`
    pub fn push_resume(&self, run: MockRun) -> &Self {
        self.lock().resumes.push_back(run);
        self
    }

    /// Make the remote side report a thread as missing
    pub fn mark_thread_missing(&self, thread_id: &str) {
        self.lock().missing_threads.insert(thread_id.to_string());
    }

    /// Make run creation on `thread_id` report the thread as missing
    pub fn mark_thread_missing_on_run(&self, thread_id: &str) {
        self.lock().missing_on_run.insert(thread_id.to_string());
    }

    /// Make tool-output submission on `thread_id` report the thread as missing
    pub fn mark_thread_missing_on_resume(&self, thread_id: &str) {
        self.lock().missing_on_resume.insert(thread_id.to_string());
    }

    /// Fail the next `n` thread checks with a server error
    pub fn set_fail_thread_checks(&self, n: usize) {
        self.failing_thread_checks.store(n, Ordering::SeqCst);
    }

    pub fn set_cancel_behavior(&self, behavior: CancelBehavior) {
        self.lock().cancel_behavior = behavior;
    }

    /// Usage returned by `retrieve_run_usage`
    pub fn set_run_usage(&self, usage: Option<Usage>) {
        self.lock().run_usage = usage;
    }

    /// Model returned by `assistant_model` (lookup fails when unset)
    pub fn set_model(&self, model: impl Into<String>) {
        self.lock().model = Some(model.into());
    }

    pub fn set_hang_run_creation(&self, hang: bool) {
        self.hang_run_creation.store(hang, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn threads_created(&self) -> usize {
        self.threads_created.load(Ordering::SeqCst)
    }

    pub fn usage_fetches(&self) -> usize {
        self.usage_fetches.load(Ordering::SeqCst)
    }

    /// Messages sent, with their thread ids
    pub fn recorded_messages(&self) -> Vec<(String, MessageRequest)> {
        self.lock().messages.clone()
    }

    /// Run requests opened, with their thread ids
    pub fn recorded_runs(&self) -> Vec<(String, RunRequest)> {
        self.lock().run_requests.clone()
    }

    /// Tool output batches submitted, in order
    pub fn recorded_tool_outputs(&self) -> Vec<Vec<ToolOutput>> {
        self.lock().tool_outputs.clone()
    }

    /// Cancel requests as (thread, run)
    pub fn recorded_cancels(&self) -> Vec<(String, String)> {
        self.lock().cancels.clone()
    }

    /// Uploaded files as (filename, bytes)
    pub fn recorded_uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.lock().uploads.clone()
    }

    /// Remote deletes requested, including failed ones
    pub fn deleted_files(&self) -> Vec<String> {
        self.lock().deleted.clone()
    }

    fn check_thread(&self, thread_id: &str) -> Result<()> {
        if self.lock().missing_threads.contains(thread_id) {
            return Err(thread_not_found(thread_id));
        }
        Ok(())
    }

    fn default_run() -> MockRun {
        MockRun::reply("run_mock", "Mock response", Some(Usage::new(10, 20)))
    }
}

fn thread_not_found(thread_id: &str) -> LeyiaError {
    LeyiaError::Api(ApiError::NotFound(format!(
        "No thread found with id '{}'.",
        thread_id
    )))
}

#[async_trait]
impl AssistantService for MockAssistant {
    async fn create_thread(&self) -> Result<String> {
        let n = self.threads_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("thread_mock_{}", n))
    }

    async fn retrieve_thread(&self, thread_id: &str) -> Result<()> {
        let failing = self
            .failing_thread_checks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(LeyiaError::Api(ApiError::ServerError {
                status: 503,
                message: "service unavailable".to_string(),
            }));
        }
        self.check_thread(thread_id)
    }

    async fn create_message(&self, thread_id: &str, request: MessageRequest) -> Result<String> {
        self.check_thread(thread_id)?;
        let mut state = self.lock();
        state.messages.push((thread_id.to_string(), request));
        Ok(format!("msg_mock_{}", state.messages.len()))
    }

    async fn create_run_stream(
        &self,
        thread_id: &str,
        request: RunRequest,
    ) -> Result<RunEventStream> {
        self.check_thread(thread_id)?;
        let run = {
            let mut state = self.lock();
            if state.missing_on_run.contains(thread_id) {
                return Err(thread_not_found(thread_id));
            }
            state.run_requests.push((thread_id.to_string(), request));
            state.runs.pop_front()
        };
        if self.hang_run_creation.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        Ok(run.unwrap_or_else(Self::default_run).into_stream())
    }

    async fn submit_tool_outputs_stream(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<RunEventStream> {
        self.check_thread(thread_id)?;
        let run = {
            let mut state = self.lock();
            if state.missing_on_resume.contains(thread_id) {
                return Err(thread_not_found(thread_id));
            }
            state.tool_outputs.push(outputs);
            state.resumes.pop_front()
        };
        Ok(run
            .unwrap_or_else(|| MockRun::new().completed(run_id, None).done())
            .into_stream())
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<()> {
        let behavior = {
            let mut state = self.lock();
            state
                .cancels
                .push((thread_id.to_string(), run_id.to_string()));
            state.cancel_behavior
        };
        match behavior {
            CancelBehavior::Succeed => Ok(()),
            CancelBehavior::Fail => Err(LeyiaError::Api(ApiError::ServerError {
                status: 500,
                message: "cancel failed".to_string(),
            })),
            CancelBehavior::Hang => futures::future::pending().await,
        }
    }

    async fn retrieve_run_usage(&self, _thread_id: &str, _run_id: &str) -> Result<Option<Usage>> {
        self.usage_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.lock().run_usage)
    }

    async fn assistant_model(&self, assistant_id: &str) -> Result<String> {
        self.lock()
            .model
            .clone()
            .ok_or_else(|| LeyiaError::Api(ApiError::NotFound(assistant_id.to_string())))
    }
}

#[async_trait]
impl FileStore for MockAssistant {
    async fn create_file(&self, bytes: Vec<u8>, filename: &str, _purpose: &str) -> Result<String> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(LeyiaError::Api(ApiError::Network(
                "upload refused".to_string(),
            )));
        }
        let n = self.files_created.fetch_add(1, Ordering::SeqCst) + 1;
        self.lock().uploads.push((filename.to_string(), bytes));
        Ok(format!("file_mock_{}", n))
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        self.lock().deleted.push(file_id.to_string());
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(LeyiaError::Api(ApiError::Network(
                "delete refused".to_string(),
            )));
        }
        Ok(())
    }
}
