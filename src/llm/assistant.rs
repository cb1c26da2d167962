// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Assistant service traits and related types
//!
//! Defines the abstraction over the stateful thread/run assistant protocol
//! and the remote file store that backs document attachments.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::Result;

/// Stream of run events produced by opening or resuming a run
pub type RunEventStream = Pin<Box<dyn Stream<Item = Result<RunEvent>> + Send>>;

/// Stateful assistant service: threads, messages and streamed runs
#[async_trait]
pub trait AssistantService: Send + Sync {
    /// Create a new conversation thread and return its id
    async fn create_thread(&self) -> Result<String>;

    /// Check that a thread still exists. Missing threads yield `ApiError::NotFound`.
    async fn retrieve_thread(&self, thread_id: &str) -> Result<()>;

    /// Append a user message to a thread and return the message id
    async fn create_message(&self, thread_id: &str, request: MessageRequest) -> Result<String>;

    /// Open a streaming run on a thread
    async fn create_run_stream(&self, thread_id: &str, request: RunRequest)
        -> Result<RunEventStream>;

    /// Submit tool outputs for a run waiting on them; the returned stream supersedes the old one
    async fn submit_tool_outputs_stream(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<RunEventStream>;

    /// Request cancellation of an in-flight run
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<()>;

    /// Fetch a run's usage after the fact, if the service recorded it
    async fn retrieve_run_usage(&self, thread_id: &str, run_id: &str) -> Result<Option<Usage>>;

    /// Look up the model an assistant is configured with
    async fn assistant_model(&self, assistant_id: &str) -> Result<String>;
}

/// Remote file storage for uploaded documents
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Upload bytes and return the remote file id
    async fn create_file(&self, bytes: Vec<u8>, filename: &str, purpose: &str) -> Result<String>;

    /// Delete a remote file
    async fn delete_file(&self, file_id: &str) -> Result<()>;
}

/// A user message sent to a thread
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRequest {
    /// Message text (already annotated with attachment names)
    pub content: String,

    /// Files made searchable for this message
    pub attachments: Vec<Attachment>,
}

/// A file attached to a message for document search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_id: String,
}

/// Parameters for opening a run
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Assistant that executes the run
    pub assistant_id: String,

    /// Tools enabled for this run
    pub tools: Vec<RunTool>,
}

/// A tool enabled on a run
#[derive(Debug, Clone, PartialEq)]
pub enum RunTool {
    /// Function tool answered by the local tool dispatcher
    Function(ToolDefinition),
    /// Built-in document search over the attached files
    FileSearch,
}

/// Tool definition for the assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,

    /// Tool description
    pub description: String,

    /// Input schema (JSON Schema)
    pub input_schema: ToolInputSchema,
}

/// Input schema for a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInputSchema {
    /// Schema type (always "object")
    #[serde(rename = "type")]
    pub schema_type: String,

    /// Property definitions
    pub properties: serde_json::Value,

    /// Required properties
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

/// A tool call requested by the model mid-run
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    /// Call id, echoed back with the output
    pub id: String,

    /// Name of the requested tool
    pub name: String,

    /// Raw JSON argument string as produced by the model
    pub arguments: String,
}

/// Output of one tool call, keyed by call id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

/// Token usage statistics reported by the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Input tokens
    #[serde(alias = "prompt_tokens")]
    pub input_tokens: u64,
    /// Output tokens
    #[serde(alias = "completion_tokens")]
    pub output_tokens: u64,
}

/// Events from a streaming run
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// Run lifecycle update (created, queued, in_progress, ...)
    RunStatus { run_id: String, status: String },

    /// Text appended to the assistant message
    MessageDelta { text: String },

    /// The run is waiting on tool outputs
    RequiresAction {
        run_id: String,
        tool_calls: Vec<ToolCallRequest>,
    },

    /// Run finished successfully
    Completed {
        run_id: String,
        usage: Option<Usage>,
    },

    /// Run failed or expired
    Failed { run_id: String, message: String },

    /// Run was cancelled remotely
    Cancelled { run_id: String },

    /// Stream-level error event
    Error { message: String },

    /// End of stream marker
    Done,

    /// Any event the engine does not interpret
    Other { event: String },
}

impl MessageRequest {
    /// Create a message request without attachments
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            attachments: Vec::new(),
        }
    }

    /// Attach files by id
    pub fn with_attachments<I, S>(mut self, file_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attachments = file_ids
            .into_iter()
            .map(|id| Attachment { file_id: id.into() })
            .collect();
        self
    }
}

impl RunRequest {
    /// Create a run request with no tools
    pub fn new(assistant_id: impl Into<String>) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            tools: Vec::new(),
        }
    }

    /// Set function tools
    pub fn with_functions(mut self, definitions: Vec<ToolDefinition>) -> Self {
        self.tools
            .extend(definitions.into_iter().map(RunTool::Function));
        self
    }

    /// Enable the built-in document search
    pub fn with_file_search(mut self) -> Self {
        if !self.file_search_enabled() {
            self.tools.push(RunTool::FileSearch);
        }
        self
    }

    /// Whether document search is enabled for this run
    pub fn file_search_enabled(&self) -> bool {
        self.tools.iter().any(|t| matches!(t, RunTool::FileSearch))
    }

    /// Names of the function tools on this run
    pub fn function_names(&self) -> Vec<&str> {
        self.tools
            .iter()
            .filter_map(|t| match t {
                RunTool::Function(def) => Some(def.name.as_str()),
                RunTool::FileSearch => None,
            })
            .collect()
    }
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Get total tokens used
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

impl RunEvent {
    /// Whether the event ends the run (successfully or not)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunEvent::Completed { .. }
                | RunEvent::Failed { .. }
                | RunEvent::Cancelled { .. }
                | RunEvent::Error { .. }
        )
    }

    /// Run id carried by the event, if any
    pub fn run_id(&self) -> Option<&str> {
        match self {
            RunEvent::RunStatus { run_id, .. }
            | RunEvent::RequiresAction { run_id, .. }
            | RunEvent::Completed { run_id, .. }
            | RunEvent::Failed { run_id, .. }
            | RunEvent::Cancelled { run_id } => Some(run_id),
            _ => None,
        }
    }
}
