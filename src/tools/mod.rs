// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool system for LeyIA
//!
//! Provides the capabilities the assistant can call mid-run (legal document
//! search and general web search) and the dispatcher that executes them.

pub mod builtin;
pub mod definition;
pub mod dispatcher;
pub mod search;

pub use definition::*;
pub use dispatcher::*;
pub use search::*;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::llm::assistant::{ToolDefinition, ToolOutput};

/// The fixed set of tools known to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolKind {
    /// Colombian legal document search (`buscar_documento_legal`)
    LegalDocumentSearch,
    /// General web search (`buscar_web`)
    WebSearch,
}

impl ToolKind {
    pub const ALL: [ToolKind; 2] = [ToolKind::LegalDocumentSearch, ToolKind::WebSearch];

    /// Name the assistant uses to call this tool
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::LegalDocumentSearch => "buscar_documento_legal",
            ToolKind::WebSearch => "buscar_web",
        }
    }

    /// Resolve a tool name requested by the assistant
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a tool execution
#[derive(Debug, Clone)]
pub struct ToolResult {
    /// The tool call this result answers
    pub tool_call_id: String,
    /// The output of the tool
    pub output: ToolOutcome,
}

/// Output from a tool
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    /// Successful output
    Success(String),
    /// Error output (still sent back to the assistant as text)
    Error(String),
}

impl ToolResult {
    /// Create a successful result
    pub fn success(tool_call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            output: ToolOutcome::Success(output.into()),
        }
    }

    /// Create an error result
    pub fn error(tool_call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            output: ToolOutcome::Error(error.into()),
        }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self.output, ToolOutcome::Error(_))
    }

    /// Get the output text
    pub fn output_text(&self) -> &str {
        match &self.output {
            ToolOutcome::Success(s) | ToolOutcome::Error(s) => s,
        }
    }

    /// Convert into the payload submitted back to the run
    pub fn into_output(self) -> ToolOutput {
        let output = match self.output {
            ToolOutcome::Success(s) | ToolOutcome::Error(s) => s,
        };
        ToolOutput {
            tool_call_id: self.tool_call_id,
            output,
        }
    }
}

/// A capability the assistant can invoke
#[async_trait]
pub trait ToolCapability: Send + Sync {
    /// Which tool this capability answers
    fn kind(&self) -> ToolKind;

    /// Get the tool definition for the assistant
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with the parsed JSON arguments
    async fn execute(&self, tool_call_id: String, input: Value) -> Result<ToolResult>;
}
