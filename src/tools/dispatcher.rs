// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool dispatch
//!
//! Executes tool calls requested mid-run. Every failure mode (unknown tool,
//! malformed arguments, timeout, execution error) becomes an error string
//! sent back to the assistant, so a turn never aborts because of a tool.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::SearchConfig;
use crate::llm::assistant::{ToolCallRequest, ToolDefinition, ToolOutput};

use super::builtin::{LegalDocumentSearchTool, SearchLimits, WebSearchTool};
use super::{SearchBackend, ToolCapability, ToolKind, ToolResult};

/// Static registry of tool capabilities plus the per-call timeout
pub struct ToolDispatcher {
    registry: BTreeMap<ToolKind, Arc<dyn ToolCapability>>,
    timeout: Duration,
}

impl ToolDispatcher {
    /// Create an empty dispatcher
    pub fn new(timeout: Duration) -> Self {
        Self {
            registry: BTreeMap::new(),
            timeout,
        }
    }

    /// Create a dispatcher with both search tools registered
    pub fn with_builtins(
        backend: Option<Arc<dyn SearchBackend>>,
        config: &SearchConfig,
        timeout: Duration,
    ) -> Self {
        let limits = SearchLimits::from(config);
        let mut dispatcher = Self::new(timeout);
        dispatcher.register(Arc::new(LegalDocumentSearchTool::new(
            backend.clone(),
            limits,
        )));
        dispatcher.register(Arc::new(WebSearchTool::new(backend, limits)));
        dispatcher
    }

    /// Register a capability, replacing any previous one of the same kind
    pub fn register(&mut self, capability: Arc<dyn ToolCapability>) {
        self.registry.insert(capability.kind(), capability);
    }

    /// Tool definitions for the run request
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.values().map(|c| c.definition()).collect()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute one tool call. Never fails: errors come back as error results.
    pub async fn dispatch(&self, call: &ToolCallRequest) -> ToolResult {
        let Some(capability) = ToolKind::from_name(&call.name).and_then(|k| self.registry.get(&k))
        else {
            tracing::warn!(target: "leyia.tools", tool = %call.name, "unknown tool requested");
            return ToolResult::error(
                &call.id,
                format!("Error: La herramienta {} no está disponible.", call.name),
            );
        };

        let input = match parse_arguments(&call.arguments) {
            Ok(input) => input,
            Err(e) => {
                tracing::warn!(target: "leyia.tools", tool = %call.name, error = %e, "malformed tool arguments");
                return ToolResult::error(
                    &call.id,
                    format!("Error ejecutando {}: argumentos inválidos ({})", call.name, e),
                );
            }
        };

        tracing::debug!(target: "leyia.tools", tool = %call.name, call_id = %call.id, "executing tool");

        match tokio::time::timeout(self.timeout, capability.execute(call.id.clone(), input)).await
        {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::error!(target: "leyia.tools", tool = %call.name, error = %e, "tool execution failed");
                ToolResult::error(&call.id, format!("Error ejecutando {}: {}", call.name, e))
            }
            Err(_) => {
                tracing::error!(target: "leyia.tools", tool = %call.name, "tool execution timed out");
                ToolResult::error(
                    &call.id,
                    format!("Error: La herramienta {} tardó demasiado.", call.name),
                )
            }
        }
    }

    /// Execute a batch sequentially, keeping the request order
    pub async fn dispatch_all(&self, calls: &[ToolCallRequest]) -> Vec<ToolOutput> {
        let mut outputs = Vec::with_capacity(calls.len());
        for call in calls {
            outputs.push(self.dispatch(call).await.into_output());
        }
        outputs
    }
}

fn parse_arguments(arguments: &str) -> serde_json::Result<serde_json::Value> {
    if arguments.trim().is_empty() {
        return Ok(serde_json::Value::Object(Default::default()));
    }
    serde_json::from_str(arguments)
}

/// Status line shown while the first call of a batch runs
pub fn status_line(calls: &[ToolCallRequest]) -> Option<String> {
    let first = calls.first()?;
    let args: serde_json::Value = serde_json::from_str(&first.arguments).ok()?;
    let query = args["query"].as_str().unwrap_or("...");
    Some(format!("Buscando: '{}'...", query))
}
