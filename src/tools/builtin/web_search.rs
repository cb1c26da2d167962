// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! General web search tool

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;
use crate::llm::assistant::ToolDefinition;
use crate::tools::{
    SchemaBuilder, SearchBackend, SearchRequest, ToolCapability, ToolKind, ToolResult,
};

use super::{optional_str, required_str, run_search, SearchLimits};

/// Tool for `buscar_web`
pub struct WebSearchTool {
    backend: Option<Arc<dyn SearchBackend>>,
    limits: SearchLimits,
}

impl WebSearchTool {
    pub fn new(backend: Option<Arc<dyn SearchBackend>>, limits: SearchLimits) -> Self {
        Self { backend, limits }
    }
}

#[async_trait]
impl ToolCapability for WebSearchTool {
    fn kind(&self) -> ToolKind {
        ToolKind::WebSearch
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.kind().name().to_string(),
            description: "Búsqueda general en internet para información jurídica o de contexto que no sea un documento legal específico.".to_string(),
            input_schema: SchemaBuilder::new()
                .string("query", "La consulta de búsqueda.", true)
                .string(
                    "sitio_preferido",
                    "Opcional. Dominio en el que concentrar la búsqueda.",
                    false,
                )
                .build(),
        }
    }

    async fn execute(&self, tool_call_id: String, input: Value) -> Result<ToolResult> {
        let query = required_str(&input, "query")?;
        let final_query = match optional_str(&input, "sitio_preferido") {
            Some(site) => format!("{} site:{}", query, site),
            None => query.to_string(),
        };

        let request = SearchRequest {
            query: final_query,
            document_type: None,
            max_results: self.limits.max_results,
        };

        Ok(run_search(self.backend.as_ref(), tool_call_id, request, self.limits).await)
    }
}
