// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Legal document search tool
//!
//! Finds Colombian laws, rulings and congressional gazettes, shaping the
//! query according to the document type.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::{LeyiaError, Result};
use crate::llm::assistant::ToolDefinition;
use crate::tools::{
    DocumentType, SchemaBuilder, SearchBackend, SearchRequest, ToolCapability, ToolKind,
    ToolResult,
};

use super::{optional_str, required_str, run_search, SearchLimits};

/// Tool for `buscar_documento_legal`
pub struct LegalDocumentSearchTool {
    backend: Option<Arc<dyn SearchBackend>>,
    limits: SearchLimits,
}

impl LegalDocumentSearchTool {
    pub fn new(backend: Option<Arc<dyn SearchBackend>>, limits: SearchLimits) -> Self {
        Self { backend, limits }
    }

    /// Apply the per-type query strategy
    pub fn build_query(query: &str, document_type: DocumentType, site: Option<&str>) -> String {
        let mut final_query = match (document_type, site) {
            (DocumentType::Gaceta, _) => format!("\"Gaceta del Congreso\" {}", query),
            (DocumentType::Sentencia | DocumentType::Ley, None) => format!("\"{}\"", query),
            (_, Some(_)) => query.to_string(),
        };
        if let Some(site) = site {
            final_query.push_str(&format!(" site:{}", site));
        }
        if document_type == DocumentType::Gaceta {
            final_query.push_str(" filetype:pdf");
        }
        final_query
    }
}

#[async_trait]
impl ToolCapability for LegalDocumentSearchTool {
    fn kind(&self) -> ToolKind {
        ToolKind::LegalDocumentSearch
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.kind().name().to_string(),
            description: "Herramienta de búsqueda avanzada para encontrar documentos legales colombianos (leyes, sentencias, gacetas) aplicando la estrategia más adecuada para cada tipo.".to_string(),
            input_schema: SchemaBuilder::new()
                .string(
                    "query",
                    "La consulta de búsqueda específica. Para Gacetas, usar solo el número y año, ej: '758 de 2017'. Para Sentencias, el identificador completo, ej: 'Sentencia C-123 de 2023'. Para Leyes, el número y año, ej: 'Ley 1437 de 2011'.",
                    true,
                )
                .string_enum(
                    "tipo_documento",
                    "El tipo de documento legal a buscar. Debe ser uno de: 'gaceta', 'sentencia', 'ley'.",
                    &["gaceta", "sentencia", "ley"],
                    true,
                )
                .string(
                    "sitio_preferido",
                    "Opcional. Usar para priorizar dominios de alta autoridad. Ej: 'corteconstitucional.gov.co' para sentencias o 'suin-juriscol.gov.co' para leyes. NO usar para gacetas.",
                    false,
                )
                .build(),
        }
    }

    async fn execute(&self, tool_call_id: String, input: Value) -> Result<ToolResult> {
        let query = required_str(&input, "query")?;
        let raw_type = required_str(&input, "tipo_documento")?;
        let document_type = DocumentType::parse(raw_type).ok_or_else(|| {
            LeyiaError::InvalidInput(format!(
                "tipo_documento must be one of gaceta, sentencia, ley (got '{}')",
                raw_type
            ))
        })?;
        let site = optional_str(&input, "sitio_preferido");

        let request = SearchRequest {
            query: Self::build_query(query, document_type, site),
            document_type: Some(document_type),
            max_results: self.limits.max_results,
        };

        Ok(run_search(self.backend.as_ref(), tool_call_id, request, self.limits).await)
    }
}
