// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Built-in tools

mod legal_search;
mod web_search;

pub use legal_search::LegalDocumentSearchTool;
pub use web_search::WebSearchTool;

use std::sync::Arc;

use crate::config::SearchConfig;
use crate::error::{LeyiaError, Result};

use super::{SearchBackend, SearchHit, SearchRequest, ToolResult};

pub(crate) const SEARCH_NOT_CONFIGURED: &str =
    "Error: El servicio de búsqueda no está configurado.";
pub(crate) const NO_RESULTS: &str =
    "No se encontraron resultados relevantes para la búsqueda especificada.";

/// Search settings shared by the search tools
#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    pub max_results: usize,
    pub snippet_chars: usize,
}

impl From<&SearchConfig> for SearchLimits {
    fn from(config: &SearchConfig) -> Self {
        Self {
            max_results: config.max_results,
            snippet_chars: config.snippet_chars,
        }
    }
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

fn required_str<'a>(input: &'a serde_json::Value, name: &str) -> Result<&'a str> {
    input[name]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LeyiaError::InvalidInput(format!("{} is required", name)))
}

fn optional_str<'a>(input: &'a serde_json::Value, name: &str) -> Option<&'a str> {
    input[name]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Run a search and render the hits the way the assistant expects them
async fn run_search(
    backend: Option<&Arc<dyn SearchBackend>>,
    tool_call_id: String,
    request: SearchRequest,
    limits: SearchLimits,
) -> ToolResult {
    let Some(backend) = backend else {
        return ToolResult::error(tool_call_id, SEARCH_NOT_CONFIGURED);
    };

    tracing::info!(target: "leyia.tools", query = %request.query, "running search");

    match backend.search(request).await {
        Ok(hits) if hits.is_empty() => ToolResult::success(tool_call_id, NO_RESULTS),
        Ok(hits) => match render_hits(hits, limits) {
            Ok(json) => ToolResult::success(tool_call_id, json),
            Err(e) => ToolResult::error(tool_call_id, e.to_string()),
        },
        Err(e) => ToolResult::error(
            tool_call_id,
            format!(
                "Error al procesar la búsqueda en internet. El servicio devolvió el siguiente mensaje: {}",
                e
            ),
        ),
    }
}

fn render_hits(hits: Vec<SearchHit>, limits: SearchLimits) -> Result<String> {
    let trimmed: Vec<SearchHit> = hits
        .into_iter()
        .take(limits.max_results)
        .map(|hit| SearchHit {
            snippet: hit.snippet.chars().take(limits.snippet_chars).collect(),
            ..hit
        })
        .collect();
    Ok(serde_json::to_string(&trimmed)?)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_hits_caps_snippet_by_chars() {
        let limits = SearchLimits {
            max_results: 5,
            snippet_chars: 4,
        };
        let json = render_hits(vec![test_support::hit("a", "artículo")], limits).unwrap();
        let parsed: Vec<SearchHit> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0].snippet, "artí");
    }

    #[test]
    fn test_render_hits_keeps_non_ascii_unescaped() {
        let json = render_hits(
            vec![test_support::hit("c", "Sentencia del año")],
            SearchLimits::default(),
        )
        .unwrap();
        assert!(json.contains("\"snippet\":\"Sentencia del año\""));
    }

    #[tokio::test]
    async fn test_run_search_without_backend() {
        let result = run_search(
            None,
            "call_1".to_string(),
            SearchRequest {
                query: "q".to_string(),
                document_type: None,
                max_results: 5,
            },
            SearchLimits::default(),
        )
        .await;
        assert!(result.is_error());
        assert_eq!(result.output_text(), SEARCH_NOT_CONFIGURED);
    }
}
