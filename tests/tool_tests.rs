// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use leyia::config::SearchConfig;
use leyia::error::Result;
use leyia::llm::assistant::ToolCallRequest;
use leyia::tools::builtin::{LegalDocumentSearchTool, SearchLimits, WebSearchTool};
use leyia::tools::{
    status_line, DocumentType, SearchBackend, SearchHit, SearchRequest, TavilyClient,
    ToolCapability, ToolDispatcher, ToolKind, ToolOutcome, ToolResult,
};

#[derive(Default)]
struct CapturingBackend {
    requests: Mutex<Vec<SearchRequest>>,
    hits: Vec<SearchHit>,
}

impl CapturingBackend {
    fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            ..Default::default()
        }
    }

    fn queries(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.query.clone())
            .collect()
    }
}

#[async_trait]
impl SearchBackend for CapturingBackend {
    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchHit>> {
        self.requests.lock().unwrap().push(request);
        Ok(self.hits.clone())
    }
}

fn hit(title: &str, snippet: &str) -> SearchHit {
    SearchHit {
        url: format!("https://www.suin-juriscol.gov.co/{}", title),
        title: title.to_string(),
        snippet: snippet.to_string(),
    }
}

fn call(id: &str, name: &str, arguments: &str) -> ToolCallRequest {
    ToolCallRequest {
        id: id.to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }
}

fn dispatcher(backend: Arc<CapturingBackend>) -> ToolDispatcher {
    ToolDispatcher::with_builtins(
        Some(backend),
        &SearchConfig::default(),
        Duration::from_secs(120),
    )
}

#[test]
fn test_tool_result_success() {
    let result = ToolResult::success("call_1", "hecho");
    assert_eq!(result.tool_call_id, "call_1");
    assert!(!result.is_error());
    assert!(matches!(result.output, ToolOutcome::Success(ref s) if s == "hecho"));
}

#[test]
fn test_tool_result_error_is_still_text() {
    let result = ToolResult::error("call_2", "falló");
    assert!(result.is_error());
    assert_eq!(result.output_text(), "falló");

    let output = result.into_output();
    assert_eq!(output.tool_call_id, "call_2");
    assert_eq!(output.output, "falló");
}

#[test]
fn test_tool_kind_lookup() {
    assert_eq!(
        ToolKind::from_name("buscar_documento_legal"),
        Some(ToolKind::LegalDocumentSearch)
    );
    assert_eq!(ToolKind::from_name("buscar_web"), Some(ToolKind::WebSearch));
    assert_eq!(ToolKind::from_name("shell"), None);
}

#[test]
fn test_query_strategies() {
    assert_eq!(
        LegalDocumentSearchTool::build_query("758 de 2017", DocumentType::Gaceta, None),
        "\"Gaceta del Congreso\" 758 de 2017 filetype:pdf"
    );
    assert_eq!(
        LegalDocumentSearchTool::build_query("Ley 1437 de 2011", DocumentType::Ley, None),
        "\"Ley 1437 de 2011\""
    );
    assert_eq!(
        LegalDocumentSearchTool::build_query(
            "Sentencia C-123 de 2023",
            DocumentType::Sentencia,
            Some("corteconstitucional.gov.co")
        ),
        "Sentencia C-123 de 2023 site:corteconstitucional.gov.co"
    );
}

#[test]
fn test_legal_search_definition_schema() {
    let tool = LegalDocumentSearchTool::new(None, SearchLimits::default());
    let definition = tool.definition();
    assert_eq!(definition.name, "buscar_documento_legal");
    assert_eq!(definition.input_schema.required, vec!["query", "tipo_documento"]);
    assert_eq!(
        definition.input_schema.properties["tipo_documento"]["enum"],
        json!(["gaceta", "sentencia", "ley"])
    );
}

#[test]
fn test_status_line_uses_first_query() {
    let calls = vec![
        call("c1", "buscar_web", r#"{"query":"ley de víctimas"}"#),
        call("c2", "buscar_web", r#"{"query":"otra"}"#),
    ];
    assert_eq!(
        status_line(&calls).as_deref(),
        Some("Buscando: 'ley de víctimas'...")
    );
    assert_eq!(status_line(&[]), None);
}

#[tokio::test]
async fn test_dispatch_legal_search_applies_strategy() {
    let backend = Arc::new(CapturingBackend::with_hits(vec![hit("Gaceta 758", "Texto")]));
    let dispatcher = dispatcher(backend.clone());

    let output = dispatcher
        .dispatch(&call(
            "call_1",
            "buscar_documento_legal",
            r#"{"query":"758 de 2017","tipo_documento":"gaceta"}"#,
        ))
        .await;

    assert!(!output.is_error());
    assert_eq!(
        backend.queries(),
        vec!["\"Gaceta del Congreso\" 758 de 2017 filetype:pdf"]
    );
    let hits: Vec<SearchHit> = serde_json::from_str(output.output_text()).unwrap();
    assert_eq!(hits[0].title, "Gaceta 758");
}

#[tokio::test]
async fn test_dispatch_invalid_document_type() {
    let backend = Arc::new(CapturingBackend::default());
    let dispatcher = dispatcher(backend.clone());

    let output = dispatcher
        .dispatch(&call(
            "call_1",
            "buscar_documento_legal",
            r#"{"query":"Decreto 1072","tipo_documento":"decreto"}"#,
        ))
        .await;

    assert!(output.is_error());
    assert!(output.output_text().starts_with("Error ejecutando buscar_documento_legal"));
    assert!(backend.queries().is_empty());
}

#[tokio::test]
async fn test_dispatch_malformed_arguments() {
    let dispatcher = dispatcher(Arc::new(CapturingBackend::default()));
    let output = dispatcher
        .dispatch(&call("call_1", "buscar_web", "{query:"))
        .await;
    assert!(output.is_error());
    assert!(output.output_text().contains("argumentos inválidos"));
}

#[tokio::test]
async fn test_dispatch_all_keeps_order() {
    let backend = Arc::new(CapturingBackend::with_hits(vec![hit("a", "b")]));
    let dispatcher = dispatcher(backend.clone());

    let outputs = dispatcher
        .dispatch_all(&[
            call("c1", "buscar_web", r#"{"query":"uno"}"#),
            call("c2", "desconocida", "{}"),
            call("c3", "buscar_web", r#"{"query":"tres","sitio_preferido":"ramajudicial.gov.co"}"#),
        ])
        .await;

    let ids: Vec<&str> = outputs.iter().map(|o| o.tool_call_id.as_str()).collect();
    assert_eq!(ids, vec!["c1", "c2", "c3"]);
    assert_eq!(
        outputs[1].output,
        "Error: La herramienta desconocida no está disponible."
    );
    assert_eq!(backend.queries(), vec!["uno", "tres site:ramajudicial.gov.co"]);
}

#[tokio::test]
async fn test_web_search_without_backend() {
    let tool = WebSearchTool::new(None, SearchLimits::default());
    let result = tool
        .execute("call_1".to_string(), json!({"query": "tutela"}))
        .await
        .unwrap();
    assert!(result.is_error());
}

#[tokio::test]
async fn test_snippets_truncated_to_limit() {
    let long = "a".repeat(50);
    let backend = Arc::new(CapturingBackend::with_hits(vec![hit("larga", &long)]));
    let tool = WebSearchTool::new(
        Some(backend),
        SearchLimits {
            max_results: 1,
            snippet_chars: 10,
        },
    );

    let result = tool
        .execute("call_1".to_string(), json!({"query": "larga"}))
        .await
        .unwrap();
    let hits: Vec<SearchHit> = serde_json::from_str(result.output_text()).unwrap();
    assert_eq!(hits[0].snippet, "a".repeat(10));
}

#[tokio::test]
async fn test_tavily_backend_through_tool() {
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "query": "\"T-760 de 2008\" site:corteconstitucional.gov.co",
            "search_depth": "advanced"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {
                    "url": "https://www.corteconstitucional.gov.co/relatoria/2008/t-760-08.htm",
                    "title": "Sentencia T-760/08",
                    "content": "Derecho a la salud"
                }
            ]
        })))
        .mount(&mock_server)
        .await;

    let config = SearchConfig {
        base_url: mock_server.uri(),
        ..SearchConfig::default()
    };
    let backend: Arc<dyn SearchBackend> = Arc::new(TavilyClient::new("tvly-test", &config));
    let tool = WebSearchTool::new(Some(backend), SearchLimits::from(&config));

    let result = tool
        .execute(
            "call_1".to_string(),
            json!({"query": "\"T-760 de 2008\"", "sitio_preferido": "corteconstitucional.gov.co"}),
        )
        .await
        .unwrap();

    assert!(!result.is_error());
    assert!(result.output_text().contains("Sentencia T-760/08"));
}

#[tokio::test]
async fn test_tavily_server_error_becomes_tool_error() {
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&mock_server)
        .await;

    let config = SearchConfig {
        base_url: mock_server.uri(),
        ..SearchConfig::default()
    };
    let backend: Arc<dyn SearchBackend> = Arc::new(TavilyClient::new("tvly-test", &config));
    let tool = WebSearchTool::new(Some(backend), SearchLimits::from(&config));

    let result = tool
        .execute("call_1".to_string(), json!({"query": "reforma"}))
        .await
        .unwrap();
    assert!(result.is_error());
    assert!(result.output_text().contains("upstream down"));
}
