// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! OpenAI Assistants API implementation
//!
//! Implements `AssistantService` and `FileStore` over the Assistants v2
//! HTTP API, decoding streamed runs from server-sent events.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ApiError, LeyiaError, Result};
use crate::llm::assistant::{
    AssistantService, FileStore, MessageRequest, RunEvent, RunEventStream, RunRequest, RunTool,
    ToolCallRequest, ToolOutput, Usage,
};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// Assistants v2 client
pub struct OpenAiAssistantClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiAssistantClient {
    /// Create a new client against the public API
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, OPENAI_API_URL)
    }

    /// Create with a custom base URL
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", &self.api_key))
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        if !(200..300).contains(&status) {
            return Err(Self::parse_error(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| LeyiaError::Api(ApiError::InvalidResponse(e.to_string())))
    }

    async fn open_stream(&self, builder: RequestBuilder) -> Result<RunEventStream> {
        let response = builder.header("Accept", "text/event-stream").send().await?;
        let status = response.status().as_u16();

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status, &body));
        }

        Ok(Box::pin(decode_sse_stream(response.bytes_stream())))
    }

    /// Parse an error response
    fn parse_error(status: u16, body: &str) -> LeyiaError {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());

        let api_error = match status {
            401 => ApiError::AuthenticationFailed,
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited(60),
            _ => ApiError::ServerError { status, message },
        };
        LeyiaError::Api(api_error)
    }
}

#[async_trait]
impl AssistantService for OpenAiAssistantClient {
    async fn create_thread(&self) -> Result<String> {
        let thread: IdObject = self
            .send_json(self.request(Method::POST, "/threads").json(&json!({})))
            .await?;
        tracing::debug!(target: "leyia.llm.openai", thread_id = %thread.id, "created thread");
        Ok(thread.id)
    }

    async fn retrieve_thread(&self, thread_id: &str) -> Result<()> {
        let _: IdObject = self
            .send_json(self.request(Method::GET, &format!("/threads/{}", thread_id)))
            .await?;
        Ok(())
    }

    async fn create_message(&self, thread_id: &str, request: MessageRequest) -> Result<String> {
        let body = CreateMessageBody {
            role: "user",
            content: &request.content,
            attachments: request
                .attachments
                .iter()
                .map(|a| AttachmentBody {
                    file_id: &a.file_id,
                    tools: [TypeTag {
                        kind: "file_search",
                    }],
                })
                .collect(),
        };
        let message: IdObject = self
            .send_json(
                self.request(Method::POST, &format!("/threads/{}/messages", thread_id))
                    .json(&body),
            )
            .await?;
        Ok(message.id)
    }

    async fn create_run_stream(
        &self,
        thread_id: &str,
        request: RunRequest,
    ) -> Result<RunEventStream> {
        let body = json!({
            "assistant_id": request.assistant_id,
            "tools": request.tools.iter().map(run_tool_json).collect::<Vec<_>>(),
            "stream": true,
        });
        self.open_stream(
            self.request(Method::POST, &format!("/threads/{}/runs", thread_id))
                .json(&body),
        )
        .await
    }

    async fn submit_tool_outputs_stream(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<RunEventStream> {
        let body = json!({ "tool_outputs": outputs, "stream": true });
        self.open_stream(
            self.request(
                Method::POST,
                &format!("/threads/{}/runs/{}/submit_tool_outputs", thread_id, run_id),
            )
            .json(&body),
        )
        .await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<()> {
        let _: RunObject = self
            .send_json(self.request(
                Method::POST,
                &format!("/threads/{}/runs/{}/cancel", thread_id, run_id),
            ))
            .await?;
        Ok(())
    }

    async fn retrieve_run_usage(&self, thread_id: &str, run_id: &str) -> Result<Option<Usage>> {
        let run: RunObject = self
            .send_json(self.request(
                Method::GET,
                &format!("/threads/{}/runs/{}", thread_id, run_id),
            ))
            .await?;
        Ok(run.usage)
    }

    async fn assistant_model(&self, assistant_id: &str) -> Result<String> {
        let assistant: AssistantObject = self
            .send_json(self.request(Method::GET, &format!("/assistants/{}", assistant_id)))
            .await?;
        Ok(assistant.model)
    }
}

#[async_trait]
impl FileStore for OpenAiAssistantClient {
    async fn create_file(&self, bytes: Vec<u8>, filename: &str, purpose: &str) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .text("purpose", purpose.to_string())
            .part("file", part);
        let file: IdObject = self
            .send_json(self.request(Method::POST, "/files").multipart(form))
            .await?;
        tracing::debug!(target: "leyia.llm.openai", file_id = %file.id, filename, "uploaded file");
        Ok(file.id)
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        let _: Value = self
            .send_json(self.request(Method::DELETE, &format!("/files/{}", file_id)))
            .await?;
        Ok(())
    }
}

fn run_tool_json(tool: &RunTool) -> Value {
    match tool {
        RunTool::Function(def) => json!({
            "type": "function",
            "function": {
                "name": def.name,
                "description": def.description,
                "parameters": def.input_schema,
            }
        }),
        RunTool::FileSearch => json!({ "type": "file_search" }),
    }
}

/// Turn a byte stream into run events. A final `None` flushes a trailing
/// event that was not terminated by a blank line.
fn decode_sse_stream<S, B, E>(bytes: S) -> impl Stream<Item = Result<RunEvent>> + Send
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    bytes
        .map(Some)
        .chain(futures::stream::once(async { None }))
        .scan(SseDecoder::default(), |decoder, item| {
            let events = match item {
                Some(Ok(chunk)) => decoder.push(chunk.as_ref()),
                Some(Err(e)) => vec![Err(LeyiaError::Api(ApiError::StreamError(e.to_string())))],
                None => decoder.finish(),
            };
            futures::future::ready(Some(events))
        })
        .flat_map(futures::stream::iter)
}

/// Incremental server-sent event decoder.
///
/// Lines are split on raw bytes so multi-byte characters cut across network
/// chunks are decoded intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed a chunk and return every event it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<RunEvent>> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            let line = line.trim_end_matches('\r');

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            if let Some(name) = line.strip_prefix("event:") {
                self.event = Some(name.trim().to_string());
            } else if let Some(data) = line.strip_prefix("data:") {
                self.data
                    .push(data.strip_prefix(' ').unwrap_or(data).to_string());
            }
        }

        events
    }

    /// Flush whatever is buffered at end of stream
    pub fn finish(&mut self) -> Vec<Result<RunEvent>> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            events.extend(self.push(b"\n"));
        }
        if let Some(event) = self.dispatch() {
            events.push(event);
        }
        events
    }

    fn dispatch(&mut self) -> Option<Result<RunEvent>> {
        let name = self.event.take();
        if name.is_none() && self.data.is_empty() {
            return None;
        }
        let data = self.data.join("\n");
        self.data.clear();
        Some(decode_event(name.as_deref().unwrap_or("message"), &data))
    }
}

/// Map one named event and its JSON payload to a `RunEvent`
pub fn decode_event(name: &str, data: &str) -> Result<RunEvent> {
    match name {
        "done" => Ok(RunEvent::Done),
        "error" => {
            let message = serde_json::from_str::<ErrorEnvelope>(data)
                .map(|e| e.error.message)
                .or_else(|_| serde_json::from_str::<ErrorBody>(data).map(|e| e.message))
                .unwrap_or_else(|_| data.to_string());
            Ok(RunEvent::Error { message })
        }
        "thread.message.delta" => {
            let delta: MessageDeltaObject = parse_payload(name, data)?;
            let text: String = delta
                .delta
                .content
                .into_iter()
                .filter_map(|part| part.text.map(|t| t.value))
                .collect();
            if text.is_empty() {
                Ok(RunEvent::Other {
                    event: name.to_string(),
                })
            } else {
                Ok(RunEvent::MessageDelta { text })
            }
        }
        _ if name.starts_with("thread.run.step.") => Ok(RunEvent::Other {
            event: name.to_string(),
        }),
        _ if name.starts_with("thread.run.") => {
            let run: RunObject = parse_payload(name, data)?;
            Ok(match name {
                "thread.run.requires_action" => RunEvent::RequiresAction {
                    tool_calls: run
                        .required_action
                        .map(|action| {
                            action
                                .submit_tool_outputs
                                .tool_calls
                                .into_iter()
                                .map(|call| ToolCallRequest {
                                    id: call.id,
                                    name: call.function.name,
                                    arguments: call.function.arguments,
                                })
                                .collect()
                        })
                        .unwrap_or_default(),
                    run_id: run.id,
                },
                "thread.run.completed" => RunEvent::Completed {
                    run_id: run.id,
                    usage: run.usage,
                },
                "thread.run.failed" | "thread.run.expired" | "thread.run.incomplete" => {
                    RunEvent::Failed {
                        message: run
                            .last_error
                            .map(|e| e.message)
                            .unwrap_or_else(|| run.status.unwrap_or_else(|| name.to_string())),
                        run_id: run.id,
                    }
                }
                "thread.run.cancelled" => RunEvent::Cancelled { run_id: run.id },
                _ => RunEvent::RunStatus {
                    status: run
                        .status
                        .unwrap_or_else(|| name.trim_start_matches("thread.run.").to_string()),
                    run_id: run.id,
                },
            })
        }
        _ => Ok(RunEvent::Other {
            event: name.to_string(),
        }),
    }
}

fn parse_payload<T: DeserializeOwned>(name: &str, data: &str) -> Result<T> {
    serde_json::from_str(data).map_err(|e| {
        LeyiaError::Api(ApiError::InvalidResponse(format!(
            "malformed '{}' event: {}",
            name, e
        )))
    })
}

// Assistants API wire types

#[derive(Debug, Serialize)]
struct CreateMessageBody<'a> {
    role: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<AttachmentBody<'a>>,
}

#[derive(Debug, Serialize)]
struct AttachmentBody<'a> {
    file_id: &'a str,
    tools: [TypeTag; 1],
}

#[derive(Debug, Serialize)]
struct TypeTag {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct IdObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AssistantObject {
    model: String,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    last_error: Option<ErrorBody>,
    #[serde(default)]
    required_action: Option<RequiredAction>,
}

#[derive(Debug, Deserialize)]
struct RequiredAction {
    submit_tool_outputs: SubmitToolOutputs,
}

#[derive(Debug, Deserialize)]
struct SubmitToolOutputs {
    tool_calls: Vec<ToolCallObject>,
}

#[derive(Debug, Deserialize)]
struct ToolCallObject {
    id: String,
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaObject {
    delta: MessageDelta,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    #[serde(default)]
    content: Vec<DeltaContent>,
}

#[derive(Debug, Deserialize)]
struct DeltaContent {
    #[serde(default)]
    text: Option<DeltaText>,
}

#[derive(Debug, Deserialize)]
struct DeltaText {
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::assistant::{ToolDefinition, ToolInputSchema};

    fn decode_all(chunks: &[&[u8]]) -> Vec<RunEvent> {
        let mut decoder = SseDecoder::default();
        let mut events = Vec::new();
        for chunk in chunks {
            events.extend(decoder.push(chunk));
        }
        events.extend(decoder.finish());
        events.into_iter().map(|e| e.unwrap()).collect()
    }

    fn delta_frame(text: &str) -> String {
        format!(
            "event: thread.message.delta\ndata: {}\n\n",
            json!({"id": "msg_1", "delta": {"content": [{"index": 0, "type": "text", "text": {"value": text}}]}})
        )
    }

    // ===== Decoder Tests =====

    #[test]
    fn test_decode_message_delta() {
        let events = decode_all(&[delta_frame("Hola").as_bytes()]);
        assert_eq!(
            events,
            vec![RunEvent::MessageDelta {
                text: "Hola".to_string()
            }]
        );
    }

    #[test]
    fn test_decode_multibyte_split_across_chunks() {
        let frame = delta_frame("artículo");
        let bytes = frame.as_bytes();
        let split = frame.find('í').unwrap() + 1;
        let events = decode_all(&[&bytes[..split], &bytes[split..]]);
        assert_eq!(
            events,
            vec![RunEvent::MessageDelta {
                text: "artículo".to_string()
            }]
        );
    }

    #[test]
    fn test_decode_requires_action() {
        let frame = format!(
            "event: thread.run.requires_action\ndata: {}\n\n",
            json!({
                "id": "run_1",
                "status": "requires_action",
                "required_action": {
                    "type": "submit_tool_outputs",
                    "submit_tool_outputs": {"tool_calls": [
                        {"id": "call_1", "type": "function", "function": {"name": "buscar_web", "arguments": "{\"query\":\"tutela\"}"}}
                    ]}
                }
            })
        );
        let events = decode_all(&[frame.as_bytes()]);
        match &events[0] {
            RunEvent::RequiresAction { run_id, tool_calls } => {
                assert_eq!(run_id, "run_1");
                assert_eq!(tool_calls.len(), 1);
                assert_eq!(tool_calls[0].name, "buscar_web");
                assert!(tool_calls[0].arguments.contains("tutela"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_decode_completed_with_usage() {
        let frame = format!(
            "event: thread.run.completed\ndata: {}\n\n",
            json!({"id": "run_1", "status": "completed", "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}})
        );
        let events = decode_all(&[frame.as_bytes()]);
        assert_eq!(
            events,
            vec![RunEvent::Completed {
                run_id: "run_1".to_string(),
                usage: Some(Usage::new(10, 5))
            }]
        );
    }

    #[test]
    fn test_decode_failed_uses_last_error() {
        let frame = format!(
            "event: thread.run.failed\ndata: {}\n\n",
            json!({"id": "run_1", "status": "failed", "last_error": {"code": "server_error", "message": "boom"}})
        );
        let events = decode_all(&[frame.as_bytes()]);
        assert_eq!(
            events,
            vec![RunEvent::Failed {
                run_id: "run_1".to_string(),
                message: "boom".to_string()
            }]
        );
    }

    #[test]
    fn test_decode_status_step_and_done() {
        let body = format!(
            "event: thread.run.created\ndata: {}\n\nevent: thread.run.step.created\ndata: {}\n\n: keep-alive\n\nevent: done\ndata: [DONE]\n\n",
            json!({"id": "run_7", "status": "queued"}),
            json!({"id": "step_1"})
        );
        let events = decode_all(&[body.as_bytes()]);
        assert_eq!(
            events,
            vec![
                RunEvent::RunStatus {
                    run_id: "run_7".to_string(),
                    status: "queued".to_string()
                },
                RunEvent::Other {
                    event: "thread.run.step.created".to_string()
                },
                RunEvent::Done,
            ]
        );
    }

    #[test]
    fn test_decode_trailing_event_without_blank_line() {
        let events = decode_all(&[b"event: done\ndata: [DONE]".as_slice()]);
        assert_eq!(events, vec![RunEvent::Done]);
    }

    #[test]
    fn test_decode_error_event() {
        let events = decode_all(&[b"event: error\ndata: {\"error\": {\"message\": \"overloaded\"}}\n\n".as_slice()]);
        assert_eq!(
            events,
            vec![RunEvent::Error {
                message: "overloaded".to_string()
            }]
        );
    }

    #[test]
    fn test_decode_malformed_run_payload_is_error() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b"event: thread.run.completed\ndata: not-json\n\n");
        assert!(events[0].is_err());
    }

    // ===== Error Mapping Tests =====

    #[test]
    fn test_parse_error_not_found() {
        let err = OpenAiAssistantClient::parse_error(
            404,
            r#"{"error": {"message": "No thread found with id 'thread_x'.", "type": "invalid_request_error"}}"#,
        );
        assert!(err.is_not_found());
        assert!(err.to_string().contains("thread_x"));
    }

    #[test]
    fn test_parse_error_authentication_and_rate_limit() {
        assert!(matches!(
            OpenAiAssistantClient::parse_error(401, "{}"),
            LeyiaError::Api(ApiError::AuthenticationFailed)
        ));
        assert!(matches!(
            OpenAiAssistantClient::parse_error(429, "{}"),
            LeyiaError::Api(ApiError::RateLimited(_))
        ));
    }

    #[test]
    fn test_parse_error_plain_body() {
        let err = OpenAiAssistantClient::parse_error(502, "bad gateway");
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("bad gateway"));
    }

    #[test]
    fn test_run_tool_json() {
        let def = ToolDefinition {
            name: "buscar_web".to_string(),
            description: "Busca".to_string(),
            input_schema: ToolInputSchema {
                schema_type: "object".to_string(),
                properties: json!({"query": {"type": "string"}}),
                required: vec!["query".to_string()],
            },
        };
        let value = run_tool_json(&RunTool::Function(def));
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["name"], "buscar_web");
        assert_eq!(value["function"]["parameters"]["required"][0], "query");
        assert_eq!(run_tool_json(&RunTool::FileSearch)["type"], "file_search");
    }

    // ===== HTTP Tests =====

    #[tokio::test]
    async fn test_create_thread_sends_beta_header() {
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads"))
            .and(header("OpenAI-Beta", "assistants=v2"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "thread_abc"})))
            .mount(&mock_server)
            .await;

        let client = OpenAiAssistantClient::with_base_url("sk-test", mock_server.uri());
        assert_eq!(client.create_thread().await.unwrap(), "thread_abc");
    }

    #[tokio::test]
    async fn test_retrieve_missing_thread_is_not_found() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_gone"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"error": {"message": "No thread found"}})),
            )
            .mount(&mock_server)
            .await;

        let client = OpenAiAssistantClient::with_base_url("sk-test", mock_server.uri());
        let err = client.retrieve_thread("thread_gone").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_message_sends_attachments() {
        use wiremock::matchers::{body_partial_json, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/messages"))
            .and(body_partial_json(json!({
                "role": "user",
                "attachments": [{"file_id": "file_1", "tools": [{"type": "file_search"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "msg_1"})))
            .mount(&mock_server)
            .await;

        let client = OpenAiAssistantClient::with_base_url("sk-test", mock_server.uri());
        let request = MessageRequest::new("hola").with_attachments(["file_1"]);
        assert_eq!(
            client.create_message("thread_1", request).await.unwrap(),
            "msg_1"
        );
    }

    #[tokio::test]
    async fn test_create_run_stream_decodes_events() {
        use wiremock::matchers::{body_partial_json, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let body = format!(
            "event: thread.run.created\ndata: {}\n\n{}event: thread.run.completed\ndata: {}\n\nevent: done\ndata: [DONE]\n\n",
            json!({"id": "run_1", "status": "queued"}),
            delta_frame("Respuesta"),
            json!({"id": "run_1", "status": "completed", "usage": {"prompt_tokens": 3, "completion_tokens": 4}})
        );

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/runs"))
            .and(body_partial_json(json!({"assistant_id": "asst_1", "stream": true})))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "text/event-stream"),
            )
            .mount(&mock_server)
            .await;

        let client = OpenAiAssistantClient::with_base_url("sk-test", mock_server.uri());
        let stream = client
            .create_run_stream("thread_1", RunRequest::new("asst_1"))
            .await
            .unwrap();
        let events: Vec<RunEvent> = stream.map(|e| e.unwrap()).collect().await;

        assert_eq!(events.len(), 4);
        assert_eq!(
            events[1],
            RunEvent::MessageDelta {
                text: "Respuesta".to_string()
            }
        );
        assert_eq!(
            events[2],
            RunEvent::Completed {
                run_id: "run_1".to_string(),
                usage: Some(Usage::new(3, 4))
            }
        );
    }

    #[tokio::test]
    async fn test_retrieve_run_usage_and_model() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/runs/run_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"id": "run_1", "status": "completed", "usage": {"prompt_tokens": 7, "completion_tokens": 8}}),
            ))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/assistants/asst_1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "asst_1", "model": "gpt-4o"})),
            )
            .mount(&mock_server)
            .await;

        let client = OpenAiAssistantClient::with_base_url("sk-test", mock_server.uri());
        assert_eq!(
            client.retrieve_run_usage("thread_1", "run_1").await.unwrap(),
            Some(Usage::new(7, 8))
        );
        assert_eq!(client.assistant_model("asst_1").await.unwrap(), "gpt-4o");
    }

    #[tokio::test]
    async fn test_file_upload_and_delete() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "file_9"})))
            .mount(&mock_server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/files/file_9"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "file_9", "deleted": true})),
            )
            .mount(&mock_server)
            .await;

        let client = OpenAiAssistantClient::with_base_url("sk-test", mock_server.uri());
        let id = client
            .create_file(b"texto".to_vec(), "ley_processed.txt", "assistants")
            .await
            .unwrap();
        assert_eq!(id, "file_9");
        client.delete_file("file_9").await.unwrap();
    }
}
