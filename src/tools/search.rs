// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Search backend used by the search tools
//!
//! The Tavily implementation performs an advanced-depth search and returns
//! ranked `{url, title, snippet}` hits.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::SearchConfig;
use crate::error::{ApiError, LeyiaError, Result};

/// Kind of legal document a search targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Gaceta,
    Sentencia,
    Ley,
}

impl DocumentType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "gaceta" => Some(DocumentType::Gaceta),
            "sentencia" => Some(DocumentType::Sentencia),
            "ley" => Some(DocumentType::Ley),
            _ => None,
        }
    }
}

/// A query sent to the search backend
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Final query text, strategy already applied
    pub query: String,
    /// Document type hint, if the caller knows it
    pub document_type: Option<DocumentType>,
    /// Maximum number of hits
    pub max_results: usize,
}

/// One ranked search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

/// External web/document search capability
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchHit>>;
}

/// Tavily search API client
pub struct TavilyClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl TavilyClient {
    pub fn new(api_key: impl Into<String>, config: &SearchConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: config.base_url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl SearchBackend for TavilyClient {
    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchHit>> {
        let body = TavilyRequest {
            query: &request.query,
            search_depth: "advanced",
            max_results: request.max_results,
            include_raw_content: false,
        };

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LeyiaError::Api(ApiError::Timeout)
                } else {
                    LeyiaError::Api(ApiError::Network(e.to_string()))
                }
            })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(match status {
                401 | 403 => LeyiaError::Api(ApiError::AuthenticationFailed),
                429 => LeyiaError::Api(ApiError::RateLimited(60)),
                _ => LeyiaError::Api(ApiError::ServerError { status, message }),
            });
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| LeyiaError::Api(ApiError::InvalidResponse(e.to_string())))?;

        Ok(parsed
            .results
            .into_iter()
            .map(|r| SearchHit {
                url: r.url.unwrap_or_default(),
                title: r.title.unwrap_or_default(),
                snippet: r.content.unwrap_or_default(),
            })
            .collect())
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    search_depth: &'static str,
    max_results: usize,
    include_raw_content: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: Option<String>,
    title: Option<String>,
    content: Option<String>,
}
