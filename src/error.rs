// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for LeyIA
//!
//! This module defines all error types used throughout the engine.

use thiserror::Error;

/// Main error type for LeyIA operations
#[derive(Error, Debug)]
pub enum LeyiaError {
    /// Assistant service errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Document ingestion errors
    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    /// Tool execution errors
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A file with the same name is already registered in the session
    #[error("File '{0}' was already uploaded")]
    DuplicateFile(String),

    /// The file handle is not registered in the session
    #[error("Unknown file handle: {0}")]
    UnknownFile(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Session errors
    #[error("Session error: {0}")]
    Session(String),
}

/// Assistant service error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Authentication failed (invalid API key)
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    /// Rate limited by the API
    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u32),

    /// The remote resource (thread, run, file) does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid response from API
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// API returned an error
    #[error("API error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Timeout waiting for response
    #[error("Request timed out")]
    Timeout,

    /// Streaming error
    #[error("Streaming error: {0}")]
    StreamError(String),
}

/// Document ingestion error types
#[derive(Error, Debug)]
pub enum IngestError {
    /// The file suffix is not one of the supported formats
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// PDF without a usable text layer while OCR is disabled
    #[error("'{0}' looks scanned or has no digital text")]
    ScannedPdf(String),

    /// Nothing could be extracted from the document
    #[error("No text could be extracted from '{0}'")]
    EmptyExtraction(String),

    /// DOCX container or XML could not be read
    #[error("Invalid DOCX: {0}")]
    Docx(String),

    /// PDF text layer could not be read
    #[error("Invalid PDF: {0}")]
    Pdf(String),

    /// Rasterization or recognition failed
    #[error("OCR failed: {0}")]
    Ocr(String),
}

impl ApiError {
    /// Whether this error means the remote resource no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

impl LeyiaError {
    /// Whether this error is the remote "not found" condition used for stale threads.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LeyiaError::Api(api) if api.is_not_found())
    }

    /// Whether this error is a timeout of any kind.
    pub fn is_timeout(&self) -> bool {
        matches!(self, LeyiaError::Api(ApiError::Timeout))
    }
}

/// Result type alias for LeyIA operations
pub type Result<T> = std::result::Result<T, LeyiaError>;

impl From<tokio::time::error::Elapsed> for LeyiaError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        LeyiaError::Api(ApiError::Timeout)
    }
}
