// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Document ingestion for LeyIA
//!
//! Extracts plain text from uploaded `.txt`, `.docx` and `.pdf` files. PDFs
//! whose text layer is too thin fall back to page-by-page OCR.

pub mod docx;
pub mod ocr;
pub mod pdf;

use std::sync::Arc;

use crate::config::IngestionConfig;
use crate::error::{IngestError, Result};

use ocr::{CommandOcrEngine, OcrEngine};
use pdf::{PdfExtractSource, PdfTextSource};

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Docx,
    Pdf,
}

impl DocumentKind {
    /// Detect the format from the filename suffix (case-insensitive)
    pub fn from_filename(filename: &str) -> Option<Self> {
        let lower = filename.to_lowercase();
        if lower.ends_with(".txt") {
            Some(DocumentKind::Text)
        } else if lower.ends_with(".docx") {
            Some(DocumentKind::Docx)
        } else if lower.ends_with(".pdf") {
            Some(DocumentKind::Pdf)
        } else {
            None
        }
    }
}

/// OCR progress: `page` of `total` pages being recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestProgress {
    pub page: usize,
    pub total: usize,
}

/// Text extracted from one upload
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDocument {
    pub text: String,
    pub kind: DocumentKind,
    pub ocr_used: bool,
    pub truncated: bool,
    /// Pages recognized by OCR (zero when OCR did not run)
    pub pages_processed: usize,
}

/// Extraction pipeline with pluggable PDF and OCR backends
pub struct DocumentExtractor {
    pdf: Arc<dyn PdfTextSource>,
    ocr: Option<Arc<dyn OcrEngine>>,
    config: IngestionConfig,
}

impl DocumentExtractor {
    /// Default backends: `pdf-extract` and the command-line OCR tools
    pub fn new(config: IngestionConfig) -> Self {
        let ocr: Option<Arc<dyn OcrEngine>> = if config.enable_ocr {
            Some(Arc::new(CommandOcrEngine::new(&config)))
        } else {
            None
        };
        Self::with_engines(config, Arc::new(PdfExtractSource), ocr)
    }

    pub fn with_engines(
        config: IngestionConfig,
        pdf: Arc<dyn PdfTextSource>,
        ocr: Option<Arc<dyn OcrEngine>>,
    ) -> Self {
        Self { pdf, ocr, config }
    }

    /// Extract text from an upload. Fails rather than returning empty text.
    pub async fn extract_text(
        &self,
        bytes: &[u8],
        filename: &str,
        progress: &(dyn Fn(IngestProgress) + Send + Sync),
    ) -> Result<ExtractedDocument> {
        let kind = DocumentKind::from_filename(filename)
            .ok_or_else(|| IngestError::UnsupportedFormat(filename.to_string()))?;

        tracing::info!(target: "leyia.ingest", filename, ?kind, bytes = bytes.len(), "extracting text");

        let mut document = ExtractedDocument {
            text: String::new(),
            kind,
            ocr_used: false,
            truncated: false,
            pages_processed: 0,
        };

        match kind {
            DocumentKind::Text => {
                document.text = String::from_utf8_lossy(bytes).trim().to_string();
            }
            DocumentKind::Docx => {
                let owned = bytes.to_vec();
                let paragraphs = tokio::task::spawn_blocking(move || docx::extract_paragraphs(&owned))
                    .await
                    .map_err(|e| IngestError::Docx(e.to_string()))??;
                document.text = paragraphs.join("\n").trim().to_string();
            }
            DocumentKind::Pdf => {
                self.extract_pdf(bytes, filename, progress, &mut document)
                    .await?;
            }
        }

        if document.text.is_empty() {
            return Err(IngestError::EmptyExtraction(filename.to_string()).into());
        }
        Ok(document)
    }

    async fn extract_pdf(
        &self,
        bytes: &[u8],
        filename: &str,
        progress: &(dyn Fn(IngestProgress) + Send + Sync),
        document: &mut ExtractedDocument,
    ) -> Result<()> {
        let source = Arc::clone(&self.pdf);
        let owned = bytes.to_vec();
        let direct = match tokio::task::spawn_blocking(move || source.extract_text(&owned)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!(target: "leyia.ingest", filename, error = %e, "direct PDF extraction failed");
                String::new()
            }
            Err(e) => {
                tracing::warn!(target: "leyia.ingest", filename, error = %e, "direct PDF extraction panicked");
                String::new()
            }
        };

        let direct = direct.trim();
        if direct.chars().count() >= self.config.min_pdf_text_chars {
            document.text = direct.to_string();
            return Ok(());
        }

        let Some(engine) = self.ocr.as_ref().filter(|_| self.config.enable_ocr) else {
            return Err(IngestError::ScannedPdf(filename.to_string()).into());
        };

        tracing::warn!(
            target: "leyia.ingest",
            filename,
            chars = direct.chars().count(),
            "minimal text layer, falling back to OCR"
        );

        let output = ocr::run_ocr(
            &**engine,
            bytes,
            self.config.ocr_max_pages,
            progress,
        )
        .await?;

        let mut text = output.text.trim().to_string();
        if text.is_empty() {
            return Err(IngestError::EmptyExtraction(filename.to_string()).into());
        }
        if output.truncated() {
            text.push_str("\n\n");
            text.push_str(&ocr::truncation_note(
                output.pages_processed,
                output.total_pages,
            ));
        }

        document.text = text;
        document.ocr_used = true;
        document.truncated = output.truncated();
        document.pages_processed = output.pages_processed;
        Ok(())
    }
}
