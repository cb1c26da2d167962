// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Direct PDF text-layer extraction

use crate::error::{IngestError, Result};

/// Source of a PDF's embedded text layer. Implementations are blocking and
/// are run on the blocking pool by the extractor.
pub trait PdfTextSource: Send + Sync {
    fn extract_text(&self, bytes: &[u8]) -> Result<String>;
}

/// Text layer extraction backed by `pdf-extract`
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractSource;

impl PdfTextSource for PdfExtractSource {
    fn extract_text(&self, bytes: &[u8]) -> Result<String> {
        pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| IngestError::Pdf(e.to_string()).into())
    }
}

