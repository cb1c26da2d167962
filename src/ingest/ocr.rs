// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! OCR fallback for scanned PDFs
//!
//! Pages are rasterized one at a time and recognized individually. All
//! scratch files live in a temporary directory that is removed on drop, and
//! child processes are killed on drop, so abandoning an OCR run leaves
//! nothing behind.

use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::config::IngestionConfig;
use crate::error::{IngestError, Result};

use super::IngestProgress;

/// Rasterization and recognition service
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Number of pages in the PDF at `pdf_path`
    async fn page_count(&self, pdf_path: &Path) -> Result<usize>;

    /// Render one page (1-based) to an image inside `out_dir`
    async fn rasterize_page(&self, pdf_path: &Path, page: usize, out_dir: &Path)
        -> Result<PathBuf>;

    /// Recognize the text in one page image
    async fn recognize(&self, image_path: &Path) -> Result<String>;
}

/// OCR through the `pdfinfo`, `pdftoppm` and `tesseract` command-line tools
#[derive(Debug, Clone)]
pub struct CommandOcrEngine {
    pdfinfo: String,
    pdftoppm: String,
    tesseract: String,
    dpi: u32,
    language: String,
}

impl CommandOcrEngine {
    pub fn new(config: &IngestionConfig) -> Self {
        Self {
            pdfinfo: config.pdfinfo_path.clone(),
            pdftoppm: config.pdftoppm_path.clone(),
            tesseract: config.tesseract_path.clone(),
            dpi: config.ocr_dpi,
            language: config.ocr_language.clone(),
        }
    }

    async fn run(program: &str, args: &[&str]) -> Result<Vec<u8>> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| IngestError::Ocr(format!("failed to run '{}': {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(IngestError::Ocr(format!(
                "'{}' exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            ))
            .into());
        }
        Ok(output.stdout)
    }
}

/// Parse the page count out of `pdfinfo` output
pub fn parse_page_count(pdfinfo_output: &str) -> Option<usize> {
    let re = Regex::new(r"(?m)^Pages:\s+(\d+)").ok()?;
    re.captures(pdfinfo_output)?.get(1)?.as_str().parse().ok()
}

#[async_trait]
impl OcrEngine for CommandOcrEngine {
    async fn page_count(&self, pdf_path: &Path) -> Result<usize> {
        let path = pdf_path.to_string_lossy();
        let stdout = Self::run(&self.pdfinfo, &[path.as_ref()]).await?;
        parse_page_count(&String::from_utf8_lossy(&stdout))
            .ok_or_else(|| IngestError::Ocr("pdfinfo reported no page count".to_string()).into())
    }

    async fn rasterize_page(
        &self,
        pdf_path: &Path,
        page: usize,
        out_dir: &Path,
    ) -> Result<PathBuf> {
        let prefix = out_dir.join(format!("page-{}", page));
        let dpi = self.dpi.to_string();
        let page_arg = page.to_string();
        let pdf = pdf_path.to_string_lossy();
        let prefix_arg = prefix.to_string_lossy();
        Self::run(
            &self.pdftoppm,
            &[
                "-r",
                &dpi,
                "-f",
                &page_arg,
                "-l",
                &page_arg,
                "-png",
                "-singlefile",
                pdf.as_ref(),
                prefix_arg.as_ref(),
            ],
        )
        .await?;
        Ok(prefix.with_extension("png"))
    }

    async fn recognize(&self, image_path: &Path) -> Result<String> {
        let image = image_path.to_string_lossy();
        let stdout = Self::run(
            &self.tesseract,
            &[image.as_ref(), "stdout", "-l", &self.language],
        )
        .await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

/// Result of an OCR pass
#[derive(Debug, Clone, PartialEq)]
pub struct OcrOutput {
    /// Recognized text, pages separated by newlines
    pub text: String,
    /// Pages actually recognized
    pub pages_processed: usize,
    /// Pages in the document
    pub total_pages: usize,
}

impl OcrOutput {
    pub fn truncated(&self) -> bool {
        self.pages_processed < self.total_pages
    }
}

/// Run OCR over at most `max_pages` pages, reporting progress before each page
pub async fn run_ocr(
    engine: &dyn OcrEngine,
    pdf_bytes: &[u8],
    max_pages: usize,
    progress: &(dyn Fn(IngestProgress) + Send + Sync),
) -> Result<OcrOutput> {
    let scratch = tempfile::TempDir::new()?;
    let pdf_path = scratch.path().join("input.pdf");
    tokio::fs::write(&pdf_path, pdf_bytes).await?;

    let total_pages = engine.page_count(&pdf_path).await?;
    let pages = total_pages.min(max_pages);
    let mut text = String::new();

    for page in 1..=pages {
        tracing::debug!(target: "leyia.ingest", page, pages, "recognizing page");
        progress(IngestProgress { page, total: pages });

        let image = engine
            .rasterize_page(&pdf_path, page, scratch.path())
            .await?;
        let page_text = engine.recognize(&image).await?;
        text.push_str(&page_text);
        text.push('\n');

        if let Err(e) = tokio::fs::remove_file(&image).await {
            tracing::debug!(target: "leyia.ingest", error = %e, "could not remove page image");
        }
    }

    Ok(OcrOutput {
        text,
        pages_processed: pages,
        total_pages,
    })
}

/// Note appended when the page cap cut the document short
pub fn truncation_note(processed: usize, total: usize) -> String {
    format!(
        "[Nota: el documento tiene {} páginas; solo se procesaron las primeras {} mediante OCR.]",
        total, processed
    )
}
