// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! File lifecycle management
//!
//! Uploads go through text extraction and are stored remotely as plain
//! text. Local state is authoritative: a handle leaves the registry before
//! its remote delete is issued, and a failed remote delete is never rolled
//! back.

mod registry;

pub use registry::{FileHandle, FileRegistry};

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::chat::events::{EventEmitter, SessionEvent};
use crate::chat::state::SharedState;
use crate::error::{LeyiaError, Result};
use crate::ingest::{DocumentExtractor, IngestProgress};
use crate::llm::assistant::FileStore;

const UPLOAD_PURPOSE: &str = "assistants";

pub struct FileLifecycleManager {
    store: Arc<dyn FileStore>,
    extractor: Arc<DocumentExtractor>,
    state: SharedState,
    events: EventEmitter,
    max_age: Duration,
    uploads_in_flight: Arc<AtomicUsize>,
}

/// Decrements the in-flight upload count when a registration ends or is dropped
struct UploadGuard(Arc<AtomicUsize>);

impl UploadGuard {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Remote name for the extracted text of `filename`
pub fn processed_name(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    format!("{}_processed.txt", stem)
}

impl FileLifecycleManager {
    pub fn new(
        store: Arc<dyn FileStore>,
        extractor: Arc<DocumentExtractor>,
        state: SharedState,
        events: EventEmitter,
        max_age: Duration,
    ) -> Self {
        Self {
            store,
            extractor,
            state,
            events,
            max_age,
            uploads_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Whether a registration is in progress
    pub fn is_uploading(&self) -> bool {
        self.uploads_in_flight.load(Ordering::SeqCst) > 0
    }

    /// Extract, upload and record one document
    pub async fn register(
        &self,
        bytes: &[u8],
        filename: &str,
        progress: &(dyn Fn(IngestProgress) + Send + Sync),
    ) -> Result<FileHandle> {
        if self.state.lock().await.files.contains_filename(filename) {
            return Err(LeyiaError::DuplicateFile(filename.to_string()));
        }

        let _guard = UploadGuard::new(&self.uploads_in_flight);

        let document = self.extractor.extract_text(bytes, filename, progress).await?;
        if document.ocr_used {
            tracing::info!(
                target: "leyia.files",
                filename,
                pages = document.pages_processed,
                truncated = document.truncated,
                "document recognized with OCR"
            );
        }

        let remote_name = processed_name(filename);
        let id = self
            .store
            .create_file(document.text.into_bytes(), &remote_name, UPLOAD_PURPOSE)
            .await?;
        let handle = FileHandle::new(id, filename);

        let files = {
            let mut state = self.state.lock().await;
            if state.files.contains_filename(filename) {
                None
            } else {
                state.files.insert(handle.clone());
                Some(state.files.uploaded().to_vec())
            }
        };

        let Some(files) = files else {
            // A concurrent upload of the same name won the race
            self.delete_remote(&handle).await;
            return Err(LeyiaError::DuplicateFile(filename.to_string()));
        };

        tracing::info!(target: "leyia.files", filename, file_id = %handle.id, "file registered");
        self.events.emit(SessionEvent::FilesChanged { files });
        Ok(handle)
    }

    /// Register several documents independently; one failure does not stop the rest
    pub async fn register_batch(
        &self,
        uploads: Vec<(String, Vec<u8>)>,
        progress: &(dyn Fn(&str, IngestProgress) + Send + Sync),
    ) -> Vec<(String, Result<FileHandle>)> {
        let mut results = Vec::with_capacity(uploads.len());
        for (filename, bytes) in uploads {
            let result = self
                .register(&bytes, &filename, &|p| progress(&filename, p))
                .await;
            if let Err(ref e) = result {
                tracing::warn!(target: "leyia.files", filename = %filename, error = %e, "upload failed");
            }
            results.push((filename, result));
        }
        results
    }

    /// Forget a handle locally, then delete it remotely.
    /// A remote failure is returned but the handle stays forgotten.
    pub async fn delete(&self, file_id: &str) -> Result<FileHandle> {
        let (handle, files) = {
            let mut state = self.state.lock().await;
            let handle = state
                .files
                .remove(file_id)
                .ok_or_else(|| LeyiaError::UnknownFile(file_id.to_string()))?;
            (handle, state.files.uploaded().to_vec())
        };
        self.events.emit(SessionEvent::FilesChanged { files });

        self.store.delete_file(&handle.id).await.map_err(|e| {
            tracing::warn!(target: "leyia.files", file_id, error = %e, "remote delete failed");
            e
        })?;
        tracing::info!(target: "leyia.files", file_id, filename = %handle.filename, "file deleted");
        Ok(handle)
    }

    /// The owning thread is gone: drop every handle and the thread id, delete remotely best-effort
    pub async fn reap_orphans(&self) -> usize {
        let handles = {
            let mut state = self.state.lock().await;
            state.thread_id = None;
            state.files.take_all()
        };
        if handles.is_empty() {
            return 0;
        }

        tracing::warn!(target: "leyia.files", count = handles.len(), "reaping orphaned files");
        self.events.emit(SessionEvent::FilesChanged { files: Vec::new() });
        for handle in &handles {
            self.delete_remote(handle).await;
        }
        handles.len()
    }

    /// Drop and delete handles uploaded before `now - max_age`
    pub async fn reap_older_than(&self, now: DateTime<Utc>) -> usize {
        let max_age = chrono::Duration::from_std(self.max_age).unwrap_or(chrono::Duration::MAX);
        let cutoff = now.checked_sub_signed(max_age).unwrap_or(DateTime::<Utc>::MIN_UTC);

        let (old, files) = {
            let mut state = self.state.lock().await;
            let old = state.files.take_older_than(cutoff);
            (old, state.files.uploaded().to_vec())
        };
        if old.is_empty() {
            return 0;
        }

        tracing::info!(target: "leyia.files", count = old.len(), "reaping expired files");
        self.events.emit(SessionEvent::FilesChanged { files });
        for handle in &old {
            self.delete_remote(handle).await;
        }
        old.len()
    }

    pub async fn reap_by_age(&self) -> usize {
        self.reap_older_than(Utc::now()).await
    }

    /// Drop every handle now and delete them remotely in the background
    pub async fn purge_all(&self) -> usize {
        let handles = self.state.lock().await.files.take_all();
        if handles.is_empty() {
            return 0;
        }

        self.events.emit(SessionEvent::FilesChanged { files: Vec::new() });
        let count = handles.len();
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            for handle in handles {
                if let Err(e) = store.delete_file(&handle.id).await {
                    tracing::debug!(target: "leyia.files", file_id = %handle.id, error = %e, "background delete failed");
                }
            }
        });
        count
    }

    async fn delete_remote(&self, handle: &FileHandle) {
        match self.store.delete_file(&handle.id).await {
            Ok(()) => {
                tracing::debug!(target: "leyia.files", file_id = %handle.id, filename = %handle.filename, "remote file deleted")
            }
            Err(e) => {
                tracing::debug!(target: "leyia.files", file_id = %handle.id, error = %e, "remote delete failed, ignoring")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::state::SessionState;
    use crate::config::IngestionConfig;
    use crate::error::IngestError;
    use crate::ingest::ocr::test_support::FakeOcrEngine;
    use crate::ingest::pdf::PdfTextSource;
    use crate::llm::mock_provider::MockAssistant;

    struct NoTextPdf;

    impl PdfTextSource for NoTextPdf {
        fn extract_text(&self, _bytes: &[u8]) -> Result<String> {
            Ok(String::new())
        }
    }

    fn manager(mock: &MockAssistant) -> (FileLifecycleManager, SharedState) {
        let state = SessionState::new(80, 3).shared();
        let extractor = DocumentExtractor::with_engines(
            IngestionConfig::default(),
            Arc::new(NoTextPdf),
            Some(Arc::new(FakeOcrEngine::new(5))),
        );
        let manager = FileLifecycleManager::new(
            Arc::new(mock.clone()),
            Arc::new(extractor),
            state.clone(),
            EventEmitter::new(),
            Duration::from_secs(7200),
        );
        (manager, state)
    }

    fn no_progress() -> impl Fn(IngestProgress) + Send + Sync {
        |_| {}
    }

    #[test]
    fn test_processed_name() {
        assert_eq!(processed_name("Ley 100.pdf"), "Ley 100_processed.txt");
        assert_eq!(processed_name("notas.txt"), "notas_processed.txt");
        assert_eq!(processed_name("sin_extension"), "sin_extension_processed.txt");
    }

    #[tokio::test]
    async fn test_register_uploads_extracted_text() {
        let mock = MockAssistant::new();
        let (manager, state) = manager(&mock);

        let handle = manager
            .register(b"Articulo 1", "ley.txt", &no_progress())
            .await
            .unwrap();

        let uploads = mock.recorded_uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "ley_processed.txt");
        assert_eq!(uploads[0].1, b"Articulo 1".to_vec());
        assert_eq!(state.lock().await.files.attachable(3), vec![handle]);
        assert!(!manager.is_uploading());
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_name() {
        let mock = MockAssistant::new();
        let (manager, _state) = manager(&mock);
        manager.register(b"uno", "a.txt", &no_progress()).await.unwrap();

        let err = manager
            .register(b"dos", "a.txt", &no_progress())
            .await
            .unwrap_err();
        assert!(matches!(err, LeyiaError::DuplicateFile(_)));
        assert_eq!(mock.recorded_uploads().len(), 1);
    }

    #[tokio::test]
    async fn test_register_reports_extraction_failure() {
        let mock = MockAssistant::new();
        let (manager, state) = manager(&mock);
        let err = manager
            .register(b"x", "tabla.xlsx", &no_progress())
            .await
            .unwrap_err();
        assert!(matches!(err, LeyiaError::Ingest(IngestError::UnsupportedFormat(_))));
        assert!(state.lock().await.files.is_empty());
        assert!(!manager.is_uploading());
    }

    #[tokio::test]
    async fn test_register_batch_continues_after_failure() {
        let mock = MockAssistant::new();
        let (manager, state) = manager(&mock);
        let results = manager
            .register_batch(
                vec![
                    ("a.txt".to_string(), b"uno".to_vec()),
                    ("malo.xlsx".to_string(), b"x".to_vec()),
                    ("escaneo.pdf".to_string(), b"%PDF".to_vec()),
                ],
                &|_, _| {},
            )
            .await;

        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
        assert!(results[2].1.is_ok());
        assert_eq!(state.lock().await.files.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_removes_locally_even_if_remote_fails() {
        let mock = MockAssistant::new();
        let (manager, state) = manager(&mock);
        let handle = manager.register(b"uno", "a.txt", &no_progress()).await.unwrap();

        mock.set_fail_deletes(true);
        assert!(manager.delete(&handle.id).await.is_err());
        assert!(state.lock().await.files.attachable(3).is_empty());
        assert_eq!(mock.deleted_files(), vec![handle.id.clone()]);

        let err = manager.delete(&handle.id).await.unwrap_err();
        assert!(matches!(err, LeyiaError::UnknownFile(_)));
    }

    #[tokio::test]
    async fn test_reap_orphans_clears_thread() {
        let mock = MockAssistant::new();
        let (manager, state) = manager(&mock);
        manager.register(b"uno", "a.txt", &no_progress()).await.unwrap();
        manager.register(b"dos", "b.txt", &no_progress()).await.unwrap();
        state.lock().await.thread_id = Some("thread_1".to_string());

        mock.set_fail_deletes(true);
        assert_eq!(manager.reap_orphans().await, 2);

        let state = state.lock().await;
        assert!(state.files.is_empty());
        assert!(state.thread_id.is_none());
        assert_eq!(mock.deleted_files().len(), 2);
    }

    #[tokio::test]
    async fn test_reap_older_than() {
        let mock = MockAssistant::new();
        let (manager, state) = manager(&mock);
        let handle = manager.register(b"uno", "a.txt", &no_progress()).await.unwrap();

        assert_eq!(manager.reap_older_than(Utc::now()).await, 0);
        let later = Utc::now() + chrono::Duration::seconds(7201);
        assert_eq!(manager.reap_older_than(later).await, 1);
        assert!(state.lock().await.files.is_empty());
        assert_eq!(mock.deleted_files(), vec![handle.id]);
    }

    #[tokio::test]
    async fn test_purge_all_clears_immediately() {
        let mock = MockAssistant::new();
        let (manager, state) = manager(&mock);
        manager.register(b"uno", "a.txt", &no_progress()).await.unwrap();

        assert_eq!(manager.purge_all().await, 1);
        assert!(state.lock().await.files.is_empty());
        assert_eq!(manager.purge_all().await, 0);
    }
}
