// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Per-session registry of uploaded file handles
//!
//! Two views are kept: the full list of uploads (shown to the user and used
//! for duplicate detection) and a rolling window of the most recent uploads,
//! which is what gets attached to the next turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An uploaded document registered with the file store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    /// Remote file id
    pub id: String,
    /// Name of the original upload
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
}

impl FileHandle {
    pub fn new(id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            uploaded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FileRegistry {
    uploaded: Vec<FileHandle>,
    session: Vec<FileHandle>,
    window: usize,
}

impl FileRegistry {
    /// Create a registry whose attachable window holds `window` handles
    pub fn new(window: usize) -> Self {
        Self {
            uploaded: Vec::new(),
            session: Vec::new(),
            window,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.uploaded.is_empty()
    }

    pub fn len(&self) -> usize {
        self.uploaded.len()
    }

    /// Whether a file with this name was already uploaded in the session
    pub fn contains_filename(&self, filename: &str) -> bool {
        self.uploaded.iter().any(|h| h.filename == filename)
    }

    /// Record a new upload in both views
    pub fn insert(&mut self, handle: FileHandle) {
        self.uploaded.push(handle.clone());
        self.session.push(handle);
        if self.session.len() > self.window {
            let excess = self.session.len() - self.window;
            self.session.drain(..excess);
        }
    }

    /// Remove a handle from both views
    pub fn remove(&mut self, id: &str) -> Option<FileHandle> {
        self.session.retain(|h| h.id != id);
        let index = self.uploaded.iter().position(|h| h.id == id)?;
        Some(self.uploaded.remove(index))
    }

    /// Empty the registry, returning every handle
    pub fn take_all(&mut self) -> Vec<FileHandle> {
        self.session.clear();
        std::mem::take(&mut self.uploaded)
    }

    /// Remove and return the handles uploaded strictly before `cutoff`
    pub fn take_older_than(&mut self, cutoff: DateTime<Utc>) -> Vec<FileHandle> {
        let (old, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.uploaded)
            .into_iter()
            .partition(|h| h.uploaded_at < cutoff);
        self.uploaded = kept;
        self.session.retain(|h| h.uploaded_at >= cutoff);
        old
    }

    /// Every upload, oldest first
    pub fn uploaded(&self) -> &[FileHandle] {
        &self.uploaded
    }

    /// Up to `n` of the most recent attachable handles, oldest first
    pub fn attachable(&self, n: usize) -> Vec<FileHandle> {
        let start = self.session.len().saturating_sub(n);
        self.session[start..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn handle(id: &str, filename: &str, age_secs: i64) -> FileHandle {
        FileHandle {
            id: id.to_string(),
            filename: filename.to_string(),
            uploaded_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn test_insert_and_duplicate_detection() {
        let mut registry = FileRegistry::new(3);
        registry.insert(handle("f1", "ley.pdf", 0));
        assert!(registry.contains_filename("ley.pdf"));
        assert!(!registry.contains_filename("otra.pdf"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_attachable_window_keeps_most_recent() {
        let mut registry = FileRegistry::new(3);
        for i in 1..=5 {
            registry.insert(handle(&format!("f{}", i), &format!("doc{}.txt", i), 0));
        }
        let ids: Vec<String> = registry.attachable(3).into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["f3", "f4", "f5"]);
        assert_eq!(registry.uploaded().len(), 5);
        assert_eq!(registry.attachable(2).len(), 2);
    }

    #[test]
    fn test_remove_drops_from_both_views() {
        let mut registry = FileRegistry::new(3);
        registry.insert(handle("f1", "a.txt", 0));
        registry.insert(handle("f2", "b.txt", 0));

        let removed = registry.remove("f1").unwrap();
        assert_eq!(removed.filename, "a.txt");
        assert!(registry.attachable(3).iter().all(|h| h.id != "f1"));
        assert!(!registry.contains_filename("a.txt"));
        assert!(registry.remove("f1").is_none());
    }

    #[test]
    fn test_take_older_than() {
        let mut registry = FileRegistry::new(3);
        registry.insert(handle("old", "viejo.txt", 8000));
        registry.insert(handle("new", "nuevo.txt", 10));

        let old = registry.take_older_than(Utc::now() - Duration::seconds(7200));
        assert_eq!(old.len(), 1);
        assert_eq!(old[0].id, "old");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.attachable(3)[0].id, "new");
    }

    #[test]
    fn test_take_all_empties_registry() {
        let mut registry = FileRegistry::new(3);
        registry.insert(handle("f1", "a.txt", 0));
        registry.insert(handle("f2", "b.txt", 0));
        assert_eq!(registry.take_all().len(), 2);
        assert!(registry.is_empty());
        assert!(registry.attachable(3).is_empty());
    }
}
