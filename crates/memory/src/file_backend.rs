//! File-based memory backend: persistent JSON-lines storage.
//!
//! Each line is a JSON-encoded `MemoryEntry`. Entries are loaded into memory
//! on creation and the whole file is rewritten on every mutation, which keeps
//! reads fast and the file human-inspectable.

use async_trait::async_trait;
use chimera_core::error::MemoryError;
use chimera_core::memory::{MemoryBackend, MemoryEntry, MemoryQuery};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::scoring;

/// A file-backed memory store using JSONL (one JSON object per line).
pub struct FileBackend {
    path: PathBuf,
    entries: RwLock<Vec<MemoryEntry>>,
}

impl FileBackend {
    /// Open the store at `path`.
    ///
    /// A missing file starts empty and is created on first write.
    /// Corrupted lines are skipped with a warning.
    pub fn new(path: PathBuf) -> Self {
        let entries = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = entries.len(), "File memory backend loaded");
        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Vec<MemoryEntry> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<MemoryEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted memory entry");
                    None
                }
            })
            .collect()
    }

    /// Rewrite the file from `entries`. Callers hold the write lock.
    async fn flush(&self, entries: &[MemoryEntry]) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MemoryError::Storage(format!("Failed to create memory directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for entry in entries {
            let line = serde_json::to_string(entry).map_err(|e| {
                MemoryError::Storage(format!("Failed to serialize memory entry: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to write memory file: {e}")))
    }
}

#[async_trait]
impl MemoryBackend for FileBackend {
    fn name(&self) -> &str {
        "file"
    }

    async fn store(&self, mut entry: MemoryEntry) -> Result<String, MemoryError> {
        if entry.id.is_empty() {
            entry.id = Uuid::new_v4().to_string();
        }
        let id = entry.id.clone();
        let mut entries = self.entries.write().await;
        entries.push(entry);
        self.flush(&entries).await?;
        Ok(id)
    }

    async fn search(&self, query: MemoryQuery) -> Result<Vec<MemoryEntry>, MemoryError> {
        let entries = self.entries.read().await;
        Ok(scoring::rank(entries.iter(), &query))
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.entries.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory").join("facts.jsonl");

        let mem = FileBackend::new(path.clone());
        mem.store(MemoryEntry::new("The sandbox lives in /srv/agent")).await.unwrap();
        assert!(path.exists());

        let reopened = FileBackend::new(path);
        assert_eq!(reopened.count().await.unwrap(), 1);
        let hits = reopened.search(MemoryQuery::new("where is the sandbox", 3)).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn corrupted_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.jsonl");
        let good = serde_json::to_string(&MemoryEntry::new("valid fact")).unwrap();
        std::fs::write(&path, format!("{good}\nnot json\n\n")).unwrap();

        let mem = FileBackend::new(path);
        assert_eq!(mem.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn each_fact_is_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.jsonl");

        let mem = FileBackend::new(path.clone());
        mem.store(MemoryEntry::new("first")).await.unwrap();
        mem.store(MemoryEntry::new("second\nwith a newline")).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert_eq!(FileBackend::new(path).count().await.unwrap(), 2);
    }
}
