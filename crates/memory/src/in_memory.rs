//! Process-local fact store; the default `[memory] backend`.

use async_trait::async_trait;
use chimera_core::error::MemoryError;
use chimera_core::memory::{MemoryBackend, MemoryEntry, MemoryQuery};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::scoring;

/// Facts live as long as the process. Concurrent sessions share one store
/// through an `Arc<dyn MemoryBackend>`.
#[derive(Default)]
pub struct InMemoryBackend {
    facts: RwLock<Vec<MemoryEntry>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn store(&self, mut entry: MemoryEntry) -> Result<String, MemoryError> {
        if entry.id.is_empty() {
            entry.id = Uuid::new_v4().to_string();
        }
        let id = entry.id.clone();
        self.facts.write().await.push(entry);
        Ok(id)
    }

    async fn search(&self, query: MemoryQuery) -> Result<Vec<MemoryEntry>, MemoryError> {
        let facts = self.facts.read().await;
        Ok(scoring::rank(facts.iter(), &query))
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.facts.read().await.len())
    }
}
