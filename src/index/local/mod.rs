
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{
    CollectionStats, Ranked, SearchResult, VectorIndex, VectorRecord, check_dimension,
    cosine_similarity, rank,
};
use crate::{RagError, Result};

struct StoredRecord {
    seq: u64,
    record: VectorRecord,
}

/// In-process index with exhaustive cosine search. Contents live as long as
/// the value does.
pub struct LocalIndex {
    name: String,
    dimension: usize,
    records: RwLock<Vec<StoredRecord>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl LocalIndex {
    #[inline]
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        let name = name.into();
        debug!("Created local index '{}' ({} dimensions)", name, dimension);
        Self {
            name,
            dimension,
            records: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl VectorIndex for LocalIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        if self.is_closed() {
            return Err(RagError::Closed);
        }
        for record in &records {
            check_dimension(self.dimension, record.vector.len())?;
        }
        if records.is_empty() {
            return Ok(());
        }

        let count = records.len();
        let mut stored = self.records.write().await;
        stored.extend(records.into_iter().map(|record| StoredRecord {
            seq: self.next_id.fetch_add(1, Ordering::Relaxed),
            record,
        }));
        debug!(
            "Stored {} records in local index '{}' (total {})",
            count,
            self.name,
            stored.len()
        );
        Ok(())
    }

    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        check_dimension(self.dimension, query.len())?;
        if limit == 0 || self.is_closed() {
            return Ok(Vec::new());
        }

        let stored = self.records.read().await;
        let hits = stored
            .iter()
            .map(|entry| Ranked {
                seq: entry.seq,
                result: SearchResult {
                    score: cosine_similarity(query, &entry.record.vector),
                    key: entry.record.key.clone(),
                    payload: entry.record.payload.clone(),
                },
            })
            .collect();
        drop(stored);

        Ok(rank(hits, limit))
    }

    async fn stats(&self) -> CollectionStats {
        if self.is_closed() {
            return CollectionStats::default();
        }
        let stored = self.records.read().await;
        CollectionStats {
            record_count: stored.len() as u64,
        }
    }

    async fn clear(&self) -> Result<()> {
        if self.is_closed() {
            return Err(RagError::Closed);
        }
        let mut stored = self.records.write().await;
        let removed = stored.len();
        stored.clear();
        info!("Cleared {} records from local index '{}'", removed, self.name);
        Ok(())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut stored = self.records.write().await;
        stored.clear();
        stored.shrink_to_fit();
        debug!("Closed local index '{}'", self.name);
    }
}
