// Qdrant collection accessed over its REST API
// Point ids come from a local sequence seeded from the collection's point count


use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{
    CollectionStats, Payload, PayloadValue, Ranked, SearchResult, VectorIndex, VectorRecord,
    check_dimension, rank,
};
use crate::config::VectorStoreConfig;
use crate::http::{HttpReply, HttpTransport, TransportError, error_message, run_blocking};
use crate::{RagError, Result};

/// Payload field holding the record key inside Qdrant; stripped on read
pub const KEY_FIELD: &str = "_record_key";

/// Index stored in a Qdrant collection with cosine distance.
pub struct RemoteIndex {
    api: QdrantApi,
    dimension: usize,
    lock: RwLock<()>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

#[derive(Debug, Clone)]
struct QdrantApi {
    base: String,
    collection: String,
    api_key: String,
    transport: HttpTransport,
}

#[derive(Debug, Deserialize)]
struct CollectionInfoResponse {
    result: CollectionInfo,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    #[serde(default)]
    points_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

impl QdrantApi {
    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base, self.collection)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        if self.api_key.is_empty() {
            Vec::new()
        } else {
            vec![("api-key", self.api_key.as_str())]
        }
    }

    fn unavailable(&self, action: &str, detail: impl std::fmt::Display) -> RagError {
        RagError::BackendUnavailable(format!(
            "failed to {action} collection '{}': {detail}",
            self.collection
        ))
    }

    fn transport_failure(&self, action: &str, error: TransportError) -> RagError {
        match error {
            TransportError::Timeout { .. } => RagError::Timeout {
                operation: format!("qdrant {action} collection"),
            },
            failed @ TransportError::Failed { .. } => self.unavailable(action, failed),
        }
    }

    fn check(&self, action: &str, reply: &HttpReply) -> Result<()> {
        if reply.is_success() {
            Ok(())
        } else {
            Err(self.unavailable(
                action,
                format!("HTTP {}: {}", reply.status, error_message(&reply.body)),
            ))
        }
    }

    /// Point count of the collection, or `None` when it does not exist.
    fn points_count(&self) -> Result<Option<u64>> {
        let reply = self
            .transport
            .get(&self.collection_url(), &self.headers())
            .map_err(|e| self.transport_failure("read", e))?;
        if reply.status == 404 {
            return Ok(None);
        }
        self.check("read", &reply)?;

        let info: CollectionInfoResponse = serde_json::from_str(&reply.body)
            .map_err(|e| self.unavailable("read", format!("invalid response: {e}")))?;
        Ok(Some(info.result.points_count.unwrap_or(0)))
    }

    fn create(&self, dimension: usize) -> Result<()> {
        let body = json!({"vectors": {"size": dimension, "distance": "Cosine"}}).to_string();
        let reply = self
            .transport
            .put_json(&self.collection_url(), &self.headers(), &body)
            .map_err(|e| self.transport_failure("create", e))?;
        self.check("create", &reply)?;
        info!(
            "Created collection '{}' with {} dimensions",
            self.collection, dimension
        );
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        let reply = self
            .transport
            .delete(&self.collection_url(), &self.headers())
            .map_err(|e| self.transport_failure("delete", e))?;
        if reply.status == 404 {
            return Ok(());
        }
        self.check("delete", &reply)
    }

    fn upsert_points(&self, body: &str) -> Result<HttpReply> {
        self.transport
            .put_json(
                &format!("{}/points?wait=true", self.collection_url()),
                &self.headers(),
                body,
            )
            .map_err(|e| self.transport_failure("upsert into", e))
    }

    fn search(&self, body: &str) -> Result<Vec<ScoredPoint>> {
        let reply = self
            .transport
            .post_json(
                &format!("{}/points/search", self.collection_url()),
                &self.headers(),
                body,
            )
            .map_err(|e| self.transport_failure("search", e))?;
        self.check("search", &reply)?;

        let response: SearchResponse = serde_json::from_str(&reply.body)
            .map_err(|e| self.unavailable("search", format!("invalid response: {e}")))?;
        Ok(response.result)
    }
}

impl RemoteIndex {
    /// Connect to the configured collection, creating it when absent.
    ///
    /// An existing collection seeds the id sequence from its point count so
    /// new points do not overwrite old ones.
    #[inline]
    pub async fn open(config: &VectorStoreConfig, dimension: usize) -> Result<Self> {
        let api = QdrantApi {
            base: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            api_key: config.api_key.clone(),
            transport: HttpTransport::new(
                "qdrant",
                Duration::from_secs(config.timeout_secs),
                1,
            ),
        };

        let probe = api.clone();
        let existing = run_blocking("collection lookup", move || {
            match probe.points_count()? {
                Some(count) => Ok(count),
                None => probe.create(dimension).map(|()| 0),
            }
        })
        .await?;

        info!(
            "Opened remote collection '{}' at {} ({} points)",
            api.collection, api.base, existing
        );

        Ok(Self {
            api,
            dimension,
            lock: RwLock::new(()),
            next_id: AtomicU64::new(existing + 1),
            closed: AtomicBool::new(false),
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

fn point_payload(key: String, fields: Payload) -> Map<String, Value> {
    let mut payload: Map<String, Value> = fields
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                PayloadValue::Bool(b) => Value::Bool(b),
                PayloadValue::Integer(i) => Value::from(i),
                PayloadValue::Float(f) => Value::from(f),
                PayloadValue::String(s) => Value::String(s),
            };
            (name, value)
        })
        .collect();
    payload.insert(KEY_FIELD.to_string(), Value::String(key));
    payload
}

fn scored_to_ranked(point: ScoredPoint) -> Ranked {
    let mut key = String::new();
    let mut payload = Payload::new();

    for (name, value) in point.payload.unwrap_or_default() {
        if name == KEY_FIELD {
            if let Value::String(stored_key) = value {
                key = stored_key;
            }
        } else if let Some(value) = PayloadValue::from_json(&value) {
            payload.insert(name, value);
        }
    }

    Ranked {
        seq: point.id.as_u64().unwrap_or(u64::MAX),
        result: SearchResult {
            score: point.score.clamp(-1.0, 1.0),
            key,
            payload,
        },
    }
}

#[async_trait]
impl VectorIndex for RemoteIndex {
    fn name(&self) -> &str {
        &self.api.collection
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

        let _guard = self.lock.write().await;
        let first_id = self.next_id.load(Ordering::Acquire);
        let count = records.len() as u64;

        let points: Vec<Value> = records
            .into_iter()
            .zip(first_id..)
            .map(|(record, id)| {
                json!({
                    "id": id,
                    "vector": record.vector,
                    "payload": point_payload(record.key, record.payload),
                })
            })
            .collect();
        let body = json!({ "points": points }).to_string();

        let api = self.api.clone();
        let dimension = self.dimension;
        run_blocking("qdrant upsert", move || {
            let reply = api.upsert_points(&body)?;
            if reply.status == 404 {
                warn!(
                    "Collection '{}' missing on upsert, creating it and retrying",
                    api.collection
                );
                api.create(dimension)?;
                let retry = api.upsert_points(&body)?;
                return api.check("upsert into", &retry);
            }
            api.check("upsert into", &reply)
        })
        .await?;

        self.next_id.store(first_id + count, Ordering::Release);
        debug!(
            "Upserted {} points into '{}' (ids {}..{})",
            count,
            self.api.collection,
            first_id,
            first_id + count
        );
        Ok(())
    }

    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        check_dimension(self.dimension, query.len())?;
        if limit == 0 || self.is_closed() {
            return Ok(Vec::new());
        }

        let _guard = self.lock.read().await;
        let body = json!({
            "vector": query,
            "limit": limit,
            "with_payload": true,
        })
        .to_string();

        let api = self.api.clone();
        match run_blocking("qdrant search", move || api.search(&body)).await {
            Ok(points) => Ok(rank(points.into_iter().map(scored_to_ranked).collect(), limit)),
            Err(e) => {
                warn!("Search in '{}' failed: {}", self.api.collection, e);
                Ok(Vec::new())
            }
        }
    }

    async fn stats(&self) -> CollectionStats {
        if self.is_closed() {
            return CollectionStats::default();
        }

        let _guard = self.lock.read().await;
        let api = self.api.clone();
        match run_blocking("qdrant stats", move || api.points_count()).await {
            Ok(count) => CollectionStats {
                record_count: count.unwrap_or(0),
            },
            Err(e) => {
                warn!("Could not read stats of '{}': {}", self.api.collection, e);
                CollectionStats::default()
            }
        }
    }

    async fn clear(&self) -> Result<()> {
        if self.is_closed() {
            return Err(RagError::Closed);
        }

        let _guard = self.lock.write().await;
        let api = self.api.clone();
        let dimension = self.dimension;
        run_blocking("qdrant clear", move || {
            api.delete()?;
            api.create(dimension)
        })
        .await?;

        self.next_id.store(1, Ordering::Release);
        info!("Cleared remote collection '{}'", self.api.collection);
        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("Closed remote index '{}'", self.api.collection);
        }
    }
}
