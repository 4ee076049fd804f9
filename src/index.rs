//! In-memory vector index with optional durable backing.
//!
//! [`VectorIndex`] stores [`IndexedRecord`]s keyed by id and answers
//! k-nearest-neighbor queries by brute-force **cosine distance**
//! (`1 - cosine_similarity`, computed in `f32`). Lower scores are more
//! relevant; equal scores are ordered by insertion (earlier first).
//!
//! # Consistency
//!
//! All state lives behind one `tokio::sync::RwLock`:
//! - searches take the read lock and run concurrently;
//! - [`upsert`](VectorIndex::upsert) validates the whole batch and applies
//!   it under the write lock with no await point in between, so a search
//!   sees either none or all of a batch, and a dropped (cancelled) upsert
//!   future commits nothing.
//!
//! # Persistence
//!
//! Upserted ids are marked dirty. [`persist`](VectorIndex::persist) writes
//! the dirty records to the [`RecordStore`] in one batch; if that fails the
//! failure is logged and the records stay dirty for the next flush.
//! [`VectorIndex::open`] reloads everything previously flushed.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{RagError, Result};
use crate::models::IndexedRecord;
use crate::store::{PersistedRecord, RecordStore};

/// A search hit: the stored record and its cosine distance to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: IndexedRecord,
    pub score: f32,
}

/// Summary of what the index currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub records: usize,
    pub dims: Option<usize>,
    /// Record count per source file.
    pub sources: BTreeMap<String, usize>,
}

struct Slot {
    seq: u64,
    record: IndexedRecord,
}

#[derive(Default)]
struct IndexState {
    /// Records in insertion order; never removed, only replaced in place.
    slots: Vec<Slot>,
    positions: HashMap<String, usize>,
    dims: Option<usize>,
    next_seq: u64,
    dirty: HashSet<String>,
}

pub struct VectorIndex {
    state: RwLock<IndexState>,
    store: Option<Arc<dyn RecordStore>>,
    /// Serializes flushes so two `persist` calls never write the same batch twice.
    flush_lock: Mutex<()>,
}

impl VectorIndex {
    /// An index with no durable backing; [`persist`](Self::persist) is a no-op.
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(IndexState::default()),
            store: None,
            flush_lock: Mutex::new(()),
        }
    }

    /// Open an index backed by `store`, reloading every flushed record.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Storage`] if the store cannot be read or holds
    /// vectors of differing dimensionality.
    pub async fn open(store: Arc<dyn RecordStore>) -> Result<Self> {
        let persisted = store.load_all().await?;

        let mut state = IndexState::default();
        for PersistedRecord { seq, record } in persisted {
            let dims = *state.dims.get_or_insert(record.vector.len());
            if record.vector.len() != dims || dims == 0 {
                return Err(RagError::Storage(format!(
                    "stored record '{}' has {} dimensions, expected {}",
                    record.id,
                    record.vector.len(),
                    dims
                )));
            }
            state.next_seq = state.next_seq.max(seq + 1);
            state.positions.insert(record.id.clone(), state.slots.len());
            state.slots.push(Slot { seq, record });
        }

        info!(
            records = state.slots.len(),
            dims = state.dims.unwrap_or(0),
            "opened vector index"
        );

        Ok(Self {
            state: RwLock::new(state),
            store: Some(store),
            flush_lock: Mutex::new(()),
        })
    }

    /// Insert or replace `records` by id, all or nothing.
    ///
    /// The first successful upsert fixes the index dimensionality. A replaced
    /// record keeps its original insertion position. Returns the number of
    /// records written.
    ///
    /// # Errors
    ///
    /// - [`RagError::DimensionMismatch`] if any vector's length differs from
    ///   the established dimensionality (or from the rest of the batch).
    /// - [`RagError::Config`] if a vector is empty or has a NaN / infinite component.
    ///
    /// On error the index is unchanged.
    pub async fn upsert(&self, records: Vec<IndexedRecord>) -> Result<usize> {
        let Some(first) = records.first() else {
            return Ok(0);
        };

        let mut state = self.state.write().await;

        let expected = state.dims.unwrap_or(first.vector.len());
        for record in &records {
            if record.vector.is_empty() {
                return Err(RagError::Config(format!(
                    "record '{}' has an empty vector",
                    record.id
                )));
            }
            if record.vector.len() != expected {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: record.vector.len(),
                });
            }
            if record.vector.iter().any(|x| !x.is_finite()) {
                return Err(RagError::Config(format!(
                    "record '{}' has a non-finite vector component",
                    record.id
                )));
            }
        }

        let count = records.len();
        state.dims = Some(expected);
        for record in records {
            state.dirty.insert(record.id.clone());
            let existing = state.positions.get(&record.id).copied();
            match existing {
                Some(pos) => state.slots[pos].record = record,
                None => {
                    let seq = state.next_seq;
                    state.next_seq += 1;
                    let pos = state.slots.len();
                    state.positions.insert(record.id.clone(), pos);
                    state.slots.push(Slot { seq, record });
                }
            }
        }

        debug!(count, total = state.slots.len(), "upserted records");
        Ok(count)
    }

    /// Return up to `k` records nearest to `query`, ascending by cosine distance.
    ///
    /// An empty index yields an empty result, not an error.
    ///
    /// # Errors
    ///
    /// - [`RagError::Config`] if `k == 0` or `query` has a NaN / infinite component.
    /// - [`RagError::DimensionMismatch`] if `query` has the wrong length for
    ///   a non-empty index.
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredRecord>> {
        if k == 0 {
            return Err(RagError::Config("k must be > 0".to_string()));
        }

        let state = self.state.read().await;
        let dims = match state.dims {
            Some(dims) if !state.slots.is_empty() => dims,
            _ => return Ok(Vec::new()),
        };
        if query.len() != dims {
            return Err(RagError::DimensionMismatch {
                expected: dims,
                actual: query.len(),
            });
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(RagError::Config(
                "query vector has a non-finite component".to_string(),
            ));
        }

        let mut scored: Vec<(f32, u64, usize)> = state
            .slots
            .iter()
            .enumerate()
            .map(|(pos, slot)| (cosine_distance(query, &slot.record.vector), slot.seq, pos))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, _, pos)| ScoredRecord {
                record: state.slots[pos].record.clone(),
                score,
            })
            .collect())
    }

    /// Flush records changed since the last successful flush.
    ///
    /// Never fails: a storage error is logged and the records are retried
    /// on the next call, while the in-memory index keeps serving them.
    pub async fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let _flushing = self.flush_lock.lock().await;

        let mut batch: Vec<PersistedRecord> = {
            let mut state = self.state.write().await;
            let ids: Vec<String> = state.dirty.drain().collect();
            let dirty: Vec<PersistedRecord> = ids
                .iter()
                .filter_map(|id| state.positions.get(id))
                .map(|&pos| PersistedRecord {
                    seq: state.slots[pos].seq,
                    record: state.slots[pos].record.clone(),
                })
                .collect();
            dirty
        };
        if batch.is_empty() {
            return;
        }
        batch.sort_by_key(|r| r.seq);

        match store.write_batch(&batch).await {
            Ok(()) => debug!(count = batch.len(), "persisted vector index"),
            Err(e) => {
                warn!(
                    error = %e,
                    count = batch.len(),
                    "failed to persist vector index; records remain in memory"
                );
                let mut state = self.state.write().await;
                state
                    .dirty
                    .extend(batch.into_iter().map(|r| r.record.id));
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.slots.is_empty()
    }

    /// Dimensionality fixed by the first upsert, if any.
    pub async fn dims(&self) -> Option<usize> {
        self.state.read().await.dims
    }

    /// Number of records not yet written to durable storage.
    pub async fn pending_flush(&self) -> usize {
        self.state.read().await.dirty.len()
    }

    pub async fn stats(&self) -> IndexStats {
        let state = self.state.read().await;
        let mut sources = BTreeMap::new();
        for slot in &state.slots {
            *sources
                .entry(slot.record.metadata.source_file.clone())
                .or_insert(0) += 1;
        }
        IndexStats {
            records: state.slots.len(),
            dims: state.dims,
            sources,
        }
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors
/// of different lengths, or a zero-magnitude vector.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    let sim = dot / denom;
    // Products of very large components can overflow to infinity.
    if !sim.is_finite() {
        return 0.0;
    }
    sim.clamp(-1.0, 1.0)
}

/// Cosine distance, `1 - cosine_similarity(a, b)`, in `[0.0, 2.0]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}
