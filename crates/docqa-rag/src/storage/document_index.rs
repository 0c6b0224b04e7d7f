//! Record store and similarity index behind a single lock

use parking_lot::RwLock;
use std::collections::HashSet;

use super::RecordStore;
use crate::config::{DeletePolicy, RagConfig};
use crate::error::{Error, Result};
use crate::index::{FlatIndex, SimilarityIndex};
use crate::types::{Chunk, ChunkId, DocumentSummary, EmbeddedChunk};

/// A search hit resolved to its chunk
#[derive(Debug, Clone)]
pub struct ResolvedHit {
    pub chunk: Chunk,
    pub distance: f32,
}

/// Result of committing one document
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub ids: Vec<ChunkId>,
    /// Chunks retired because the document already existed
    pub replaced: usize,
    /// Live chunks after the commit
    pub total_chunks: usize,
}

/// Counts removed by `clear`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearOutcome {
    pub documents: usize,
    pub chunks: usize,
}

struct IndexState {
    store: RecordStore,
    index: Box<dyn SimilarityIndex>,
    /// Ids deleted from the store but still present in `index`
    tombstones: HashSet<ChunkId>,
}

impl IndexState {
    fn rebuild(&mut self) {
        let mut entries = self
            .store
            .chunks()
            .map(|c| (c.id, c.embedding.as_slice()));
        self.index.rebuild(&mut entries);
        self.tombstones.clear();
    }

    /// Drop retired ids from search. Returns true when the index was rebuilt.
    fn retire(&mut self, retired: Vec<ChunkId>, policy: DeletePolicy) -> bool {
        if retired.is_empty() {
            return false;
        }
        match policy {
            DeletePolicy::Rebuild => {
                self.rebuild();
                true
            }
            DeletePolicy::Tombstone { compact_threshold } => {
                self.tombstones.extend(retired);
                if self.tombstones.len() > compact_threshold {
                    tracing::info!(
                        "Compacting index: {} tombstones over threshold {}",
                        self.tombstones.len(),
                        compact_threshold
                    );
                    self.rebuild();
                    return true;
                }
                false
            }
        }
    }
}

/// The indexing engine: every chunk, plus a similarity index derived from them.
///
/// Readers (search, get, list, count) share the lock; writers (commit,
/// delete, clear, rebuild) hold it exclusively for the disk commit and the
/// index update together, so no reader sees the store and the index
/// disagree. Writers do blocking IO and belong on a blocking thread.
pub struct DocumentIndex {
    state: RwLock<IndexState>,
    policy: DeletePolicy,
}

impl DocumentIndex {
    /// Wrap a store and an index, rebuilding the index from the store
    pub fn new(store: RecordStore, index: Box<dyn SimilarityIndex>, policy: DeletePolicy) -> Self {
        let mut state = IndexState {
            store,
            index,
            tombstones: HashSet::new(),
        };
        state.rebuild();

        Self {
            state: RwLock::new(state),
            policy,
        }
    }

    /// Open the persisted store named by the configuration
    pub fn open(config: &RagConfig) -> Result<Self> {
        let store = RecordStore::open(config.store_path(), config.embeddings.dimensions)?;
        Ok(Self::with_flat_index(store, config))
    }

    /// Engine over an existing store with the configured flat index
    pub fn with_flat_index(store: RecordStore, config: &RagConfig) -> Self {
        let index = FlatIndex::new(store.dimensions(), config.vector_db.metric)
            .with_parallel_threshold(config.vector_db.parallel_scan_threshold);
        Self::new(store, Box::new(index), config.vector_db.delete_policy)
    }

    pub fn policy(&self) -> DeletePolicy {
        self.policy
    }

    /// Commit one document's chunks, replacing any earlier upload of the
    /// same name in the same exclusive section
    pub fn commit_document(
        &self,
        document: &str,
        chunks: Vec<EmbeddedChunk>,
    ) -> Result<CommitOutcome> {
        let mut state = self.state.write();

        let (ids, retired) = if state.store.contains_document(document) {
            state.store.replace_document(document, chunks)?
        } else {
            (state.store.insert_batch(document, chunks)?, Vec::new())
        };
        let replaced = retired.len();

        // Retire first: a rebuild or compaction already picks up the new chunks
        let rebuilt = state.retire(retired, self.policy);

        if !rebuilt {
            for &id in &ids {
                let state = &mut *state;
                let inserted = match state.store.get(id) {
                    Ok(chunk) => state.index.insert(id, &chunk.embedding),
                    Err(e) => Err(e),
                };
                if let Err(e) = inserted {
                    tracing::warn!("Index insert failed for chunk {}: {}, rebuilding", id, e);
                    state.rebuild();
                    break;
                }
            }
        }

        Ok(CommitOutcome {
            ids,
            replaced,
            total_chunks: state.store.count(),
        })
    }

    /// Remove a document. Returns the number of chunks removed (0 if absent).
    pub fn delete_document(&self, document: &str) -> Result<usize> {
        let mut state = self.state.write();
        let retired = state.store.delete_by_document(document)?;
        let count = retired.len();
        state.retire(retired, self.policy);
        Ok(count)
    }

    /// Remove everything
    pub fn clear(&self) -> Result<ClearOutcome> {
        let mut state = self.state.write();
        let documents = state.store.document_count();
        let chunks = state.store.clear()?;
        state.rebuild();
        Ok(ClearOutcome { documents, chunks })
    }

    /// Rebuild the index from the store, dropping all tombstones
    pub fn rebuild(&self) {
        self.state.write().rebuild();
    }

    /// k nearest live chunks, nearest first
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ResolvedHit> {
        let state = self.state.read();
        if k == 0 {
            return Vec::new();
        }

        let fetch = k + state.tombstones.len();
        let mut resolved = Vec::with_capacity(k);

        for hit in state.index.search(query, fetch) {
            if state.tombstones.contains(&hit.id) {
                continue;
            }
            match state.store.get(hit.id) {
                Ok(chunk) => resolved.push(ResolvedHit {
                    chunk: chunk.clone(),
                    distance: hit.distance,
                }),
                Err(_) => {
                    let err = Error::IndexInconsistency(format!(
                        "index returned chunk {} which is not in the store",
                        hit.id
                    ));
                    tracing::warn!("{}", err);
                }
            }
            if resolved.len() == k {
                break;
            }
        }

        resolved
    }

    pub fn get(&self, id: ChunkId) -> Result<Chunk> {
        self.state.read().store.get(id).cloned()
    }

    pub fn list_documents(&self) -> Vec<DocumentSummary> {
        self.state.read().store.list_documents()
    }

    /// Live chunk count
    pub fn count(&self) -> usize {
        self.state.read().store.count()
    }

    pub fn document_count(&self) -> usize {
        self.state.read().store.document_count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn dimensions(&self) -> usize {
        self.state.read().store.dimensions()
    }

    pub fn pending_tombstones(&self) -> usize {
        self.state.read().tombstones.len()
    }

    /// Entries in the similarity index, tombstoned ones included
    pub fn index_len(&self) -> usize {
        self.state.read().index.len()
    }
}
