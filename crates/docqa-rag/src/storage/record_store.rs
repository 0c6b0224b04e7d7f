//! Durable chunk records with a per-document secondary index

use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::snapshot;
use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkId, DocumentSummary, EmbeddedChunk};

/// Owner of every chunk and of chunk identity.
///
/// Mutations are staged: the full post-mutation snapshot is committed to disk
/// first and memory is only updated once the commit succeeds, so a failed
/// write leaves both at the previous state. Ids come from a persisted counter
/// and are never handed out twice.
#[derive(Debug)]
pub struct RecordStore {
    path: Option<PathBuf>,
    dimensions: usize,
    next_id: ChunkId,
    chunks: BTreeMap<ChunkId, Chunk>,
    by_document: BTreeMap<String, BTreeSet<ChunkId>>,
}

impl RecordStore {
    /// Open (or create) the store file at `path`
    pub fn open(path: impl Into<PathBuf>, dimensions: usize) -> Result<Self> {
        let path = path.into();
        let mut store = Self {
            path: None,
            dimensions,
            next_id: 0,
            chunks: BTreeMap::new(),
            by_document: BTreeMap::new(),
        };

        if let Some(snapshot) = snapshot::read(&path, dimensions)? {
            store.next_id = snapshot.next_id;
            for chunk in snapshot.chunks {
                store.index_chunk(chunk);
            }
            tracing::info!(
                "Loaded {} chunks from {} documents ({})",
                store.chunks.len(),
                store.by_document.len(),
                path.display()
            );
        } else {
            tracing::info!("No chunk store at {}, starting empty", path.display());
        }

        store.path = Some(path);
        Ok(store)
    }

    /// Store that never touches disk
    pub fn in_memory(dimensions: usize) -> Self {
        Self {
            path: None,
            dimensions,
            next_id: 0,
            chunks: BTreeMap::new(),
            by_document: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Append all chunks of one document, returning the assigned ids
    pub fn insert_batch(
        &mut self,
        document: &str,
        chunks: Vec<EmbeddedChunk>,
    ) -> Result<Vec<ChunkId>> {
        let staged = self.stage(document, chunks)?;
        let next_id = self.next_id + staged.len() as u64;

        self.commit(&BTreeSet::new(), &staged, next_id)?;

        self.next_id = next_id;
        Ok(self.apply(BTreeSet::new(), staged))
    }

    /// Swap a document's chunk set for a new one in a single commit.
    /// Returns `(new ids, retired ids)`.
    pub fn replace_document(
        &mut self,
        document: &str,
        chunks: Vec<EmbeddedChunk>,
    ) -> Result<(Vec<ChunkId>, Vec<ChunkId>)> {
        let staged = self.stage(document, chunks)?;
        let retired = self.by_document.get(document).cloned().unwrap_or_default();
        let next_id = self.next_id + staged.len() as u64;

        self.commit(&retired, &staged, next_id)?;

        self.next_id = next_id;
        let retired_ids = retired.iter().copied().collect();
        Ok((self.apply(retired, staged), retired_ids))
    }

    /// Remove every chunk of `document`. Returns the removed ids; empty when
    /// the document has no live chunks.
    pub fn delete_by_document(&mut self, document: &str) -> Result<Vec<ChunkId>> {
        let retired = match self.by_document.get(document) {
            Some(ids) => ids.clone(),
            None => return Ok(Vec::new()),
        };

        self.commit(&retired, &[], self.next_id)?;

        let retired_ids = retired.iter().copied().collect();
        self.apply(retired, Vec::new());
        Ok(retired_ids)
    }

    /// Remove every chunk. The id counter keeps counting.
    pub fn clear(&mut self) -> Result<usize> {
        let removed = self.chunks.len();
        if removed == 0 {
            return Ok(0);
        }

        let all: BTreeSet<ChunkId> = self.chunks.keys().copied().collect();
        self.commit(&all, &[], self.next_id)?;

        self.chunks.clear();
        self.by_document.clear();
        Ok(removed)
    }

    pub fn get(&self, id: ChunkId) -> Result<&Chunk> {
        self.chunks.get(&id).ok_or(Error::ChunkNotFound(id))
    }

    /// Per-document chunk counts, sorted by name
    pub fn list_documents(&self) -> Vec<DocumentSummary> {
        self.by_document
            .iter()
            .map(|(name, ids)| DocumentSummary {
                filename: name.clone(),
                chunks: ids.len(),
                ingested_at: ids
                    .iter()
                    .filter_map(|id| self.chunks.get(id))
                    .map(|c| c.created_at)
                    .max()
                    .unwrap_or_else(Utc::now),
            })
            .collect()
    }

    pub fn contains_document(&self, document: &str) -> bool {
        self.by_document.contains_key(document)
    }

    /// Total live chunks
    pub fn count(&self) -> usize {
        self.chunks.len()
    }

    pub fn document_count(&self) -> usize {
        self.by_document.len()
    }

    /// All live chunks in id order
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    /// Validate a batch and give it ids, without touching state
    fn stage(&self, document: &str, chunks: Vec<EmbeddedChunk>) -> Result<Vec<Chunk>> {
        if document.is_empty() {
            return Err(Error::invalid("document name must not be empty"));
        }
        if chunks.is_empty() {
            return Err(Error::EmptyDocument(document.to_string()));
        }
        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != self.dimensions) {
            return Err(Error::invalid(format!(
                "chunk {} of {} has {} dimensions, store expects {}",
                bad.position,
                document,
                bad.embedding.len(),
                self.dimensions
            )));
        }

        let created_at = Utc::now();
        Ok(chunks
            .into_iter()
            .enumerate()
            .map(|(i, c)| Chunk {
                id: self.next_id + i as u64,
                text: c.text,
                embedding: c.embedding,
                source_document: document.to_string(),
                position: c.position,
                created_at,
            })
            .collect())
    }

    /// Write the post-mutation snapshot. Memory is untouched.
    fn commit(&self, removed: &BTreeSet<ChunkId>, added: &[Chunk], next_id: ChunkId) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let kept = self.chunks.values().filter(|c| !removed.contains(&c.id));
        snapshot::write(path, self.dimensions, next_id, kept.chain(added.iter())).map_err(|e| {
            tracing::error!("Failed to commit chunk store {}: {}", path.display(), e);
            e
        })
    }

    /// Apply a committed mutation to memory
    fn apply(&mut self, removed: BTreeSet<ChunkId>, added: Vec<Chunk>) -> Vec<ChunkId> {
        for id in removed {
            if let Some(chunk) = self.chunks.remove(&id) {
                if let Some(ids) = self.by_document.get_mut(&chunk.source_document) {
                    ids.remove(&id);
                    if ids.is_empty() {
                        self.by_document.remove(&chunk.source_document);
                    }
                }
            }
        }

        let ids = added.iter().map(|c| c.id).collect();
        for chunk in added {
            self.index_chunk(chunk);
        }
        ids
    }

    fn index_chunk(&mut self, chunk: Chunk) {
        self.by_document
            .entry(chunk.source_document.clone())
            .or_default()
            .insert(chunk.id);
        self.chunks.insert(chunk.id, chunk);
    }
}
