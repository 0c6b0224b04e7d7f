//! Similarity search over chunk embeddings

mod flat;

pub use flat::FlatIndex;

use crate::error::Result;
use crate::types::ChunkId;

/// One nearest-neighbour result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub id: ChunkId,
    /// Distance to the query (lower is closer)
    pub distance: f32,
}

/// Trait for the k-nearest-neighbour primitive.
///
/// The index holds derived state only: it can always be rebuilt from the
/// record store, and it has no notion of documents or deletion.
///
/// Implementations:
/// - `FlatIndex`: exact brute-force scan
pub trait SimilarityIndex: Send + Sync {
    /// Replace the contents wholesale
    fn rebuild(&mut self, entries: &mut dyn Iterator<Item = (ChunkId, &[f32])>);

    /// Add one entry. Only valid for ids not already present.
    fn insert(&mut self, id: ChunkId, embedding: &[f32]) -> Result<()>;

    /// Up to `k` hits ordered by ascending distance, ties by ascending id
    fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit>;

    /// Number of entries
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Implementation name for logging
    fn name(&self) -> &str;
}
