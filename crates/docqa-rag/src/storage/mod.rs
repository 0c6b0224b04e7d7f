//! Chunk persistence and the locked indexing engine

mod document_index;
mod record_store;
pub mod snapshot;

pub use document_index::{ClearOutcome, CommitOutcome, DocumentIndex, ResolvedHit};
pub use record_store::RecordStore;
