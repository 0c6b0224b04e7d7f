//! On-disk chunk store format.
//!
//! One file: a header line followed by a JSON body.
//!
//! ```text
//! DOCQA-STORE v1 sha256=<hex digest of body>
//! {"dimensions": 768, "next_id": 42, "chunks": [...]}
//! ```
//!
//! Writes go to a temp file in the same directory which is fsynced and then
//! renamed over the store file, so a reader sees either the old or the new
//! snapshot. Temp files left behind by a crash never match the store name.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkId};

const MAGIC: &str = "DOCQA-STORE";
const VERSION: &str = "v1";

#[derive(Serialize)]
struct BodyRef<'a> {
    dimensions: usize,
    next_id: ChunkId,
    chunks: Vec<&'a Chunk>,
}

#[derive(Deserialize)]
struct Body {
    dimensions: usize,
    next_id: ChunkId,
    chunks: Vec<Chunk>,
}

/// Validated contents of a store file
#[derive(Debug)]
pub struct Snapshot {
    pub next_id: ChunkId,
    pub chunks: Vec<Chunk>,
}

fn hash_body(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    hex::encode(hasher.finalize())
}

/// Atomically replace the store file at `path`
pub fn write<'a>(
    path: &Path,
    dimensions: usize,
    next_id: ChunkId,
    chunks: impl Iterator<Item = &'a Chunk>,
) -> Result<()> {
    let body = serde_json::to_vec(&BodyRef {
        dimensions,
        next_id,
        chunks: chunks.collect(),
    })?;
    let header = format!("{} {} sha256={}\n", MAGIC, VERSION, hash_body(&body));

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".chunks-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(header.as_bytes())?;
    tmp.write_all(&body)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;

    // Make the rename itself durable
    #[cfg(unix)]
    if let Err(e) = std::fs::File::open(dir).and_then(|d| d.sync_all()) {
        tracing::warn!(
            "Could not sync directory {}, the store rename may not be durable: {}",
            dir.display(),
            e
        );
    }

    Ok(())
}

/// Load and validate the store file. A missing file is `Ok(None)`.
pub fn read(path: &Path, dimensions: usize) -> Result<Option<Snapshot>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let newline = bytes
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| Error::corruption(path, "missing header line"))?;
    let header = std::str::from_utf8(&bytes[..newline])
        .map_err(|_| Error::corruption(path, "header is not UTF-8"))?;
    let body = &bytes[newline + 1..];

    let mut parts = header.split(' ');
    if parts.next() != Some(MAGIC) {
        return Err(Error::corruption(path, "not a chunk store file"));
    }
    match parts.next() {
        Some(VERSION) => {}
        Some(other) => {
            return Err(Error::corruption(
                path,
                format!("unsupported store version {}", other),
            ))
        }
        None => return Err(Error::corruption(path, "missing store version")),
    }
    let expected = parts
        .next()
        .and_then(|p| p.strip_prefix("sha256="))
        .ok_or_else(|| Error::corruption(path, "missing checksum"))?;

    if hash_body(body) != expected {
        return Err(Error::corruption(path, "checksum mismatch"));
    }

    let parsed: Body = serde_json::from_slice(body)
        .map_err(|e| Error::corruption(path, format!("unreadable body: {}", e)))?;

    if parsed.dimensions != dimensions {
        return Err(Error::corruption(
            path,
            format!(
                "store has {} dimensions, configured embeddings have {}",
                parsed.dimensions, dimensions
            ),
        ));
    }

    let mut seen = HashSet::with_capacity(parsed.chunks.len());
    for chunk in &parsed.chunks {
        if chunk.embedding.len() != dimensions {
            return Err(Error::corruption(
                path,
                format!("chunk {} has {} dimensions", chunk.id, chunk.embedding.len()),
            ));
        }
        if chunk.id >= parsed.next_id {
            return Err(Error::corruption(
                path,
                format!("chunk id {} is not below next_id {}", chunk.id, parsed.next_id),
            ));
        }
        if chunk.source_document.is_empty() {
            return Err(Error::corruption(
                path,
                format!("chunk {} has no source document", chunk.id),
            ));
        }
        if !seen.insert(chunk.id) {
            return Err(Error::corruption(
                path,
                format!("duplicate chunk id {}", chunk.id),
            ));
        }
    }

    Ok(Some(Snapshot {
        next_id: parsed.next_id,
        chunks: parsed.chunks,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn chunk(id: ChunkId, doc: &str) -> Chunk {
        Chunk {
            id,
            text: format!("chunk {}", id),
            embedding: vec![id as f32, 1.0],
            source_document: doc.to_string(),
            position: id as u32,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read(&dir.path().join("chunks.db"), 2).unwrap().is_none());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.db");
        let chunks = vec![chunk(0, "a.txt"), chunk(3, "b.txt")];

        write(&path, 2, 7, chunks.iter()).unwrap();
        let snapshot = read(&path, 2).unwrap().unwrap();

        assert_eq!(snapshot.next_id, 7);
        assert_eq!(snapshot.chunks, chunks);
        // only the store file remains
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_tampered_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.db");
        write(&path, 2, 1, [chunk(0, "a.txt")].iter()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, content.replace("chunk 0", "chunk X")).unwrap();

        assert!(matches!(
            read(&path, 2),
            Err(Error::StorageCorruption { .. })
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.db");
        write(&path, 2, 1, [chunk(0, "a.txt")].iter()).unwrap();

        assert!(matches!(
            read(&path, 3),
            Err(Error::StorageCorruption { .. })
        ));
    }

    #[test]
    fn test_id_beyond_next_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.db");
        write(&path, 2, 1, [chunk(5, "a.txt")].iter()).unwrap();

        assert!(matches!(
            read(&path, 2),
            Err(Error::StorageCorruption { .. })
        ));
    }

    #[test]
    fn test_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.db");
        std::fs::write(&path, "hello").unwrap();

        assert!(matches!(
            read(&path, 2),
            Err(Error::StorageCorruption { .. })
        ));
    }
}
