mod common;

use tempfile::TempDir;

use common::{test_config, Harness, KEYWORDS, THREE_CHUNKS};
use docqa_rag::config::{DeletePolicy, STORE_FILE_NAME};
use docqa_rag::{DocumentIndex, Error, RecordStore};

#[tokio::test]
async fn test_reload_restores_documents() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let (count, documents, max_id) = {
        let harness = Harness::open(&config).unwrap();
        harness.pipeline.ingest_text("a.txt", THREE_CHUNKS).await.unwrap();
        harness.pipeline.ingest_text("b.txt", "banana date").await.unwrap();
        harness.pipeline.ingest_text("c.txt", "cherry").await.unwrap();
        harness.pipeline.delete("c.txt").await.unwrap();

        let max_id = harness
            .index
            .search(&[0.0; 4], 10)
            .iter()
            .map(|h| h.chunk.id)
            .max()
            .unwrap();
        (harness.index.count(), harness.index.list_documents(), max_id)
    };

    assert!(dir.path().join(STORE_FILE_NAME).exists());

    let harness = Harness::open(&config).unwrap();
    assert_eq!(harness.index.count(), count);
    assert_eq!(harness.index.list_documents(), documents);

    // Ids are never reused, not even the deleted document's
    let report = harness.pipeline.ingest_text("d.txt", "date").await.unwrap();
    assert_eq!(report.chunks, 1);
    let new_id = harness
        .index
        .search(&[0.0, 0.0, 0.0, 1.0], 10)
        .into_iter()
        .find(|h| h.chunk.source_document == "d.txt")
        .map(|h| h.chunk.id)
        .unwrap();
    assert!(new_id > max_id + 1);
}

#[tokio::test]
async fn test_tampered_store_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    {
        let harness = Harness::open(&config).unwrap();
        harness.pipeline.ingest_text("a.txt", THREE_CHUNKS).await.unwrap();
    }

    let path = config.store_path();
    let contents = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, contents.replacen("banana", "bandana", 1)).unwrap();

    let err = RecordStore::open(&path, KEYWORDS.len()).unwrap_err();
    assert!(matches!(err, Error::StorageCorruption { .. }));
    assert!(matches!(
        DocumentIndex::open(&config),
        Err(Error::StorageCorruption { .. })
    ));
}

#[tokio::test]
async fn test_dimension_change_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    {
        let harness = Harness::open(&config).unwrap();
        harness.pipeline.ingest_text("a.txt", "apple").await.unwrap();
    }

    let err = RecordStore::open(config.store_path(), KEYWORDS.len() + 1).unwrap_err();
    assert!(matches!(err, Error::StorageCorruption { .. }));
}

#[tokio::test]
async fn test_tombstones_do_not_survive_restart() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.vector_db.delete_policy = DeletePolicy::Tombstone {
        compact_threshold: 100,
    };

    {
        let harness = Harness::open(&config).unwrap();
        harness.pipeline.ingest_text("a.txt", THREE_CHUNKS).await.unwrap();
        harness.pipeline.ingest_text("b.txt", "banana").await.unwrap();
        harness.pipeline.delete("a.txt").await.unwrap();

        assert_eq!(harness.index.pending_tombstones(), 3);
        assert_eq!(harness.index.index_len(), 4);
        let hits = harness.index.search(&[1.0, 0.0, 0.0, 0.0], 4);
        assert!(hits.iter().all(|h| h.chunk.source_document == "b.txt"));
    }

    let harness = Harness::open(&config).unwrap();
    assert_eq!(harness.index.pending_tombstones(), 0);
    assert_eq!(harness.index.index_len(), 1);
}

#[tokio::test]
async fn test_clear_persists() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    {
        let harness = Harness::open(&config).unwrap();
        harness.pipeline.ingest_text("a.txt", THREE_CHUNKS).await.unwrap();
        let outcome = harness.pipeline.clear().await.unwrap();
        assert_eq!(outcome.documents, 1);
        assert_eq!(outcome.chunks, 3);
    }

    let harness = Harness::open(&config).unwrap();
    assert!(harness.index.is_empty());
    assert!(harness.index.list_documents().is_empty());
}
