use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use tessera_error::{ErrorCodes, TesseraError};
use tessera_indexer::{
    in_memory::InMemoryVectorStore, ConversionError, Embedder, Indexer, IndexerConfig,
    IndexerError, RemoteOperation, StoreOptions,
};
use tessera_types::{
    default_fields, CollectionInfo, DataType, Document, FieldSchema, FieldValue, LoadState, Row,
};

const COLLECTION: &str = "tessera_collection";

#[derive(Debug, thiserror::Error)]
#[error("embedding service returned 503")]
struct EmbeddingDown;

impl TesseraError for EmbeddingDown {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::Unavailable
    }
}

/// Returns `dim`-sized vectors, optionally dropping the last one.
#[derive(Default)]
struct ScriptedEmbedder {
    dim: usize,
    drop_last: bool,
    fail: bool,
    calls: AtomicUsize,
}

impl ScriptedEmbedder {
    fn new(dim: usize) -> Self {
        ScriptedEmbedder {
            dim,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Embedder for ScriptedEmbedder {
    async fn embed_strs(&self, texts: &[&str]) -> Result<Vec<Vec<f64>>, Box<dyn TesseraError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EmbeddingDown.boxed());
        }
        let mut vectors: Vec<Vec<f64>> = texts
            .iter()
            .enumerate()
            .map(|(i, _)| vec![i as f64; self.dim])
            .collect();
        if self.drop_last {
            vectors.pop();
        }
        Ok(vectors)
    }
}

fn docs(n: usize) -> Vec<Document> {
    (0..n)
        .map(|i| Document::new(format!("doc-{i}"), format!("content {i}")).with_metadata("i", i))
        .collect()
}

async fn prepared(store: &InMemoryVectorStore, embedder: ScriptedEmbedder) -> Indexer {
    let indexer = Indexer::new(IndexerConfig::new(4), Arc::new(store.clone()))
        .await
        .unwrap()
        .with_embedder(Arc::new(embedder));
    store.clear_calls();
    indexer
}

#[test_log::test(tokio::test)]
async fn test_new_collection_is_created_once_and_loaded() {
    let store = InMemoryVectorStore::new();
    Indexer::new(IndexerConfig::new(4), Arc::new(store.clone()))
        .await
        .unwrap();

    assert_eq!(store.count_calls(RemoteOperation::CreateCollection), 1);
    assert_eq!(store.count_calls(RemoteOperation::DescribeCollection), 0);
    assert_eq!(store.load_state(COLLECTION), LoadState::Loaded);

    // A second indexer finds everything in place.
    store.clear_calls();
    Indexer::new(IndexerConfig::new(4), Arc::new(store.clone()))
        .await
        .unwrap();
    assert_eq!(
        store.calls(),
        vec![
            RemoteOperation::HasCollection,
            RemoteOperation::DescribeCollection,
            RemoteOperation::GetLoadState,
        ]
    );
}

#[test_log::test(tokio::test)]
async fn test_schema_mismatch_fails_construction() {
    let store = InMemoryVectorStore::new();
    let mut fields = default_fields(4);
    fields.push(FieldSchema::new("extra", DataType::Bool));
    store.add_collection(
        CollectionInfo {
            name: COLLECTION.to_string(),
            description: String::new(),
            fields,
        },
        LoadState::NotLoaded,
    );

    let err = Indexer::new(IndexerConfig::new(4), Arc::new(store.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, IndexerError::SchemaMismatch { .. }));
    assert!(err.to_string().starts_with("[ensure_collection]"));
    assert_eq!(store.count_calls(RemoteOperation::CreateIndex), 0);
    assert_eq!(store.count_calls(RemoteOperation::LoadCollection), 0);
}

#[test_log::test(tokio::test)]
async fn test_invalid_dimension_makes_no_remote_call() {
    let store = InMemoryVectorStore::new();
    let err = Indexer::new(IndexerConfig::new(0), Arc::new(store.clone()))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("[indexer_config]"));
    assert!(store.calls().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_load_state_error_aborts_without_polling() {
    let store = InMemoryVectorStore::new();
    store.fail_on(RemoteOperation::GetLoadState, ErrorCodes::Unavailable, "state unavailable");
    let err = Indexer::new(IndexerConfig::new(4), Arc::new(store.clone()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IndexerError::Remote {
            operation: RemoteOperation::GetLoadState,
            ..
        }
    ));
    assert_eq!(err.code(), ErrorCodes::Unavailable);
    assert_eq!(store.count_calls(RemoteOperation::GetLoadProgress), 0);
}

#[test_log::test(tokio::test)]
async fn test_lost_create_race_is_surfaced() {
    let store = InMemoryVectorStore::new();
    store.fail_on(
        RemoteOperation::CreateCollection,
        ErrorCodes::AlreadyExists,
        "collection already exists",
    );
    let err = Indexer::new(IndexerConfig::new(4), Arc::new(store.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCodes::AlreadyExists);
    assert!(err
        .to_string()
        .contains("create_collection failed: collection already exists"));
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_loading_collection_is_polled_until_loaded() {
    let store = InMemoryVectorStore::new();
    store.add_collection(
        CollectionInfo {
            name: COLLECTION.to_string(),
            description: String::new(),
            fields: default_fields(4),
        },
        LoadState::Loading,
    );
    store.script_load_progress(COLLECTION, [0, 25, 50, 75, 100]);

    Indexer::new(IndexerConfig::new(4), Arc::new(store.clone()))
        .await
        .unwrap();
    assert_eq!(store.count_calls(RemoteOperation::GetLoadProgress), 5);
    assert_eq!(store.load_state(COLLECTION), LoadState::Loaded);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_unbounded_polling_is_cancelled_by_timeout() {
    let store = InMemoryVectorStore::new();
    store.add_collection(
        CollectionInfo {
            name: COLLECTION.to_string(),
            description: String::new(),
            fields: default_fields(4),
        },
        LoadState::Loading,
    );
    store.script_load_progress(COLLECTION, std::iter::repeat(10).take(1000));

    let res = tokio::time::timeout(
        Duration::from_millis(4_750),
        Indexer::new(IndexerConfig::new(4), Arc::new(store.clone())),
    )
    .await;
    assert!(res.is_err());
    // One poll at start, then one every 500ms.
    assert_eq!(store.count_calls(RemoteOperation::GetLoadProgress), 10);
}

#[test_log::test(tokio::test)]
async fn test_store_returns_ids_in_input_order() {
    let store = InMemoryVectorStore::new();
    let indexer = prepared(&store, ScriptedEmbedder::new(4)).await;
    let docs = docs(3);

    let ids = indexer.store(&docs, StoreOptions::default()).await.unwrap();
    assert_eq!(ids, vec!["doc-0", "doc-1", "doc-2"]);
    assert_eq!(store.calls(), vec![RemoteOperation::Insert]);

    let rows = store.rows(COLLECTION, "_default");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2].varchar("content"), Some("content 2"));
    let Some(FieldValue::Json(metadata)) = rows[1].get("metadata") else {
        panic!("metadata column is not json");
    };
    assert_eq!(
        serde_json::from_slice::<serde_json::Value>(metadata).unwrap(),
        serde_json::json!({"i": 1})
    );
}

#[test_log::test(tokio::test)]
async fn test_vector_count_mismatch_writes_nothing() {
    let store = InMemoryVectorStore::new();
    let indexer = prepared(
        &store,
        ScriptedEmbedder {
            drop_last: true,
            ..ScriptedEmbedder::new(4)
        },
    )
    .await;

    let err = indexer
        .store(&docs(3), StoreOptions::builder().upsert(true).build())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IndexerError::CountMismatch {
            expected: 3,
            actual: 2
        }
    ));
    assert_eq!(store.count_calls(RemoteOperation::Insert), 0);
    assert_eq!(store.count_calls(RemoteOperation::Upsert), 0);
}

#[test_log::test(tokio::test)]
async fn test_failed_upsert_names_operation() {
    let store = InMemoryVectorStore::new();
    let indexer = prepared(&store, ScriptedEmbedder::new(4)).await;
    store.fail_on(RemoteOperation::Upsert, ErrorCodes::Unavailable, "node offline");

    let err = indexer
        .store(&docs(2), StoreOptions::builder().upsert(true).build())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "[store] upsert failed: node offline");
    assert_eq!(err.code(), ErrorCodes::Unavailable);
    assert_eq!(store.count_calls(RemoteOperation::Insert), 0);
}

#[test_log::test(tokio::test)]
async fn test_upsert_replaces_and_insert_rejects_duplicates() {
    let store = InMemoryVectorStore::new();
    let indexer = prepared(&store, ScriptedEmbedder::new(4)).await;

    indexer.store(&docs(2), StoreOptions::default()).await.unwrap();
    let err = indexer
        .store(&docs(1), StoreOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("[store] insert failed"));
    assert_eq!(err.code(), ErrorCodes::AlreadyExists);

    let updated = vec![Document::new("doc-0", "rewritten")];
    indexer
        .store(&updated, StoreOptions::builder().upsert(true).build())
        .await
        .unwrap();
    let rows = store.rows(COLLECTION, "_default");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].varchar("content"), Some("rewritten"));
}

#[test_log::test(tokio::test)]
async fn test_embedding_failure_is_reported() {
    let store = InMemoryVectorStore::new();
    let indexer = prepared(
        &store,
        ScriptedEmbedder {
            fail: true,
            ..ScriptedEmbedder::new(4)
        },
    )
    .await;
    let err = indexer
        .store(&docs(1), StoreOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, IndexerError::Embedding(_)));
    assert_eq!(
        err.to_string(),
        "[store] failed to embed documents: embedding service returned 503"
    );
    assert!(store.calls().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_embedder_called_once_per_store() {
    let store = InMemoryVectorStore::new();
    let embedder = Arc::new(ScriptedEmbedder::new(4));
    let indexer = Indexer::new(IndexerConfig::new(4), Arc::new(store.clone()))
        .await
        .unwrap()
        .with_embedder(embedder.clone());
    indexer.store(&docs(5), StoreOptions::default()).await.unwrap();
    indexer.store(&[], StoreOptions::default()).await.unwrap();
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
}

#[test_log::test(tokio::test)]
async fn test_wrong_vector_dimension_fails_conversion() {
    let store = InMemoryVectorStore::new();
    let indexer = prepared(&store, ScriptedEmbedder::new(3)).await;
    let err = indexer
        .store(&docs(1), StoreOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IndexerError::Conversion(ConversionError::Dimension { .. })
    ));
    assert_eq!(store.count_calls(RemoteOperation::Insert), 0);
}

#[test_log::test(tokio::test)]
async fn test_custom_converter_and_partition() {
    let store = InMemoryVectorStore::new();
    let mut config = IndexerConfig::new(4);
    config.partition = "archive".to_string();

    let tagging = |docs: &[Document],
                   _dim: usize,
                   vectors: &[Vec<f64>]|
     -> Result<Vec<Row>, ConversionError> {
        Ok(docs
            .iter()
            .zip(vectors)
            .map(|(doc, vector)| {
                Row::new()
                    .with("id", FieldValue::VarChar(format!("tagged-{}", doc.id)))
                    .with("content", FieldValue::VarChar(doc.content.clone()))
                    .with(
                        "vector",
                        FieldValue::FloatVector(vector.iter().map(|v| *v as f32).collect()),
                    )
                    .with("metadata", FieldValue::Json(b"null".to_vec()))
            })
            .collect())
    };

    let indexer = Indexer::new(config, Arc::new(store.clone()))
        .await
        .unwrap()
        .with_embedder(Arc::new(ScriptedEmbedder::new(4)))
        .with_converter(Arc::new(tagging));
    assert_eq!(store.count_calls(RemoteOperation::CreatePartition), 1);
    assert_eq!(store.count_calls(RemoteOperation::LoadPartitions), 1);

    // Ids reported back are the documents' own, whatever the converter does.
    let ids = indexer.store(&docs(1), StoreOptions::default()).await.unwrap();
    assert_eq!(ids, vec!["doc-0"]);
    assert!(store.rows(COLLECTION, "_default").is_empty());
    let rows = store.rows(COLLECTION, "archive");
    assert_eq!(rows[0].varchar("id"), Some("tagged-doc-0"));

    // A per-call partition wins over the configured one; empty means configured.
    indexer
        .store(
            &[Document::new("x", "y")],
            StoreOptions::builder().partition("_default").build(),
        )
        .await
        .unwrap();
    indexer
        .store(
            &[Document::new("z", "w")],
            StoreOptions::builder().partition("").build(),
        )
        .await
        .unwrap();
    assert_eq!(store.rows(COLLECTION, "_default").len(), 1);
    assert_eq!(store.rows(COLLECTION, "archive").len(), 2);
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn test_indexer_is_shared_across_tasks() {
    let store = InMemoryVectorStore::new();
    let indexer = Arc::new(prepared(&store, ScriptedEmbedder::new(4)).await);

    let handles: Vec<_> = (0..4)
        .map(|task| {
            let indexer = indexer.clone();
            tokio::spawn(async move {
                let docs = vec![Document::new(format!("task-{task}"), "shared")];
                indexer.store(&docs, StoreOptions::default()).await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(store.rows(COLLECTION, "_default").len(), 4);
}
