//! Example: index a few documents into the in-process vector store
//!
//! Run with: cargo run -p tessera-indexer --example local_store
//!
//! Settings come from `./tessera_config.yaml` and `TESSERA_*` variables when
//! present, e.g. `TESSERA_INDEXER__DIM=8 TESSERA_INDEXER__COLLECTION=notes`.

use std::sync::Arc;

use async_trait::async_trait;
use tessera_config::{registry::Registry, Configurable};
use tessera_error::TesseraError;
use tessera_indexer::{
    in_memory::InMemoryVectorStore, Embedder, EmbedderHandle, Indexer, IndexerConfig,
    RootConfig, StoreOptions, VectorStoreHandle,
};
use tessera_types::Document;

/// Folds bytes into a fixed number of buckets. Good enough to exercise the
/// pipeline without a model.
struct ByteBuckets {
    dim: usize,
}

#[async_trait]
impl Embedder for ByteBuckets {
    async fn embed_strs(&self, texts: &[&str]) -> Result<Vec<Vec<f64>>, Box<dyn TesseraError>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0; self.dim];
                for (i, byte) in text.bytes().enumerate() {
                    vector[i % self.dim] += f64::from(byte) / 255.0;
                }
                vector
            })
            .collect())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tessera_tracing::init_stdout_tracing(&[])?;

    let config = match RootConfig::load() {
        Ok(root) => root.indexer,
        Err(err) => {
            tracing::warn!(error = %err, "No usable config found, using dim 8");
            IndexerConfig::new(8)
        }
    };
    let dim = usize::try_from(config.dim)?;

    let store = InMemoryVectorStore::new();
    let registry = Registry::new();
    registry.register(VectorStoreHandle::new(store.clone()));
    registry.register(EmbedderHandle::new(ByteBuckets { dim }));

    let indexer = Indexer::try_from_config(&config, &registry).await?;

    let docs = vec![
        Document::new("intro", "vector stores keep embeddings").with_metadata("lang", "en"),
        Document::new("howto", "documents are embedded in one batch"),
    ];
    let ids = indexer.store(&docs, StoreOptions::default()).await?;
    println!("Stored {ids:?} into [{}]", config.collection);

    let ids = indexer
        .store(&docs[..1], StoreOptions::builder().upsert(true).build())
        .await?;
    println!("Upserted {ids:?}");
    println!(
        "Rows in partition [{}]: {}",
        config.partition,
        store.rows(&config.collection, &config.partition).len()
    );

    Ok(())
}
