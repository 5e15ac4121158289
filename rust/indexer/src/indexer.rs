use std::sync::Arc;

use async_trait::async_trait;
use bon::Builder;
use tessera_config::{registry::Registry, Configurable};
use tessera_error::TesseraError;
use tessera_types::{CollectionDescriptor, Document};

use crate::{
    client::{RemoteOperation, VectorStoreClient, VectorStoreHandle},
    config::IndexerConfig,
    converter::{ConverterHandle, DefaultDocumentConverter, DocumentConverter},
    embed::{Embedder, EmbedderHandle},
    errors::{ConfigurationError, IndexerError},
    readiness::{ensure_collection, ensure_partition},
};

#[cfg(feature = "opentelemetry")]
static METRICS: std::sync::LazyLock<crate::metrics::Metrics> =
    std::sync::LazyLock::new(crate::metrics::Metrics::new);

/// Per-call options of [`Indexer::store`].
#[derive(Clone, Default, Builder)]
pub struct StoreOptions {
    /// Partition to write into instead of the configured one. An empty name
    /// means the configured partition.
    #[builder(into)]
    pub partition: Option<String>,
    /// Replace rows with the same primary key instead of inserting.
    #[builder(default)]
    pub upsert: bool,
    /// Embedder to use instead of the configured one.
    pub embedder: Option<Arc<dyn Embedder>>,
}

/// Embeds documents and writes them into a prepared collection.
///
/// Constructing an indexer prepares the collection: it is created if missing,
/// checked against the configured schema if present, indexed and loaded.
/// After that the indexer only holds configuration and shared handles, so it
/// can be used from many tasks at once.
pub struct Indexer {
    config: IndexerConfig,
    descriptor: CollectionDescriptor,
    client: Arc<dyn VectorStoreClient>,
    embedder: Option<Arc<dyn Embedder>>,
    converter: Arc<dyn DocumentConverter>,
}

impl std::fmt::Debug for Indexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("collection", &self.config.collection)
            .field("partition", &self.config.partition)
            .field("client", &self.client)
            .field("has_embedder", &self.embedder.is_some())
            .finish()
    }
}

impl Indexer {
    /// Validates `config` and brings the configured collection and partition
    /// into a writable state.
    pub async fn new(
        config: IndexerConfig,
        client: Arc<dyn VectorStoreClient>,
    ) -> Result<Self, IndexerError> {
        let descriptor = config.to_descriptor()?;

        #[cfg(feature = "opentelemetry")]
        let started_at = std::time::Instant::now();

        let res = match ensure_collection(client.as_ref(), &descriptor, &config.load_poll).await {
            Ok(()) => ensure_partition(client.as_ref(), &descriptor.name, &config.partition).await,
            Err(err) => Err(err),
        };

        #[cfg(feature = "opentelemetry")]
        METRICS.record_operation(
            "ensure_collection",
            res.is_ok(),
            started_at.elapsed().as_secs_f64() * 1000.0,
        );

        if let Err(err) = &res {
            tracing::error!(collection = %descriptor.name, error = %err, "Failed to prepare collection");
        }
        res?;

        Ok(Indexer {
            config,
            descriptor,
            client,
            embedder: None,
            converter: Arc::new(DefaultDocumentConverter),
        })
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn DocumentConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn descriptor(&self) -> &CollectionDescriptor {
        &self.descriptor
    }

    /// Embeds `docs` in one batch, converts them to rows and writes them.
    ///
    /// Returns the documents' own ids in input order. Nothing is written when
    /// embedding or conversion fails, and an empty input makes no remote call.
    #[tracing::instrument(skip_all, fields(collection = %self.descriptor.name, docs = docs.len(), upsert = options.upsert))]
    pub async fn store(
        &self,
        docs: &[Document],
        options: StoreOptions,
    ) -> Result<Vec<String>, IndexerError> {
        #[cfg(feature = "opentelemetry")]
        let started_at = std::time::Instant::now();

        let res = self.store_inner(docs, options).await;

        #[cfg(feature = "opentelemetry")]
        METRICS.record_operation(
            "store",
            res.is_ok(),
            started_at.elapsed().as_secs_f64() * 1000.0,
        );

        if let Err(err) = &res {
            tracing::warn!(error = %err, "Store failed");
        }
        res
    }

    async fn store_inner(
        &self,
        docs: &[Document],
        options: StoreOptions,
    ) -> Result<Vec<String>, IndexerError> {
        let embedder = options
            .embedder
            .or_else(|| self.embedder.clone())
            .ok_or(ConfigurationError::MissingEmbedder)?;

        let partition = match options.partition.filter(|p| !p.is_empty()) {
            Some(partition) if self.descriptor.partition_key_enabled() => {
                return Err(ConfigurationError::PartitionWithPartitionKey {
                    partition,
                    partition_num: self.descriptor.partition_num,
                }
                .into());
            }
            Some(partition) => partition,
            None => self.config.partition.clone(),
        };

        if docs.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = docs.iter().map(|doc| doc.content.as_str()).collect();
        let vectors = embedder
            .embed_strs(&texts)
            .await
            .map_err(IndexerError::Embedding)?;
        if vectors.len() != docs.len() {
            return Err(IndexerError::CountMismatch {
                expected: docs.len(),
                actual: vectors.len(),
            });
        }

        let rows = self
            .converter
            .convert(docs, self.descriptor.dim as usize, &vectors)?;

        let collection = self.descriptor.name.as_str();
        let written = if options.upsert {
            self.client
                .upsert(collection, &partition, rows)
                .await
                .map_err(IndexerError::remote(RemoteOperation::Upsert))?
        } else {
            self.client
                .insert(collection, &partition, rows)
                .await
                .map_err(IndexerError::remote(RemoteOperation::Insert))?
        };
        tracing::debug!(written, %partition, "Stored documents");

        Ok(docs.iter().map(|doc| doc.id.clone()).collect())
    }
}

#[async_trait]
impl Configurable<IndexerConfig> for Indexer {
    /// Resolves the vector store client (required), the embedder and the
    /// converter (both optional) from the registry.
    async fn try_from_config(
        config: &IndexerConfig,
        registry: &Registry,
    ) -> Result<Self, Box<dyn TesseraError>> {
        let Some(VectorStoreHandle(client)) = registry.try_get::<VectorStoreHandle>() else {
            return Err(IndexerError::from(ConfigurationError::MissingClient).boxed());
        };
        let mut indexer = Indexer::new(config.clone(), client)
            .await
            .map_err(|err| err.boxed())?;
        if let Some(EmbedderHandle(embedder)) = registry.try_get::<EmbedderHandle>() {
            indexer = indexer.with_embedder(embedder);
        }
        if let Some(ConverterHandle(converter)) = registry.try_get::<ConverterHandle>() {
            indexer = indexer.with_converter(converter);
        }
        Ok(indexer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryVectorStore;
    use tessera_error::{ErrorCodes, TesseraError};
    use tessera_types::{FieldValue, LoadState};

    #[derive(Debug)]
    struct FixedEmbedder {
        dim: usize,
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed_strs(
            &self,
            texts: &[&str],
        ) -> Result<Vec<Vec<f64>>, Box<dyn TesseraError>> {
            Ok(texts
                .iter()
                .map(|text| vec![text.len() as f64; self.dim])
                .collect())
        }
    }

    async fn indexer(store: &InMemoryVectorStore) -> Indexer {
        Indexer::new(IndexerConfig::new(3), Arc::new(store.clone()))
            .await
            .unwrap()
            .with_embedder(Arc::new(FixedEmbedder { dim: 3 }))
    }

    #[test_log::test(tokio::test)]
    async fn test_store_inserts_default_rows() {
        let store = InMemoryVectorStore::new();
        let indexer = indexer(&store).await;
        let docs = vec![Document::new("b", "bee"), Document::new("a", "a")];
        let ids = indexer.store(&docs, StoreOptions::default()).await.unwrap();
        assert_eq!(ids, vec!["b", "a"]);

        let rows = store.rows("tessera_collection", "_default");
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[1].get("vector"),
            Some(&FieldValue::FloatVector(vec![3.0, 3.0, 3.0]))
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_store_without_embedder() {
        let store = InMemoryVectorStore::new();
        let indexer = Indexer::new(IndexerConfig::new(3), Arc::new(store.clone()))
            .await
            .unwrap();
        let err = indexer
            .store(&[Document::new("a", "x")], StoreOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IndexerError::Configuration(ConfigurationError::MissingEmbedder)
        ));
        assert_eq!(err.code(), ErrorCodes::InvalidArgument);
    }

    #[test_log::test(tokio::test)]
    async fn test_per_call_embedder_overrides_configured() {
        let store = InMemoryVectorStore::new();
        let indexer = Indexer::new(IndexerConfig::new(2), Arc::new(store.clone()))
            .await
            .unwrap();
        let options = StoreOptions::builder()
            .embedder(Arc::new(FixedEmbedder { dim: 2 }) as Arc<dyn Embedder>)
            .build();
        let ids = indexer
            .store(&[Document::new("a", "x")], options)
            .await
            .unwrap();
        assert_eq!(ids, vec!["a"]);
    }

    #[test_log::test(tokio::test)]
    async fn test_empty_input_makes_no_remote_call() {
        let store = InMemoryVectorStore::new();
        let indexer = indexer(&store).await;
        store.clear_calls();
        let ids = indexer.store(&[], StoreOptions::default()).await.unwrap();
        assert!(ids.is_empty());
        assert!(store.calls().is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_partition_rejected_in_partition_key_mode() {
        let store = InMemoryVectorStore::new();
        let mut config = IndexerConfig::new(3);
        config.partition_num = 8;
        let indexer = Indexer::new(config, Arc::new(store.clone()))
            .await
            .unwrap()
            .with_embedder(Arc::new(FixedEmbedder { dim: 3 }));
        store.clear_calls();

        let err = indexer
            .store(
                &[Document::new("a", "x")],
                StoreOptions::builder().partition("archive").build(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IndexerError::Configuration(ConfigurationError::PartitionWithPartitionKey { .. })
        ));
        assert!(store.calls().is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_configurable_requires_client() {
        let registry = Registry::new();
        let err = Indexer::try_from_config(&IndexerConfig::new(3), &registry)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCodes::InvalidArgument);
        assert!(err.to_string().contains("vector store client is not set"));
    }

    #[test_log::test(tokio::test)]
    async fn test_configurable_resolves_capabilities() {
        let store = InMemoryVectorStore::new();
        let registry = Registry::new();
        registry.register(VectorStoreHandle::new(store.clone()));
        registry.register(EmbedderHandle::new(FixedEmbedder { dim: 3 }));

        let indexer = Indexer::try_from_config(&IndexerConfig::new(3), &registry)
            .await
            .unwrap();
        assert_eq!(store.load_state("tessera_collection"), LoadState::Loaded);
        indexer
            .store(&[Document::new("a", "x")], StoreOptions::default())
            .await
            .unwrap();
        assert_eq!(store.rows("tessera_collection", "_default").len(), 1);
    }
}
