//! Document indexing into a vector database.
//!
//! This crate embeds documents through an [`Embedder`] and writes them into a
//! vector database reached through a [`VectorStoreClient`]. Before the first
//! write, [`Indexer::new`] makes the target collection usable: it creates the
//! collection when missing, refuses to touch one whose schema differs, builds
//! the default vector index and waits for the collection to be loaded.
//!
//! # Core Types
//!
//! - [`Indexer`] - Prepares the collection and stores documents
//! - [`IndexerConfig`] - Collection name, schema, index and load polling settings
//! - [`VectorStoreClient`] - The remote store capability
//! - [`Embedder`] - The embedding capability
//! - [`DocumentConverter`] - Maps documents and vectors to storage rows
//! - [`in_memory::InMemoryVectorStore`] - A store kept in process, for tests and local runs
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use tessera_error::TesseraError;
//! use tessera_indexer::{
//!     in_memory::InMemoryVectorStore, Embedder, Indexer, IndexerConfig, StoreOptions,
//! };
//! use tessera_types::Document;
//!
//! struct Lengths;
//!
//! #[async_trait]
//! impl Embedder for Lengths {
//!     async fn embed_strs(&self, texts: &[&str]) -> Result<Vec<Vec<f64>>, Box<dyn TesseraError>> {
//!         Ok(texts.iter().map(|t| vec![t.len() as f64; 4]).collect())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryVectorStore::new();
//! let indexer = Indexer::new(IndexerConfig::new(4), Arc::new(store.clone()))
//!     .await?
//!     .with_embedder(Arc::new(Lengths));
//!
//! let ids = indexer
//!     .store(&[Document::new("doc-1", "hello")], StoreOptions::default())
//!     .await?;
//! assert_eq!(ids, vec!["doc-1"]);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Every operation returns [`IndexerError`]. Its message starts with the phase
//! that failed (`[indexer_config]`, `[ensure_collection]`,
//! `[ensure_partition]` or `[store]`) and remote failures keep the store's
//! error as their source.
//!
//! # Cancellation
//!
//! Nothing is spawned. Dropping a future returned by this crate, for example
//! through `tokio::time::timeout`, abandons the remote call in flight and any
//! remaining polling.

pub mod client;
pub mod config;
pub mod converter;
pub mod embed;
pub mod errors;
pub mod in_memory;
mod indexer;
#[cfg(feature = "opentelemetry")]
pub mod metrics;
pub mod readiness;
pub mod schema_check;

pub use client::{RemoteOperation, VectorStoreClient, VectorStoreHandle};
pub use config::{IndexerConfig, RootConfig};
pub use converter::{ConversionError, ConverterHandle, DefaultDocumentConverter, DocumentConverter};
pub use embed::{Embedder, EmbedderHandle};
pub use errors::{ConfigurationError, IndexerError};
pub use indexer::{Indexer, StoreOptions};
pub use readiness::{ensure_collection, ensure_partition, LoadPollPolicy, DEFAULT_PARTITION};
pub use schema_check::fields_match;
