//! Embedding capability used by [`crate::Indexer::store`].

use std::sync::Arc;

use async_trait::async_trait;
use tessera_config::registry::Injectable;
use tessera_error::TesseraError;

/// Transforms text into dense vectors.
///
/// All inputs of one `store` call are embedded in a single batch, so
/// implementations should send one request per call where the backend allows it.
///
/// # Examples
///
/// ```
/// use tessera_indexer::Embedder;
///
/// async fn embed_two<E: Embedder>(embedder: &E) {
///     let vectors = embedder.embed_strs(&["hello", "world"]).await.unwrap();
///     assert_eq!(vectors.len(), 2);
/// }
/// ```
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns one vector per input, in input order.
    async fn embed_strs(&self, texts: &[&str]) -> Result<Vec<Vec<f64>>, Box<dyn TesseraError>>;
}

#[async_trait]
impl<E: Embedder + ?Sized> Embedder for Arc<E> {
    async fn embed_strs(&self, texts: &[&str]) -> Result<Vec<Vec<f64>>, Box<dyn TesseraError>> {
        self.as_ref().embed_strs(texts).await
    }
}

/// Registry entry for the configured embedder.
#[derive(Clone)]
pub struct EmbedderHandle(pub Arc<dyn Embedder>);

impl Injectable for EmbedderHandle {}

impl EmbedderHandle {
    pub fn new(embedder: impl Embedder + 'static) -> Self {
        EmbedderHandle(Arc::new(embedder))
    }
}

impl std::fmt::Debug for EmbedderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EmbedderHandle")
    }
}
