//! Backend search adapters.
//!
//! Each adapter turns a raw query into a scored result set through one
//! retrieval strategy and exposes it behind the uniform [`SearchBackend`]
//! trait, so the pipeline can hold any of them interchangeably.
//!
//! | Adapter | Strategy | Result size |
//! |---------|----------|-------------|
//! | [`VectorSearch`] | remote nearest neighbours | 3 |
//! | [`RelationalSearch`] | load scope, rank in-process | `top_n` (5) |
//! | [`HybridSearch`] | keyword 0.9 + vector 0.1 | 3 |
//!
//! Every adapter embeds the query itself; an embedding failure is reported
//! as [`Error::Embedding`]. Backend failures are [`Error::Retrieval`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::backend::{
    EmbeddingProvider, HybridWeights, IndexError, KeywordStore, RelationalStore, VectorIndex,
};
use crate::error::{Error, Result};
use crate::merge::dedup_by_id;
use crate::models::{Fragment, Strategy};
use crate::rank::rank;

/// Nearest neighbours requested from the vector index.
pub const VECTOR_SEARCH_LIMIT: usize = 3;

/// Fragments kept by the relational ranker.
pub const RELATIONAL_TOP_N: i64 = 5;

/// Uniform "query in, ranked fragments out" contract.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn strategy(&self) -> Strategy;

    async fn search(&self, query: &str) -> Result<Vec<Fragment>>;
}

async fn embed_query(embedder: &dyn EmbeddingProvider, query: &str) -> Result<Vec<f32>> {
    embedder.embed(query).await.map_err(Error::embedding)
}

// ============ Vector index ============

/// Nearest-neighbour search against a remote [`VectorIndex`].
///
/// If the index reports that the collection does not exist, the adapter
/// provisions it and retries the search exactly once.
pub struct VectorSearch {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    limit: usize,
}

impl VectorSearch {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            limit: VECTOR_SEARCH_LIMIT,
        }
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Search with an already computed query vector.
    pub async fn search_vector(&self, vector: &[f32]) -> Result<Vec<Fragment>> {
        let backend = Strategy::Vector.as_str();

        let fragments = match self.index.search(vector, self.limit).await {
            Ok(fragments) => fragments,
            Err(IndexError::CollectionNotFound(name)) => {
                warn!(collection = %name, "collection not found, provisioning and retrying once");
                self.index
                    .ensure_collection(self.index.collection(), self.embedder.dims())
                    .await
                    .map_err(|e| Error::retrieval(backend, e))?;
                self.index
                    .search(vector, self.limit)
                    .await
                    .map_err(|e| Error::retrieval(backend, e))?
            }
            Err(e) => return Err(Error::retrieval(backend, e)),
        };

        if fragments.is_empty() {
            return Err(Error::retrieval(backend, "no result found"));
        }
        Ok(fragments)
    }
}

#[async_trait]
impl SearchBackend for VectorSearch {
    fn strategy(&self) -> Strategy {
        Strategy::Vector
    }

    async fn search(&self, query: &str) -> Result<Vec<Fragment>> {
        let vector = embed_query(self.embedder.as_ref(), query).await?;
        let fragments = self.search_vector(&vector).await?;
        for f in &fragments {
            debug!(id = %f.id, relatedness = f.score.unwrap_or_default(), "vector hit");
        }
        Ok(fragments)
    }
}

// ============ Relational ============

/// Loads every fragment of a scope and ranks it in-process.
pub struct RelationalSearch {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn RelationalStore>,
    scope: String,
    top_n: i64,
}

impl RelationalSearch {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn RelationalStore>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            scope: scope.into(),
            top_n: RELATIONAL_TOP_N,
        }
    }

    pub fn with_top_n(mut self, top_n: i64) -> Self {
        self.top_n = top_n;
        self
    }
}

#[async_trait]
impl SearchBackend for RelationalSearch {
    fn strategy(&self) -> Strategy {
        Strategy::Relational
    }

    async fn search(&self, query: &str) -> Result<Vec<Fragment>> {
        let vector = embed_query(self.embedder.as_ref(), query).await?;
        let candidates = self
            .store
            .list_fragments(&self.scope)
            .await
            .map_err(|e| Error::retrieval(Strategy::Relational.as_str(), e))?;
        debug!(scope = %self.scope, candidates = candidates.len(), "ranking scope");
        rank(&vector, candidates, self.top_n)
    }
}

// ============ Hybrid ============

/// One combined keyword + vector query against a [`KeywordStore`].
pub struct HybridSearch {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn KeywordStore>,
    weights: HybridWeights,
}

impl HybridSearch {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn KeywordStore>) -> Self {
        Self {
            embedder,
            store,
            weights: HybridWeights::default(),
        }
    }
}

#[async_trait]
impl SearchBackend for HybridSearch {
    fn strategy(&self) -> Strategy {
        Strategy::Hybrid
    }

    async fn search(&self, query: &str) -> Result<Vec<Fragment>> {
        let vector = embed_query(self.embedder.as_ref(), query).await?;
        let fragments = self
            .store
            .hybrid_search(&vector, query, self.weights)
            .await
            .map_err(|e| Error::retrieval(Strategy::Hybrid.as_str(), e))?;
        Ok(dedup_by_id(fragments))
    }
}
