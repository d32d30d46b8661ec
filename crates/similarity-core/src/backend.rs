//! Collaborator contracts consumed by the retrieval pipeline.
//!
//! Implementations live outside this crate (SQLite, Qdrant, Elasticsearch,
//! OpenAI) or in [`crate::store::memory`] for tests. All traits are
//! `Send + Sync` and async via `async-trait`.
//!
//! | Trait | Capability |
//! |-------|------------|
//! | [`EmbeddingProvider`] | text → vector |
//! | [`AnswerGenerator`] | prompt → answer text |
//! | [`VectorIndex`] | nearest-neighbour search, exact-term scroll, collection provisioning |
//! | [`RelationalStore`] | every fragment (with vector) of a scope |
//! | [`KeywordStore`] | weighted keyword + vector query |

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::models::Fragment;

/// Turns text into an embedding vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed a single text. Failures are surfaced verbatim.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Produces an answer for a fully assembled prompt.
///
/// One message in, one answer out; no conversation state.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Failure of a [`VectorIndex`] search.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The index has no collection with this name yet.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A conjunctive filter: every term must match `field`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermFilter {
    pub field: String,
    pub must: Vec<String>,
}

impl TermFilter {
    /// Filter requiring `field` to contain `term`.
    pub fn must_match(field: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            must: vec![term.into()],
        }
    }
}

/// Remote nearest-neighbour index (Qdrant in production).
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Name of the collection searched by this connection.
    fn collection(&self) -> &str;

    /// Nearest `limit` points to `vector`, best first, with only the
    /// payload needed to rebuild a [`Fragment`].
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<Fragment>, IndexError>;

    /// Up to `limit` points matching every term of `filter`, unscored.
    async fn scroll_by_filter(&self, filter: &TermFilter, limit: usize) -> Result<Vec<Fragment>>;

    /// Create the collection if it does not exist. Idempotent.
    async fn ensure_collection(&self, name: &str, dims: usize) -> Result<()>;
}

/// Relational store holding fragments with their embeddings.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Every fragment of `scope`, each carrying its vector.
    async fn list_fragments(&self, scope: &str) -> Result<Vec<Fragment>>;
}

/// Weights and size of a hybrid keyword + vector query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridWeights {
    pub keyword: f32,
    pub vector: f32,
    pub size: usize,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            keyword: 0.9,
            vector: 0.1,
            size: 3,
        }
    }
}

/// Keyword index with an additional vector field (Elasticsearch in production).
#[async_trait]
pub trait KeywordStore: Send + Sync {
    /// Single query scoring keyword relevance of `query` and similarity to
    /// `vector`, combined with `weights`, returning at most `weights.size`
    /// fragments best first.
    async fn hybrid_search(
        &self,
        vector: &[f32],
        query: &str,
        weights: HybridWeights,
    ) -> Result<Vec<Fragment>>;
}
