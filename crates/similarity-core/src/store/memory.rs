//! In-memory backends for testing and embedded use.
//!
//! [`InMemoryStore`] implements [`VectorIndex`], [`RelationalStore`], and
//! [`KeywordStore`] over a single `Vec` behind `std::sync::RwLock`.
//! Vector search is brute-force cosine similarity; keyword matching is
//! case-insensitive substring matching on the stored text.
//!
//! [`StaticEmbedder`] maps known texts to fixed vectors.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::backend::{
    EmbeddingProvider, HybridWeights, IndexError, KeywordStore, RelationalStore, TermFilter,
    VectorIndex,
};
use crate::models::{Fragment, FragmentId};
use crate::rank::sort_by_score;
use crate::similarity::cosine;

struct StoredPoint {
    id: FragmentId,
    scope: String,
    text: String,
    vector: Vec<f32>,
}

/// In-memory fragment store for tests and embedded use.
pub struct InMemoryStore {
    collection: String,
    points: RwLock<Vec<StoredPoint>>,
    provisioned: AtomicBool,
    refuse_provisioning: bool,
    provisioning_is_lost: bool,
    failing_search: AtomicBool,
    failing_terms: RwLock<Vec<String>>,
    search_calls: AtomicUsize,
    provision_calls: AtomicUsize,
    scroll_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            points: RwLock::new(Vec::new()),
            provisioned: AtomicBool::new(true),
            refuse_provisioning: false,
            provisioning_is_lost: false,
            failing_search: AtomicBool::new(false),
            failing_terms: RwLock::new(Vec::new()),
            search_calls: AtomicUsize::new(0),
            provision_calls: AtomicUsize::new(0),
            scroll_calls: AtomicUsize::new(0),
        }
    }

    /// Start with the collection missing: vector searches report
    /// [`IndexError::CollectionNotFound`] until it is provisioned.
    pub fn without_collection(self) -> Self {
        self.provisioned.store(false, Ordering::SeqCst);
        self
    }

    /// Make [`VectorIndex::ensure_collection`] fail.
    pub fn refuse_provisioning(mut self) -> Self {
        self.refuse_provisioning = true;
        self
    }

    /// Let [`VectorIndex::ensure_collection`] succeed without the
    /// collection ever appearing.
    pub fn lose_provisioned_collection(mut self) -> Self {
        self.provisioning_is_lost = true;
        self
    }

    /// Make every vector search fail with [`IndexError::Other`].
    pub fn fail_search(&self) {
        self.failing_search.store(true, Ordering::SeqCst);
    }

    /// Make any scroll whose filter contains `term` fail.
    pub fn fail_scroll_on(&self, term: impl Into<String>) {
        self.failing_terms.write().unwrap().push(term.into());
    }

    pub fn insert(
        &self,
        id: impl Into<FragmentId>,
        scope: impl Into<String>,
        text: impl Into<String>,
        vector: Vec<f32>,
    ) {
        self.points.write().unwrap().push(StoredPoint {
            id: id.into(),
            scope: scope.into(),
            text: text.into(),
            vector,
        });
    }

    pub fn len(&self) -> usize {
        self.points.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn provision_calls(&self) -> usize {
        self.provision_calls.load(Ordering::SeqCst)
    }

    pub fn scroll_calls(&self) -> usize {
        self.scroll_calls.load(Ordering::SeqCst)
    }
}

fn contains_term(text: &str, term: &str) -> bool {
    text.to_lowercase().contains(&term.to_lowercase())
}

#[async_trait]
impl VectorIndex for InMemoryStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<Fragment>, IndexError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_search.load(Ordering::SeqCst) {
            return Err(IndexError::Other(anyhow!("index unavailable")));
        }
        if !self.provisioned.load(Ordering::SeqCst) {
            return Err(IndexError::CollectionNotFound(self.collection.clone()));
        }

        let points = self.points.read().unwrap();
        let mut hits = Vec::with_capacity(points.len());
        for p in points.iter() {
            let score = cosine(vector, &p.vector).map_err(|e| anyhow!(e))?;
            hits.push(Fragment::new(p.id.clone(), p.text.clone()).with_score(score));
        }
        sort_by_score(&mut hits);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn scroll_by_filter(&self, filter: &TermFilter, limit: usize) -> Result<Vec<Fragment>> {
        self.scroll_calls.fetch_add(1, Ordering::SeqCst);
        {
            let failing = self.failing_terms.read().unwrap();
            if let Some(term) = filter.must.iter().find(|t| failing.contains(*t)) {
                bail!("scroll failed for term {}", term);
            }
        }

        let points = self.points.read().unwrap();
        Ok(points
            .iter()
            .filter(|p| filter.must.iter().all(|t| contains_term(&p.text, t)))
            .take(limit)
            .map(|p| Fragment::new(p.id.clone(), p.text.clone()))
            .collect())
    }

    async fn ensure_collection(&self, name: &str, _dims: usize) -> Result<()> {
        self.provision_calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse_provisioning {
            bail!("cannot create collection {}", name);
        }
        if !self.provisioning_is_lost {
            self.provisioned.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[async_trait]
impl RelationalStore for InMemoryStore {
    async fn list_fragments(&self, scope: &str) -> Result<Vec<Fragment>> {
        let points = self.points.read().unwrap();
        Ok(points
            .iter()
            .filter(|p| p.scope == scope)
            .map(|p| Fragment::new(p.id.clone(), p.text.clone()).with_vector(p.vector.clone()))
            .collect())
    }
}

#[async_trait]
impl KeywordStore for InMemoryStore {
    async fn hybrid_search(
        &self,
        vector: &[f32],
        query: &str,
        weights: HybridWeights,
    ) -> Result<Vec<Fragment>> {
        let terms: Vec<&str> = query.split_whitespace().collect();
        let points = self.points.read().unwrap();

        let mut hits = Vec::with_capacity(points.len());
        for p in points.iter() {
            let keyword = if terms.is_empty() {
                0.0
            } else {
                let matched = terms.iter().filter(|t| contains_term(&p.text, t)).count();
                matched as f64 / terms.len() as f64
            };
            let semantic = cosine(vector, &p.vector)?;
            let score = weights.keyword as f64 * keyword + weights.vector as f64 * semantic;
            hits.push(Fragment::new(p.id.clone(), p.text.clone()).with_score(score));
        }
        sort_by_score(&mut hits);
        hits.truncate(weights.size);
        Ok(hits)
    }
}

/// Embedding provider returning fixed vectors for known texts.
///
/// Embedding an unknown text fails, which makes it usable for exercising
/// embedding-failure paths.
pub struct StaticEmbedder {
    dims: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl StaticEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            vectors: HashMap::new(),
        }
    }

    pub fn with(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.into(), vector);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for StaticEmbedder {
    fn model_name(&self) -> &str {
        "static"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| anyhow!("no embedding for {:?}", text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scroll_is_conjunctive_and_limited() {
        let store = InMemoryStore::new("c");
        store.insert("a", "s", "plat_no B1207KDZ warna HITAM", vec![1.0]);
        store.insert("b", "s", "plat_no B1207KDZ warna PUTIH", vec![1.0]);
        store.insert("c", "s", "plat_no D1234XX", vec![1.0]);

        let filter = TermFilter {
            field: "raw".to_string(),
            must: vec!["b1207kdz".to_string(), "putih".to_string()],
        };
        let hits = store.scroll_by_filter(&filter, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, FragmentId::from("b"));
        assert_eq!(hits[0].score, None);

        let one = store
            .scroll_by_filter(&TermFilter::must_match("raw", "plat_no"), 1)
            .await
            .unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].id, FragmentId::from("a"));
    }

    #[tokio::test]
    async fn test_failing_term() {
        let store = InMemoryStore::new("c");
        store.fail_scroll_on("boom");
        assert!(store
            .scroll_by_filter(&TermFilter::must_match("raw", "boom"), 1)
            .await
            .is_err());
        assert!(store
            .scroll_by_filter(&TermFilter::must_match("raw", "fine"), 1)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.scroll_calls(), 2);
    }

    #[tokio::test]
    async fn test_list_fragments_carries_vectors() {
        let store = InMemoryStore::new("c");
        store.insert(1i64, "s1", "x", vec![0.5, 0.5]);
        store.insert(2i64, "s2", "y", vec![0.1, 0.9]);
        let listed = store.list_fragments("s1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].vector.as_deref(), Some(&[0.5f32, 0.5][..]));
    }
}
