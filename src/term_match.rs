//! Scatter-gather exact-term matching.
//!
//! Identifier-like queries ("plat nomor B1207KDZ") are poorly served by
//! embeddings alone. The [`TermMatcher`] splits the query on whitespace and
//! runs one exact-term scroll per term against the vector index, all
//! concurrently on a [`JoinSet`]. Hits are merged behind the primary
//! results without a score.
//!
//! The first failing lookup fails the whole call; tasks still in flight
//! are detached and their results dropped.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info};

use similarity_core::backend::{TermFilter, VectorIndex};
use similarity_core::merge::{dedup_by_id, merge_unscored};
use similarity_core::{Error, Fragment, Result};

use crate::qdrant::RAW_FIELD;

/// Hits kept per term.
pub const HITS_PER_TERM: usize = 1;

pub struct TermMatcher {
    index: Arc<dyn VectorIndex>,
    field: String,
    per_term: usize,
}

impl TermMatcher {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self {
            index,
            field: RAW_FIELD.to_string(),
            per_term: HITS_PER_TERM,
        }
    }

    /// Look up every whitespace-separated term of `query` concurrently.
    ///
    /// Returns at most one unscored fragment per term, deduplicated by id
    /// with the earliest term winning.
    pub async fn lookup(&self, query: &str) -> Result<Vec<Fragment>> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_string).collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut set = JoinSet::new();
        for (position, term) in terms.iter().enumerate() {
            let index = Arc::clone(&self.index);
            let filter = TermFilter::must_match(self.field.clone(), term.clone());
            let limit = self.per_term;
            let term = term.clone();
            set.spawn(async move {
                let result = index.scroll_by_filter(&filter, limit).await;
                (position, term, result)
            });
        }

        let mut by_term: Vec<Vec<Fragment>> = vec![Vec::new(); terms.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((position, _, Ok(mut hits))) => {
                    hits.truncate(self.per_term);
                    by_term[position] = hits;
                }
                Ok((_, term, Err(e))) => {
                    set.detach_all();
                    return Err(Error::term_match(term, e));
                }
                Err(join_err) => {
                    set.detach_all();
                    return Err(Error::term_match("<task>", join_err));
                }
            }
        }

        let hits = dedup_by_id(
            by_term
                .into_iter()
                .flatten()
                .map(|f| Fragment { score: None, ..f })
                .collect(),
        );
        debug!(terms = terms.len(), hits = hits.len(), "term lookups finished");
        Ok(hits)
    }

    /// Run [`lookup`](Self::lookup) and append hits not already in
    /// `results`. Returns how many were appended.
    pub async fn augment(&self, query: &str, results: &mut Vec<Fragment>) -> Result<usize> {
        let hits = self.lookup(query).await?;
        let added = merge_unscored(results, hits);
        info!(added, "merged exact-term matches");
        Ok(added)
    }
}
