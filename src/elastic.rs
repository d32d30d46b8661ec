//! Elasticsearch REST client implementing [`KeywordStore`].
//!
//! One request combines an approximate kNN clause over `embedding` with a
//! `query_string` clause over `raw`; Elasticsearch sums the boosted scores.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use similarity_core::backend::{HybridWeights, KeywordStore};
use similarity_core::Fragment;

use crate::config::ElasticsearchConfig;

/// Indexed document shape.
#[derive(Debug, Clone, Serialize)]
pub struct ElasticDocument {
    pub combined: String,
    pub raw: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source")]
    source: HitSource,
}

#[derive(Debug, Deserialize)]
struct HitSource {
    combined: String,
}

pub struct ElasticClient {
    client: reqwest::Client,
    url: String,
    index: String,
}

impl ElasticClient {
    pub fn new(config: &ElasticsearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            index: config.index.clone(),
        })
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// Drop the index if present and create it with a `dims`-wide
    /// cosine `dense_vector` field.
    pub async fn recreate_index(&self, dims: usize) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/{}", self.url, self.index))
            .send()
            .await
            .context("Elasticsearch delete index request failed")?;
        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            bail!("Elasticsearch error {} deleting index: {}", status, body);
        }

        let mapping = serde_json::json!({
            "mappings": {
                "properties": {
                    "combined": { "type": "text" },
                    "raw": { "type": "text" },
                    "embedding": {
                        "type": "dense_vector",
                        "dims": dims,
                        "index": true,
                        "similarity": "cosine",
                    },
                }
            }
        });
        let response = self
            .client
            .put(format!("{}/{}", self.url, self.index))
            .json(&mapping)
            .send()
            .await
            .context("Elasticsearch create index request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Elasticsearch error {} creating index: {}", status, body);
        }
        Ok(())
    }

    pub async fn index_document(&self, id: &str, doc: &ElasticDocument) -> Result<()> {
        let response = self
            .client
            .put(format!("{}/{}/_doc/{}", self.url, self.index, id))
            .json(doc)
            .send()
            .await
            .context("Elasticsearch index request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Elasticsearch error {} indexing {}: {}", status, id, body);
        }
        Ok(())
    }
}

fn hybrid_query(vector: &[f32], query: &str, weights: HybridWeights) -> serde_json::Value {
    serde_json::json!({
        "size": weights.size,
        "_source": ["combined"],
        "knn": {
            "field": "embedding",
            "query_vector": vector,
            "k": weights.size,
            "num_candidates": weights.size,
            "boost": weights.vector,
        },
        "query": {
            "query_string": {
                "query": query,
                "fields": ["raw"],
                "minimum_should_match": 1,
                "boost": weights.keyword,
            }
        },
    })
}

#[async_trait]
impl KeywordStore for ElasticClient {
    async fn hybrid_search(
        &self,
        vector: &[f32],
        query: &str,
        weights: HybridWeights,
    ) -> Result<Vec<Fragment>> {
        let response = self
            .client
            .post(format!("{}/{}/_search", self.url, self.index))
            .json(&hybrid_query(vector, query, weights))
            .send()
            .await
            .context("Elasticsearch search request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Elasticsearch error {}: {}", status, body));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .context("Invalid Elasticsearch search response")?;

        Ok(parsed
            .hits
            .hits
            .into_iter()
            .map(|hit| {
                let fragment = Fragment::new(hit.id, hit.source.combined);
                match hit.score {
                    Some(score) => fragment.with_score(score),
                    None => fragment,
                }
            })
            .collect())
    }
}
