//! Qdrant REST client implementing [`VectorIndex`].
//!
//! Talks to the HTTP API directly with `reqwest`:
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | search | `POST /collections/{c}/points/search` |
//! | scroll | `POST /collections/{c}/points/scroll` |
//! | create | `PUT /collections/{c}` |
//! | delete | `DELETE /collections/{c}` |
//! | upsert | `PUT /collections/{c}/points?wait=true` |
//!
//! Only the `combined` payload field is fetched back; `raw` exists for
//! full-text term filters.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use similarity_core::backend::{IndexError, TermFilter, VectorIndex};
use similarity_core::{Fragment, FragmentId};

use crate::config::QdrantConfig;

/// Payload field holding the fragment text.
pub const TEXT_FIELD: &str = "combined";
/// Payload field holding the label-free text used by term filters.
pub const RAW_FIELD: &str = "raw";

/// A point to upsert.
#[derive(Debug, Clone, Serialize)]
pub struct Point {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct PointPayload {
    pub combined: String,
    pub raw: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: serde_json::Value,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    payload: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ScrollResult {
    points: Vec<ScoredPoint>,
}

impl ScoredPoint {
    fn into_fragment(self) -> Result<Fragment> {
        let id = match self.id {
            serde_json::Value::String(s) => FragmentId::Point(s),
            serde_json::Value::Number(n) => FragmentId::Row(
                n.as_i64()
                    .ok_or_else(|| anyhow!("unsupported point id: {}", n))?,
            ),
            other => bail!("unsupported point id: {}", other),
        };
        let text = self
            .payload
            .as_ref()
            .and_then(|p| p.get(TEXT_FIELD))
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("point {} has no '{}' payload", id, TEXT_FIELD))?
            .to_string();

        let fragment = Fragment::new(id, text);
        Ok(match self.score {
            Some(score) => fragment.with_score(score),
            None => fragment,
        })
    }
}

pub struct QdrantClient {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    collection: String,
    memmap_threshold: u64,
    hnsw_on_disk: bool,
    hnsw_m: u64,
    hnsw_ef_construct: u64,
}

impl QdrantClient {
    pub fn new(config: &QdrantConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            collection: config.collection.clone(),
            memmap_threshold: config.memmap_threshold,
            hnsw_on_disk: config.hnsw_on_disk,
            hnsw_m: config.hnsw_m,
            hnsw_ef_construct: config.hnsw_ef_construct,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, format!("{}{}", self.url, path));
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    fn create_body(&self, dims: usize) -> serde_json::Value {
        serde_json::json!({
            "vectors": { "size": dims, "distance": "Cosine" },
            "optimizers_config": { "memmap_threshold": self.memmap_threshold },
            "hnsw_config": {
                "on_disk": self.hnsw_on_disk,
                "m": self.hnsw_m,
                "ef_construct": self.hnsw_ef_construct,
            },
            "quantization_config": { "binary": { "always_ram": true } },
        })
    }

    /// Drop `name` if present and create it empty.
    pub async fn recreate_collection(&self, name: &str, dims: usize) -> Result<()> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("/collections/{}", name))
            .send()
            .await
            .context("Qdrant delete collection request failed")?;
        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            bail!("Qdrant error {} deleting collection '{}': {}", status, name, body);
        }

        self.ensure_collection(name, dims).await
    }

    /// Insert or replace points in the configured collection.
    pub async fn upsert_points(&self, points: &[Point]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("/collections/{}/points?wait=true", self.collection),
            )
            .json(&serde_json::json!({ "points": points }))
            .send()
            .await
            .context("Qdrant upsert request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Qdrant error {} upserting points: {}", status, body);
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for QdrantClient {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<Fragment>, IndexError> {
        let body = serde_json::json!({
            "vector": vector,
            "limit": limit,
            "with_payload": { "include": [TEXT_FIELD] },
        });

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/search", self.collection),
            )
            .json(&body)
            .send()
            .await
            .context("Qdrant search request failed")?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(IndexError::CollectionNotFound(self.collection.clone()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Qdrant error {} searching: {}", status, body).into());
        }

        let parsed: ApiResponse<Vec<ScoredPoint>> = response
            .json()
            .await
            .context("Invalid Qdrant search response")?;

        parsed
            .result
            .into_iter()
            .map(ScoredPoint::into_fragment)
            .collect::<Result<Vec<_>>>()
            .map_err(IndexError::from)
    }

    async fn scroll_by_filter(&self, filter: &TermFilter, limit: usize) -> Result<Vec<Fragment>> {
        let must: Vec<serde_json::Value> = filter
            .must
            .iter()
            .map(|term| serde_json::json!({ "key": filter.field, "match": { "text": term } }))
            .collect();
        let body = serde_json::json!({
            "filter": { "must": must },
            "limit": limit,
            "with_payload": { "include": [TEXT_FIELD] },
            "with_vector": false,
        });

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/scroll", self.collection),
            )
            .json(&body)
            .send()
            .await
            .context("Qdrant scroll request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Qdrant error {} scrolling: {}", status, body);
        }

        let parsed: ApiResponse<ScrollResult> = response
            .json()
            .await
            .context("Invalid Qdrant scroll response")?;

        parsed
            .result
            .points
            .into_iter()
            .map(|p| p.into_fragment().map(|f| Fragment { score: None, ..f }))
            .collect()
    }

    async fn ensure_collection(&self, name: &str, dims: usize) -> Result<()> {
        let response = self
            .request(reqwest::Method::PUT, &format!("/collections/{}", name))
            .json(&self.create_body(dims))
            .send()
            .await
            .context("Qdrant create collection request failed")?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(collection = name, dims, "created collection");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if body.contains("already exists") {
            return Ok(());
        }
        bail!("Qdrant error {} creating collection '{}': {}", status, name, body)
    }
}
