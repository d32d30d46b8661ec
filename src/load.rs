//! Ingestion into SQLite and migration to the remote indexes.
//!
//! `load` reads a JSON array of `{ "combined", "embedding" }` records into
//! a scope. Rows already present in the scope are counted and that many
//! leading records are skipped, so an interrupted load can be rerun.
//!
//! `sync` copies a scope from SQLite into Qdrant or Elasticsearch. The
//! target collection/index is dropped and recreated first.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::elastic::{ElasticClient, ElasticDocument};
use crate::qdrant::{Point, PointPayload, QdrantClient};
use crate::sqlite_store::{FragmentRecord, SqliteStore};

/// Points sent per Qdrant upsert request.
const UPSERT_BATCH: usize = 64;

#[derive(Debug, Deserialize)]
pub struct SourceRecord {
    pub combined: String,
    pub embedding: Vec<f32>,
}

/// Label-free text of a combined record, used for exact-term filters.
///
/// `"merk: Toyota; plat_no: B1207KDZ"` becomes `"Toyota B1207KDZ"`. A
/// segment only counts as labelled when the text before its first `:`
/// is a single word.
pub fn raw_text(combined: &str) -> String {
    combined
        .split(';')
        .map(|segment| {
            let segment = segment.trim();
            match segment.split_once(':') {
                Some((label, value))
                    if !label.trim().is_empty() && !label.trim().contains(char::is_whitespace) =>
                {
                    value.trim()
                }
                _ => segment,
            }
        })
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stable point id for a combined text: a name-based (v5) UUID in the
/// OID namespace.
pub fn point_id(combined: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, combined.as_bytes()).to_string()
}

pub fn read_records(path: &Path) -> Result<Vec<SourceRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read data file: {}", path.display()))?;
    let records: Vec<SourceRecord> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse data file: {}", path.display()))?;
    Ok(records)
}

pub async fn run_load(config: &Config, path: &Path, scope: &str) -> Result<()> {
    let records = read_records(path)?;
    let store = SqliteStore::new(db::connect(config).await?);

    let already = store.count_by_scope(scope).await?.max(0) as usize;
    let mut inserted = 0usize;
    for record in records.iter().skip(already) {
        if record.embedding.is_empty() {
            bail!(
                "record {} of {} has an empty embedding",
                already + inserted,
                path.display()
            );
        }
        store
            .insert_fragment(
                scope,
                &record.combined,
                &raw_text(&record.combined),
                &record.embedding,
            )
            .await?;
        inserted += 1;
    }
    tracing::info!(scope, inserted, skipped = already.min(records.len()), "load finished");

    println!("load {}", path.display());
    println!("  scope: {}", scope);
    println!("  records: {}", records.len());
    println!("  skipped (already loaded): {}", already.min(records.len()));
    println!("  inserted: {}", inserted);
    println!("ok");
    Ok(())
}

fn dims_of(records: &[FragmentRecord], config: &Config) -> Result<usize> {
    match records.first() {
        Some(r) => Ok(r.embedding.len()),
        None => config
            .embedding
            .dims
            .context("scope is empty and embedding.dims is not set"),
    }
}

pub async fn run_sync_qdrant(config: &Config, scope: &str) -> Result<()> {
    let qdrant = config
        .qdrant
        .as_ref()
        .context("sync qdrant requires a [qdrant] section")?;
    let client = QdrantClient::new(qdrant)?;
    let store = SqliteStore::new(db::connect(config).await?);

    let records = store.list_records(scope).await?;
    let dims = dims_of(&records, config)?;
    client.recreate_collection(&qdrant.collection, dims).await?;

    let points: Vec<Point> = records
        .into_iter()
        .map(|r| Point {
            id: point_id(&r.combined),
            vector: r.embedding,
            payload: PointPayload {
                combined: r.combined,
                raw: r.raw,
            },
        })
        .collect();

    for batch in points.chunks(UPSERT_BATCH) {
        client.upsert_points(batch).await?;
    }
    tracing::info!(
        scope,
        collection = %qdrant.collection,
        points = points.len(),
        "qdrant sync finished"
    );

    println!("sync qdrant");
    println!("  scope: {}", scope);
    println!("  collection: {}", qdrant.collection);
    println!("  points: {}", points.len());
    println!("ok");
    Ok(())
}

pub async fn run_sync_elasticsearch(config: &Config, scope: &str) -> Result<()> {
    let elastic = config
        .elasticsearch
        .as_ref()
        .context("sync elasticsearch requires an [elasticsearch] section")?;
    let client = ElasticClient::new(elastic)?;
    let store = SqliteStore::new(db::connect(config).await?);

    let records = store.list_records(scope).await?;
    let dims = dims_of(&records, config)?;
    client.recreate_index(dims).await?;

    let total = records.len();
    for r in records {
        let id = point_id(&r.combined);
        let doc = ElasticDocument {
            combined: r.combined,
            raw: r.raw,
            embedding: r.embedding,
        };
        client.index_document(&id, &doc).await?;
    }
    tracing::info!(
        scope,
        index = client.index(),
        documents = total,
        "elasticsearch sync finished"
    );

    println!("sync elasticsearch");
    println!("  scope: {}", scope);
    println!("  index: {}", client.index());
    println!("  documents: {}", total);
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_text_strips_labels_and_separators() {
        assert_eq!(
            raw_text("merk: Toyota; tahun: 2019; plat_no: B1207KDZ"),
            "Toyota 2019 B1207KDZ"
        );
    }

    #[test]
    fn test_raw_text_keeps_unlabelled_segments() {
        assert_eq!(raw_text("Toyota Avanza; warna: HITAM"), "Toyota Avanza HITAM");
        assert_eq!(raw_text("lokasi gudang: Jakarta"), "lokasi gudang: Jakarta");
        assert_eq!(raw_text(""), "");
    }

    #[test]
    fn test_point_id_is_stable_uuid() {
        let a = point_id("merk: Toyota");
        assert_eq!(a, point_id("merk: Toyota"));
        assert_ne!(a, point_id("merk: Honda"));
        let parsed = Uuid::parse_str(&a).unwrap();
        assert_eq!(parsed.get_version_num(), 5);
    }

    #[test]
    fn test_read_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(
            &path,
            r#"[{"combined": "merk: Toyota", "embedding": [0.1, 0.2]}]"#,
        )
        .unwrap();
        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].embedding, vec![0.1, 0.2]);
    }
}
