//! SQLite-backed [`RelationalStore`].
//!
//! Fragments live in the `fragments` table created by
//! [`crate::migrate::run_migrations`]; embeddings are stored as
//! little-endian `f32` BLOBs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use similarity_core::backend::RelationalStore;
use similarity_core::prompt::count_tokens;
use similarity_core::Fragment;

/// One stored row, as loaded and as synced to the remote indexes.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentRecord {
    pub id: i64,
    pub scope: String,
    pub combined: String,
    pub raw: String,
    pub embedding: Vec<f32>,
    pub n_tokens: i64,
    pub created_at: i64,
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert one fragment and return its row id.
    pub async fn insert_fragment(
        &self,
        scope: &str,
        combined: &str,
        raw: &str,
        embedding: &[f32],
    ) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO fragments (scope, combined, raw, embedding, n_tokens, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(scope)
        .bind(combined)
        .bind(raw)
        .bind(vec_to_blob(embedding))
        .bind(count_tokens(combined) as i64)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert fragment into scope '{}'", scope))?;

        Ok(result.last_insert_rowid())
    }

    pub async fn count_by_scope(&self, scope: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fragments WHERE scope = ?")
            .bind(scope)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Every row of `scope` in insertion order.
    pub async fn list_records(&self, scope: &str) -> Result<Vec<FragmentRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, scope, combined, raw, embedding, n_tokens, created_at
            FROM fragments
            WHERE scope = ?
            ORDER BY id ASC
            "#,
        )
        .bind(scope)
        .fetch_all(&self.pool)
        .await?;

        let records = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                FragmentRecord {
                    id: row.get("id"),
                    scope: row.get("scope"),
                    combined: row.get("combined"),
                    raw: row.get("raw"),
                    embedding: blob_to_vec(&blob),
                    n_tokens: row.get("n_tokens"),
                    created_at: row.get("created_at"),
                }
            })
            .collect();

        Ok(records)
    }
}

#[async_trait]
impl RelationalStore for SqliteStore {
    async fn list_fragments(&self, scope: &str) -> Result<Vec<Fragment>> {
        let records = self.list_records(scope).await?;
        Ok(records
            .into_iter()
            .map(|r| Fragment::new(r.id, r.combined).with_vector(r.embedding))
            .collect())
    }
}

pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::{db, migrate};
    use similarity_core::FragmentId;

    async fn open(dir: &tempfile::TempDir) -> SqliteStore {
        let src = format!(
            "[db]\npath = \"{}\"\n",
            dir.path().join("sim.sqlite").display()
        );
        let config: Config = toml::from_str(&src).unwrap();
        migrate::run_migrations(&config).await.unwrap();
        SqliteStore::new(db::connect(&config).await.unwrap())
    }

    #[test]
    fn test_blob_encoding() {
        let v = vec![0.25f32, -1.5, 3.0];
        assert_eq!(blob_to_vec(&vec_to_blob(&v)), v);
        assert!(blob_to_vec(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_insert_count_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir).await;

        let first = store
            .insert_fragment("lelang", "merk: Toyota; tahun: 2019", "Toyota 2019", &[1.0, 0.0])
            .await
            .unwrap();
        store
            .insert_fragment("lelang", "merk: Honda", "Honda", &[0.0, 1.0])
            .await
            .unwrap();
        store
            .insert_fragment("other", "merk: Suzuki", "Suzuki", &[0.5, 0.5])
            .await
            .unwrap();

        assert_eq!(store.count_by_scope("lelang").await.unwrap(), 2);
        assert_eq!(store.count_by_scope("missing").await.unwrap(), 0);

        let records = store.list_records("lelang").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, first);
        assert_eq!(records[0].n_tokens, 4);
        assert_eq!(records[0].embedding, vec![1.0, 0.0]);

        let fragments = store.list_fragments("lelang").await.unwrap();
        assert_eq!(fragments[0].id, FragmentId::Row(first));
        assert_eq!(fragments[1].text, "merk: Honda");
        assert_eq!(fragments[1].vector.as_deref(), Some(&[0.0f32, 1.0][..]));
        assert!(fragments.iter().all(|f| f.score.is_none()));
    }
}
