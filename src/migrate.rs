use anyhow::Result;

use crate::config::Config;
use crate::db;

/// Create the schema. Safe to run any number of times.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // `embedding` holds little-endian f32s, see sqlite_store::vec_to_blob.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fragments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            scope TEXT NOT NULL,
            combined TEXT NOT NULL,
            raw TEXT NOT NULL,
            embedding BLOB NOT NULL,
            n_tokens INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_fragments_scope ON fragments(scope)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
