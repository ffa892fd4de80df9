//! Database schema.
//!
//! All statements are `CREATE ... IF NOT EXISTS`, so running migrations
//! against an existing database is a no-op.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // One row per client; the dictionary is stored as JSON
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            client_code TEXT PRIMARY KEY,
            dictionary_json TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS keywords (
            client_code TEXT NOT NULL,
            keyword TEXT NOT NULL,
            search_volume INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (client_code, keyword)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            client_code TEXT NOT NULL,
            keyword TEXT NOT NULL,
            bucket TEXT NOT NULL,
            product_line TEXT,
            intent TEXT,
            PRIMARY KEY (client_code, keyword)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tag_runs (
            id TEXT PRIMARY KEY,
            client_code TEXT NOT NULL,
            started_at INTEGER NOT NULL,
            finished_at INTEGER NOT NULL,
            keyword_count INTEGER NOT NULL,
            dictionary_hash TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tags_bucket ON tags(client_code, bucket)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_tag_runs_client ON tag_runs(client_code, finished_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
