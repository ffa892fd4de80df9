//! SQLite-backed [`Store`] implementation.
//!
//! Maps each [`Store`] operation onto the `profiles`, `keywords`, `tags`,
//! and `tag_runs` tables created by [`crate::migrate`]. Timestamps are
//! stored as Unix seconds.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use keyword_tagger_core::models::{
    ClientAIProfile, Intent, KeywordRecord, TagAssignment, TagBucket, TagRun,
};
use keyword_tagger_core::store::{ProfileRecord, Store};

use crate::config::Config;
use crate::{db, migrate};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and make sure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn from_ts(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

fn tag_from_row(row: &SqliteRow) -> Result<TagAssignment> {
    let keyword: String = row.get("keyword");
    let bucket: String = row.get("bucket");
    let bucket = bucket
        .parse::<TagBucket>()
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Corrupt tag row for keyword '{}'", keyword))?;
    let intent = match row.get::<Option<String>, _>("intent") {
        Some(raw) => match raw.parse::<Intent>() {
            Ok(intent) => Some(intent),
            Err(e) => {
                tracing::warn!(keyword = %keyword, error = %e, "ignoring stored intent");
                None
            }
        },
        None => None,
    };
    Ok(TagAssignment {
        keyword,
        bucket,
        product_line: row.get("product_line"),
        intent,
    })
}

fn run_from_row(row: &SqliteRow) -> TagRun {
    TagRun {
        id: row.get("id"),
        client_code: row.get("client_code"),
        started_at: from_ts(row.get("started_at")),
        finished_at: from_ts(row.get("finished_at")),
        keyword_count: row.get("keyword_count"),
        dictionary_hash: row.get("dictionary_hash"),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_profile(&self, client_code: &str) -> Result<Option<ProfileRecord>> {
        let row = sqlx::query(
            "SELECT client_code, dictionary_json, created_at, updated_at \
             FROM profiles WHERE client_code = ?",
        )
        .bind(client_code)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw: Option<String> = row.get("dictionary_json");
        let dictionary = match raw.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(text) => Some(serde_json::from_str(text).with_context(|| {
                format!("Stored dictionary for '{}' is not valid JSON", client_code)
            })?),
        };

        Ok(Some(ProfileRecord {
            client_code: row.get("client_code"),
            dictionary,
            created_at: from_ts(row.get("created_at")),
            updated_at: from_ts(row.get("updated_at")),
        }))
    }

    async fn save_profile(&self, profile: &ClientAIProfile) -> Result<()> {
        let dictionary_json = serde_json::to_string(&profile.dictionary)?;
        sqlx::query(
            r#"
            INSERT INTO profiles (client_code, dictionary_json, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(client_code) DO UPDATE SET
                dictionary_json = excluded.dictionary_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&profile.client_code)
        .bind(&dictionary_json)
        .bind(profile.created_at.timestamp())
        .bind(profile.updated_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<String>> {
        let codes: Vec<String> =
            sqlx::query_scalar("SELECT client_code FROM profiles ORDER BY client_code")
                .fetch_all(&self.pool)
                .await?;
        Ok(codes)
    }

    async fn get_keywords(&self, client_code: &str) -> Result<Vec<KeywordRecord>> {
        let rows = sqlx::query(
            "SELECT keyword, client_code, search_volume FROM keywords \
             WHERE client_code = ? ORDER BY keyword",
        )
        .bind(client_code)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| KeywordRecord {
                keyword: row.get("keyword"),
                client_code: row.get("client_code"),
                search_volume: row.get("search_volume"),
            })
            .collect())
    }

    async fn upsert_keywords(
        &self,
        client_code: &str,
        keywords: &[KeywordRecord],
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for k in keywords {
            sqlx::query(
                r#"
                INSERT INTO keywords (client_code, keyword, search_volume)
                VALUES (?, ?, ?)
                ON CONFLICT(client_code, keyword) DO UPDATE SET
                    search_volume = excluded.search_volume
                "#,
            )
            .bind(client_code)
            .bind(&k.keyword)
            .bind(k.search_volume)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(keywords.len())
    }

    async fn save_tags(&self, client_code: &str, tags: &[TagAssignment]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM tags WHERE client_code = ?")
            .bind(client_code)
            .execute(&mut *tx)
            .await?;

        for tag in tags {
            sqlx::query(
                "INSERT INTO tags (client_code, keyword, bucket, product_line, intent) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(client_code)
            .bind(&tag.keyword)
            .bind(tag.bucket.as_str())
            .bind(&tag.product_line)
            .bind(tag.intent.map(|i| i.as_str()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn read_tags(&self, client_code: &str) -> Result<Vec<TagAssignment>> {
        let rows = sqlx::query(
            "SELECT keyword, bucket, product_line, intent FROM tags \
             WHERE client_code = ? ORDER BY keyword",
        )
        .bind(client_code)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(tag_from_row).collect()
    }

    async fn record_tag_run(&self, run: &TagRun) -> Result<()> {
        sqlx::query(
            "INSERT INTO tag_runs (id, client_code, started_at, finished_at, keyword_count, dictionary_hash) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&run.id)
        .bind(&run.client_code)
        .bind(run.started_at.timestamp())
        .bind(run.finished_at.timestamp())
        .bind(run.keyword_count)
        .bind(&run.dictionary_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn last_tag_run(&self, client_code: &str) -> Result<Option<TagRun>> {
        let row = sqlx::query(
            "SELECT id, client_code, started_at, finished_at, keyword_count, dictionary_hash \
             FROM tag_runs WHERE client_code = ? \
             ORDER BY finished_at DESC, rowid DESC LIMIT 1",
        )
        .bind(client_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(run_from_row))
    }
}
