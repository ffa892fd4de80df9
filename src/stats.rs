//! Tag distribution overview.
//!
//! Summarizes a client's stored tags: keyword counts and total search
//! volume per bucket, intent coverage, and the size of each dictionary
//! bucket. Used by `kwtag stats` to sanity-check a tagging run.

use anyhow::Result;
use sqlx::Row;

use keyword_tagger_core::models::TagBucket;

use crate::config::Config;
use crate::service::DictionaryService;

/// Keyword count and summed search volume for one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketStats {
    pub bucket: TagBucket,
    pub keywords: i64,
    pub volume: i64,
}

/// Per-bucket totals in [`TagBucket::ALL`] order; empty buckets included.
pub async fn bucket_stats(pool: &sqlx::SqlitePool, client: &str) -> Result<Vec<BucketStats>> {
    let rows = sqlx::query(
        r#"
        SELECT t.bucket AS bucket,
               COUNT(*) AS keywords,
               COALESCE(SUM(k.search_volume), 0) AS volume
        FROM tags t
        LEFT JOIN keywords k
               ON k.client_code = t.client_code AND k.keyword = t.keyword
        WHERE t.client_code = ?
        GROUP BY t.bucket
        "#,
    )
    .bind(client)
    .fetch_all(pool)
    .await?;

    let mut stats: Vec<BucketStats> = TagBucket::ALL
        .into_iter()
        .map(|bucket| BucketStats {
            bucket,
            keywords: 0,
            volume: 0,
        })
        .collect();

    for row in &rows {
        let name: String = row.get("bucket");
        match name.parse::<TagBucket>() {
            Ok(bucket) => {
                if let Some(s) = stats.iter_mut().find(|s| s.bucket == bucket) {
                    s.keywords = row.get("keywords");
                    s.volume = row.get("volume");
                }
            }
            Err(e) => tracing::warn!(client, error = %e, "skipping unknown bucket in tags"),
        }
    }
    Ok(stats)
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config, client: &str) -> Result<()> {
    let service = DictionaryService::open(config).await?;
    let dict = service.dictionary(client).await?;
    let pool = service.store().pool();
    let stats = bucket_stats(pool, client).await?;

    let intent_rows = sqlx::query(
        "SELECT COALESCE(intent, '-') AS intent, COUNT(*) AS n FROM tags \
         WHERE client_code = ? GROUP BY intent ORDER BY n DESC",
    )
    .bind(client)
    .fetch_all(pool)
    .await?;
    service.close().await;

    let total: i64 = stats.iter().map(|s| s.keywords).sum();

    println!("Keyword Tagger — Stats for '{}'", client);
    println!("================================");
    println!();
    println!("  Dictionary:  {} tokens", dict.token_count());
    println!("  Tagged:      {} keywords", total);
    println!();
    println!("  By bucket:");
    println!("  {:<14} {:>10} {:>6} {:>14}", "BUCKET", "KEYWORDS", "%", "VOLUME");
    println!("  {}", "-".repeat(48));
    for s in &stats {
        let pct = if total > 0 { (s.keywords * 100) / total } else { 0 };
        println!(
            "  {:<14} {:>10} {:>5}% {:>14}",
            s.bucket, s.keywords, pct, s.volume
        );
    }

    if !intent_rows.is_empty() {
        println!();
        println!("  By intent:");
        for row in &intent_rows {
            let intent: String = row.get("intent");
            let n: i64 = row.get("n");
            println!("  {:<22} {:>10}", intent, n);
        }
    }

    println!();
    println!("  Dictionary buckets:");
    for (label, set) in dict.buckets().filter(|(_, set)| !set.is_empty()) {
        println!("  {:<40} {:>6}", label, set.len());
    }
    println!();

    Ok(())
}
