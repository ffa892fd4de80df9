//! `kwtag tag`, `kwtag tags ...`, and `kwtag classify`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use keyword_tagger_core::models::{TagAssignment, TagBucket};

use crate::config::Config;
use crate::progress::{ProgressMode, TagProgressEvent};
use crate::service::{DictionaryService, RetagOutcome};

/// Re-tag a client's corpus. Ctrl-C cancels between batches and leaves the
/// previous tags in place.
pub async fn run_tag(config: &Config, client: &str, progress: ProgressMode) -> Result<()> {
    let service = DictionaryService::open(config).await?;
    let reporter = progress.reporter();
    reporter.report(TagProgressEvent::Loading {
        client: client.to_string(),
    });

    let cancel = Arc::new(AtomicBool::new(false));
    let watcher = {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.store(true, Ordering::Relaxed);
            }
        })
    };

    let mut opts = config.tagging.tag_options();
    opts.cancel = Some(cancel);
    let client_name = client.to_string();
    let outcome = service
        .retag(client, opts, move |n, total| {
            reporter.report(TagProgressEvent::Classifying {
                client: client_name.clone(),
                n: n as u64,
                total: total as u64,
            })
        })
        .await;
    watcher.abort();

    match outcome? {
        RetagOutcome::Completed(run) => {
            println!(
                "Tagged {} keywords for '{}' (run {}).",
                run.keyword_count, client, run.id
            );
        }
        RetagOutcome::Cancelled { processed, total } => {
            println!(
                "Cancelled after {} / {} keywords; existing tags unchanged.",
                processed, total
            );
        }
    }

    service.close().await;
    Ok(())
}

pub async fn run_list(config: &Config, client: &str, bucket: Option<TagBucket>) -> Result<()> {
    let service = DictionaryService::open(config).await?;
    let tags: Vec<TagAssignment> = service
        .read_tags(client)
        .await?
        .into_iter()
        .filter(|t| bucket.map_or(true, |b| t.bucket == b))
        .collect();

    if tags.is_empty() {
        println!("No tags.");
    } else {
        println!(
            "{:<40} {:<13} {:<20} {}",
            "KEYWORD", "BUCKET", "PRODUCT LINE", "INTENT"
        );
        for t in &tags {
            println!(
                "{:<40} {:<13} {:<20} {}",
                t.keyword,
                t.bucket,
                t.product_line.as_deref().unwrap_or("-"),
                t.intent.map(|i| i.as_str()).unwrap_or("-")
            );
        }
    }

    service.close().await;
    Ok(())
}

pub async fn run_status(config: &Config, client: &str) -> Result<()> {
    let service = DictionaryService::open(config).await?;
    let status = service.tag_status(client).await?;

    println!("Client:      {}", status.client_code);
    println!("Tags:        {}", status.tag_count);
    match &status.last_run {
        Some(run) => {
            println!("Last run:    {} ({})", run.id, format_age(run.finished_at));
            println!("Keywords:    {}", run.keyword_count);
        }
        None => println!("Last run:    never"),
    }
    println!(
        "Status:      {}",
        if status.stale {
            "stale (dictionary changed since last run)"
        } else {
            "up to date"
        }
    );

    service.close().await;
    Ok(())
}

pub async fn run_classify(config: &Config, client: &str, keyword: &str, explain: bool) -> Result<()> {
    let service = DictionaryService::open(config).await?;
    if explain {
        let explanation = service.explain(client, keyword).await?;
        println!("{}", serde_json::to_string_pretty(&explanation)?);
    } else {
        let assignment = service.classify(client, keyword).await?;
        println!("{}", serde_json::to_string(&assignment)?);
    }
    service.close().await;
    Ok(())
}

/// Format a timestamp relative to now (e.g. "3 hours ago").
fn format_age(ts: DateTime<Utc>) -> String {
    let delta = (Utc::now() - ts).num_seconds();

    if delta < 0 {
        return ts.format("%Y-%m-%d %H:%M").to_string();
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        ts.format("%Y-%m-%d %H:%M").to_string()
    }
}
