//! Integration tests for the dictionary service over a real SQLite store.
//!
//! Each test gets its own database in a temp directory.

use std::sync::Arc;

use keyword_tagger::config::Config;
use keyword_tagger::service::{DictionaryService, RetagOutcome};
use keyword_tagger::sqlite_store::SqliteStore;
use keyword_tagger_core::error::DictionaryError;
use keyword_tagger_core::models::{Intent, KeywordRecord, Scope, TagBucket};
use keyword_tagger_core::mutate::{HarvestEntry, SuggestionSet, TokenOptions};
use keyword_tagger_core::store::Store;
use keyword_tagger_core::tagger::TagOptions;
use serde_json::json;
use tempfile::TempDir;

// ─── Helpers ────────────────────────────────────────────────────────

fn test_config(tmp: &TempDir) -> Config {
    let db_path = tmp.path().join("data").join("kwtag.sqlite");
    let config_content = format!(
        r#"
[db]
path = "{}"

[tagging]
batch_size = 2
"#,
        db_path.display()
    );
    toml::from_str(&config_content).unwrap()
}

async fn open_service(tmp: &TempDir) -> DictionaryService<SqliteStore> {
    DictionaryService::open(&test_config(tmp)).await.unwrap()
}

fn corpus(client: &str, keywords: &[&str]) -> Vec<KeywordRecord> {
    keywords
        .iter()
        .map(|k| KeywordRecord {
            keyword: k.to_string(),
            client_code: client.to_string(),
            search_volume: 10,
        })
        .collect()
}

async fn store_raw_dictionary(service: &DictionaryService<SqliteStore>, client: &str, raw: &str) {
    sqlx::query(
        "INSERT INTO profiles (client_code, dictionary_json, created_at, updated_at) \
         VALUES (?, ?, 0, 0)",
    )
    .bind(client)
    .bind(raw)
    .execute(service.store().pool())
    .await
    .unwrap();
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_end_to_end_negative_beats_brand() {
    let tmp = TempDir::new().unwrap();
    let service = open_service(&tmp).await;
    service.create_profile("acme").await.unwrap();

    service
        .add_tokens("acme", "negativeTokens", &["pvt", "ltd"], TokenOptions::default())
        .await
        .unwrap();
    service
        .add_tokens("acme", "brandTokens", &["acme pumps"], TokenOptions::default())
        .await
        .unwrap();
    service
        .import_keywords(
            "acme",
            &corpus("acme", &["acme pumps price", "acme pumps pvt ltd"]),
        )
        .await
        .unwrap();

    let outcome = service
        .retag("acme", TagOptions::default(), |_, _| {})
        .await
        .unwrap();
    assert!(matches!(outcome, RetagOutcome::Completed(ref run) if run.keyword_count == 2));

    let tags = service.read_tags("acme").await.unwrap();
    assert_eq!(tags.len(), 2);
    assert_eq!(tags[0].keyword, "acme pumps price");
    assert_eq!(tags[0].bucket, TagBucket::Brand);
    assert_eq!(tags[1].keyword, "acme pumps pvt ltd");
    assert_eq!(tags[1].bucket, TagBucket::Excluded);
}

#[tokio::test]
async fn test_legacy_dictionary_loads_and_upgrades() {
    let tmp = TempDir::new().unwrap();
    let service = open_service(&tmp).await;
    store_raw_dictionary(
        &service,
        "legacy",
        r#"{"brandTokens":["X","y"],"intentTokens":{"TRANSACTIONAL":["buy"]}}"#,
    )
    .await;

    let dict = service.dictionary("legacy").await.unwrap();
    let tokens: Vec<&str> = dict.brand_tokens.tokens().collect();
    assert_eq!(tokens, vec!["x", "y"]);
    assert!(dict
        .brand_tokens
        .iter()
        .all(|e| e.scope == Scope::Client && !e.is_hard_negative));

    let report = service.upgrade("legacy").await.unwrap();
    assert!(report.upgraded);

    let stored = service.store().get_profile("legacy").await.unwrap().unwrap();
    let raw = stored.dictionary.unwrap();
    assert_eq!(raw["brandTokens"][0]["token"], "x");
    assert_eq!(raw["version"], 2);
    assert!(raw["intentTokens"].get("DIRECTORY").is_some());
}

#[tokio::test]
async fn test_null_dictionary_is_missing() {
    let tmp = TempDir::new().unwrap();
    let service = open_service(&tmp).await;
    sqlx::query(
        "INSERT INTO profiles (client_code, dictionary_json, created_at, updated_at) \
         VALUES ('empty', NULL, 0, 0)",
    )
    .execute(service.store().pool())
    .await
    .unwrap();

    assert!(matches!(
        service.dictionary("empty").await,
        Err(DictionaryError::DictionaryMissing(_))
    ));
    assert!(matches!(
        service.dictionary("nobody").await,
        Err(DictionaryError::ProfileNotFound(_))
    ));
}

#[tokio::test]
async fn test_concurrent_mutations_do_not_lose_updates() {
    let tmp = TempDir::new().unwrap();
    let service = Arc::new(open_service(&tmp).await);
    service.create_profile("c1").await.unwrap();
    service.create_profile("c2").await.unwrap();

    let mut handles = Vec::new();
    for i in 0..12 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            let client = if i % 2 == 0 { "c1" } else { "c2" };
            match i % 3 {
                0 => {
                    service
                        .add_tokens(client, "coreTokens", &[format!("core{}", i)], TokenOptions::default())
                        .await
                }
                1 => {
                    let suggestions = SuggestionSet::from_value(
                        json!({ "adjacentTokens": [format!("adj{}", i)] }),
                    )
                    .unwrap();
                    service.apply_suggestions(client, &suggestions).await
                }
                _ => {
                    let entry = HarvestEntry {
                        token: format!("line{}", i),
                        bucket: "productLineTokens.pumps".to_string(),
                        scope: Some(Scope::Client),
                        is_hard_negative: None,
                        product_line: Some("pumps".to_string()),
                    };
                    service.harvest(client, &[entry]).await
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let c1 = service.dictionary("c1").await.unwrap();
    let c2 = service.dictionary("c2").await.unwrap();
    // 12 mutations, each adding exactly one distinct token
    assert_eq!(c1.token_count() + c2.token_count(), 12);
    assert_eq!(c1.token_count(), 6);
}

#[tokio::test]
async fn test_apply_with_unknown_intent_saves_nothing() {
    let tmp = TempDir::new().unwrap();
    let service = open_service(&tmp).await;
    service.create_profile("c1").await.unwrap();

    let suggestions = SuggestionSet::from_value(json!({
        "brandTokens": ["acme"],
        "intentTokens": { "NAVIGATIONAL": ["login"] }
    }))
    .unwrap();
    let err = service.apply_suggestions("c1", &suggestions).await.unwrap_err();
    assert!(matches!(err, DictionaryError::UnknownIntent(_)));

    let dict = service.dictionary("c1").await.unwrap();
    assert!(dict.brand_tokens.is_empty());
}

#[tokio::test]
async fn test_apply_duplicate_suggestions_counted_once() {
    let tmp = TempDir::new().unwrap();
    let service = open_service(&tmp).await;
    service.create_profile("c1").await.unwrap();

    let suggestions =
        SuggestionSet::from_value(json!({ "brandTokens": ["acme", "acme"] })).unwrap();
    let report = service.apply_suggestions("c1", &suggestions).await.unwrap();
    assert_eq!(report.added, 1);
    assert_eq!(report.duplicates, 1);
}

#[tokio::test]
async fn test_retag_replaces_tags_and_tracks_staleness() {
    let tmp = TempDir::new().unwrap();
    let service = open_service(&tmp).await;
    service.create_profile("c1").await.unwrap();
    service
        .add_tokens("c1", "intentTokens.DIRECTORY", &["near me"], TokenOptions::default())
        .await
        .unwrap();
    service
        .add_tokens("c1", "coreTokens", &["pump repair"], TokenOptions::default())
        .await
        .unwrap();
    service
        .import_keywords(
            "c1",
            &corpus("c1", &["pump repair near me", "valve", "pump"]),
        )
        .await
        .unwrap();

    let mut batches = Vec::new();
    let (tx, rx) = std::sync::mpsc::channel();
    service
        .retag("c1", TagOptions { batch_size: 2, ..TagOptions::default() }, move |n, total| {
            let _ = tx.send((n, total));
        })
        .await
        .unwrap();
    batches.extend(rx.try_iter());
    assert_eq!(batches, vec![(2, 3), (3, 3)]);

    let tags = service.read_tags("c1").await.unwrap();
    let repair = tags.iter().find(|t| t.keyword == "pump repair near me").unwrap();
    assert_eq!(repair.bucket, TagBucket::Core);
    assert_eq!(repair.intent, Some(Intent::Directory));

    let status = service.tag_status("c1").await.unwrap();
    assert!(!status.stale);
    assert_eq!(status.tag_count, 3);

    service
        .add_tokens("c1", "negativeTokens", &["valve"], TokenOptions::default())
        .await
        .unwrap();
    assert!(service.tag_status("c1").await.unwrap().stale);

    // a second run overwrites wholesale
    service
        .retag("c1", TagOptions::default(), |_, _| {})
        .await
        .unwrap();
    let tags = service.read_tags("c1").await.unwrap();
    assert_eq!(tags.len(), 3);
    let valve = tags.iter().find(|t| t.keyword == "valve").unwrap();
    assert_eq!(valve.bucket, TagBucket::Excluded);
    assert!(!service.tag_status("c1").await.unwrap().stale);
}

#[tokio::test]
async fn test_harvest_product_line_last_write_wins() {
    let tmp = TempDir::new().unwrap();
    let service = open_service(&tmp).await;
    service.create_profile("c1").await.unwrap();

    let entry = |line: &str| HarvestEntry {
        token: "twister".to_string(),
        bucket: format!("productLineTokens.{}", line),
        scope: Some(Scope::Client),
        is_hard_negative: None,
        product_line: Some(line.to_string()),
    };
    service.harvest("c1", &[entry("tfo")]).await.unwrap();
    service.harvest("c1", &[entry("winding")]).await.unwrap();

    let dict = service.dictionary("c1").await.unwrap();
    assert_eq!(dict.product_line_map["twister"], vec!["winding".to_string()]);

    let tag = service.classify("c1", "twister machine").await.unwrap();
    assert_eq!(tag.bucket, TagBucket::Product);
    assert_eq!(tag.product_line.as_deref(), Some("winding"));
}
