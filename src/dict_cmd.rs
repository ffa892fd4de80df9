//! `kwtag dict` commands: inspect and mutate a client's dictionary.
//!
//! Mutations go through [`DictionaryService`], so each command loads,
//! migrates, mutates, and saves under the client's lock. Input files are
//! JSON: a suggestion set shaped like the dictionary for `apply`, and an
//! array of entries for `harvest`.

use anyhow::{Context, Result};
use std::path::Path;

use keyword_tagger_core::models::Scope;
use keyword_tagger_core::mutate::{HarvestEntry, MergeReport, SuggestionSet, TokenOptions};

use crate::config::Config;
use crate::service::DictionaryService;

pub async fn run_show(config: &Config, client: &str) -> Result<()> {
    let service = DictionaryService::open(config).await?;
    let dict = service.dictionary(client).await?;
    println!("{}", serde_json::to_string_pretty(&dict)?);
    service.close().await;
    Ok(())
}

pub async fn run_add(
    config: &Config,
    client: &str,
    path: &str,
    tokens: &[String],
    scope: Scope,
    hard_negative: bool,
) -> Result<()> {
    let service = DictionaryService::open(config).await?;
    let opts = TokenOptions {
        scope,
        is_hard_negative: hard_negative,
        ..TokenOptions::default()
    };
    let report = service.add_tokens(client, path, tokens, opts).await?;
    print_report(&format!("add {}", path), &report);
    service.close().await;
    Ok(())
}

pub async fn run_apply(config: &Config, client: &str, file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read suggestion file: {}", file.display()))?;
    let suggestions = SuggestionSet::from_json(&text)?;

    let service = DictionaryService::open(config).await?;
    let report = service.apply_suggestions(client, &suggestions).await?;
    print_report("apply", &report);
    service.close().await;
    Ok(())
}

pub async fn run_harvest(config: &Config, client: &str, file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read harvest file: {}", file.display()))?;
    let entries: Vec<HarvestEntry> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse harvest file: {}", file.display()))?;

    let service = DictionaryService::open(config).await?;
    let report = service.harvest(client, &entries).await?;
    print_report("harvest", &report);
    service.close().await;
    Ok(())
}

pub async fn run_upgrade(config: &Config, client: &str) -> Result<()> {
    let service = DictionaryService::open(config).await?;
    let report = service.upgrade(client).await?;
    if report.upgraded {
        println!(
            "Upgraded dictionary for '{}' ({} tokens).",
            client, report.token_count
        );
    } else {
        println!("Dictionary for '{}' is already current.", client);
    }
    service.close().await;
    Ok(())
}

fn print_report(action: &str, report: &MergeReport) {
    println!(
        "{}: {} added, {} duplicate, {} updated, {} rejected, {} mapping(s) changed",
        action,
        report.added,
        report.duplicates,
        report.updated,
        report.rejected,
        report.mappings_changed
    );
    if !report.changed() {
        println!("No changes saved.");
    }
}
