//! `kwtag keywords import`: load a keyword corpus from a text file.
//!
//! One keyword per line, optionally followed by `,<search volume>`. Blank
//! lines and lines starting with `#` are skipped. A trailing field that is
//! not a number is treated as part of the keyword.

use anyhow::{Context, Result};
use std::path::Path;

use keyword_tagger_core::models::KeywordRecord;

use crate::config::Config;
use crate::service::DictionaryService;

/// Parse corpus lines into records for `client`.
pub fn parse_corpus(client: &str, text: &str) -> Vec<KeywordRecord> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let (keyword, volume) = match line.rsplit_once(',') {
                Some((kw, vol)) => match vol.trim().parse::<i64>() {
                    Ok(v) => (kw.trim(), v),
                    Err(_) => (line, 0),
                },
                None => (line, 0),
            };
            KeywordRecord {
                keyword: keyword.to_string(),
                client_code: client.to_string(),
                search_volume: volume,
            }
        })
        .filter(|k| !k.keyword.is_empty())
        .collect()
}

pub async fn run_import(config: &Config, client: &str, file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read keyword file: {}", file.display()))?;
    let records = parse_corpus(client, &text);

    let service = DictionaryService::open(config).await?;
    let written = service.import_keywords(client, &records).await?;
    println!("Imported {} keywords for '{}'.", written, client);
    service.close().await;
    Ok(())
}
