//! Export a client's tags as JSON.
//!
//! The export carries the tags together with the run that produced them,
//! so downstream reports can tell which dictionary version they reflect.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use keyword_tagger_core::models::{TagAssignment, TagRun};
use keyword_tagger_core::store::Store;

use crate::config::Config;
use crate::service::DictionaryService;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportData {
    client_code: String,
    last_run: Option<TagRun>,
    tags: Vec<TagAssignment>,
}

/// Export tags as JSON.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub async fn run_export(config: &Config, client: &str, output: Option<&Path>) -> Result<()> {
    let service = DictionaryService::open(config).await?;
    let tags = service.read_tags(client).await?;
    let last_run = service.store().last_tag_run(client).await?;
    service.close().await;

    let tag_count = tags.len();
    let data = ExportData {
        client_code: client.to_string(),
        last_run,
        tags,
    };
    let json = serde_json::to_string_pretty(&data)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)?;
            eprintln!("Exported {} tags to {}", tag_count, path.display());
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(())
}
