//! Storage abstraction for Keyword Tagger.
//!
//! The [`Store`] trait defines every storage operation the dictionary
//! service and tagging runs need, so the service can run against SQLite or
//! the in-memory store used in tests.
//!
//! Profiles are returned with their dictionary as raw JSON: the service,
//! not the store, runs the migrator on load.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{ClientAIProfile, KeywordRecord, TagAssignment, TagRun};

/// A stored profile row before migration.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRecord {
    pub client_code: String,
    /// Stored dictionary in whatever shape it was written; `None` when the
    /// column is empty.
    pub dictionary: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get_profile`](Store::get_profile) | Load a profile row (raw dictionary) |
/// | [`save_profile`](Store::save_profile) | Insert or replace a profile and its dictionary |
/// | [`list_profiles`](Store::list_profiles) | Client codes with a profile |
/// | [`get_keywords`](Store::get_keywords) | Read a client's keyword corpus |
/// | [`upsert_keywords`](Store::upsert_keywords) | Import keywords into the corpus |
/// | [`save_tags`](Store::save_tags) | Replace all tags for a client |
/// | [`read_tags`](Store::read_tags) | Read a client's tags |
/// | [`record_tag_run`](Store::record_tag_run) | Append a tagging run audit row |
/// | [`last_tag_run`](Store::last_tag_run) | Most recent tagging run |
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_profile(&self, client_code: &str) -> Result<Option<ProfileRecord>>;

    /// Write the whole profile. A failed save must leave the previously
    /// stored dictionary intact.
    async fn save_profile(&self, profile: &ClientAIProfile) -> Result<()>;

    async fn list_profiles(&self) -> Result<Vec<String>>;

    async fn get_keywords(&self, client_code: &str) -> Result<Vec<KeywordRecord>>;

    /// Insert new keywords and update the search volume of existing ones.
    /// Returns the number of rows written.
    async fn upsert_keywords(&self, client_code: &str, keywords: &[KeywordRecord])
        -> Result<usize>;

    /// Replace every tag for `client_code` with `tags`, atomically.
    async fn save_tags(&self, client_code: &str, tags: &[TagAssignment]) -> Result<()>;

    /// Tags sorted by keyword.
    async fn read_tags(&self, client_code: &str) -> Result<Vec<TagAssignment>>;

    async fn record_tag_run(&self, run: &TagRun) -> Result<()>;

    async fn last_tag_run(&self, client_code: &str) -> Result<Option<TagRun>>;
}
