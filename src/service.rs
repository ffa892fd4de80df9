//! Dictionary service: per-client serialized mutations and tagging runs.
//!
//! Every mutation follows the same sequence while holding the client's
//! lock: load the stored profile, run the migrator, apply the mutator,
//! and save the whole profile if anything changed. A mutator error aborts
//! before the save, so the stored dictionary is never partially updated.
//!
//! Locks are keyed by client code. Mutations for different clients run
//! concurrently; two mutations for the same client never interleave.
//!
//! Tagging runs take a snapshot of the dictionary under the lock, release
//! it, and classify on the blocking thread pool. Tags and the run record
//! are written under the lock again once classification completes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;

use keyword_tagger_core::error::{DictionaryError, Result};
use keyword_tagger_core::migrate::{migrate, needs_migration};
use keyword_tagger_core::models::{
    ClientAIProfile, KeywordRecord, MatchingDictionary, TagAssignment, TagRun,
};
use keyword_tagger_core::mutate::{
    self, HarvestEntry, MergeReport, SuggestionSet, TokenOptions,
};
use keyword_tagger_core::store::Store;
use keyword_tagger_core::tagger::{tag_corpus, Explanation, TagOptions, TagRunOutcome, Tagger};

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Table of per-client async mutexes.
///
/// Entries are created on first use. An entry nobody holds or waits on
/// (the table owns the only `Arc`) is pruned on the next lookup, so the
/// table tracks active clients rather than every client ever seen.
#[derive(Default)]
pub struct ClientLocks {
    table: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ClientLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, client_code: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.retain(|code, lock| code == client_code || Arc::strong_count(lock) > 1);
        table.entry(client_code.to_string()).or_default().clone()
    }

    /// Number of clients currently tracked.
    pub fn len(&self) -> usize {
        self.table.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait for exclusive access to `client_code`.
    pub async fn lock(&self, client_code: &str) -> OwnedMutexGuard<()> {
        self.handle(client_code).lock_owned().await
    }
}

/// Result of [`DictionaryService::upgrade`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeReport {
    /// The stored form was legacy or out of date and was rewritten.
    pub upgraded: bool,
    pub token_count: usize,
}

/// Result of [`DictionaryService::retag`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetagOutcome {
    Completed(TagRun),
    /// Nothing was written.
    Cancelled { processed: usize, total: usize },
}

/// Tag freshness for a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagStatus {
    pub client_code: String,
    pub tag_count: usize,
    pub last_run: Option<TagRun>,
    pub dictionary_hash: String,
    /// True when there is no run, or the dictionary changed since the last one.
    pub stale: bool,
}

/// Orchestrates load → migrate → mutate → save against a [`Store`].
pub struct DictionaryService<S: Store> {
    store: S,
    locks: ClientLocks,
}

fn persistence(err: anyhow::Error) -> DictionaryError {
    DictionaryError::PersistenceFailure(err)
}

impl<S: Store> DictionaryService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: ClientLocks::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load and migrate a profile. Callers hold the client lock when the
    /// result is going to be written back.
    async fn load(&self, client_code: &str) -> Result<ClientAIProfile> {
        let record = self
            .store
            .get_profile(client_code)
            .await
            .map_err(persistence)?
            .ok_or_else(|| DictionaryError::ProfileNotFound(client_code.to_string()))?;
        let raw = record
            .dictionary
            .ok_or_else(|| DictionaryError::DictionaryMissing(client_code.to_string()))?;
        Ok(ClientAIProfile {
            client_code: record.client_code,
            dictionary: migrate(client_code, &raw)?,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    /// Current (migrated) profile. Nothing is written.
    pub async fn profile(&self, client_code: &str) -> Result<ClientAIProfile> {
        self.load(client_code).await
    }

    pub async fn dictionary(&self, client_code: &str) -> Result<MatchingDictionary> {
        Ok(self.load(client_code).await?.dictionary)
    }

    /// Create a profile with an empty dictionary. An existing profile is
    /// returned unchanged; returns `true` when a new profile was written.
    pub async fn create_profile(&self, client_code: &str) -> Result<(ClientAIProfile, bool)> {
        let _guard = self.locks.lock(client_code).await;
        match self.load(client_code).await {
            Ok(profile) => Ok((profile, false)),
            Err(DictionaryError::ProfileNotFound(_)) => {
                let profile = ClientAIProfile::new(client_code);
                self.store
                    .save_profile(&profile)
                    .await
                    .map_err(persistence)?;
                tracing::info!(client = client_code, "profile created");
                Ok((profile, true))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn list_profiles(&self) -> Result<Vec<String>> {
        self.store.list_profiles().await.map_err(persistence)
    }

    /// Run `op` against the client's dictionary under its lock and persist
    /// the result if it changed anything.
    async fn modify<F>(&self, client_code: &str, action: &str, op: F) -> Result<MergeReport>
    where
        F: FnOnce(&mut MatchingDictionary) -> Result<MergeReport>,
    {
        let _guard = self.locks.lock(client_code).await;
        let mut profile = self.load(client_code).await?;
        let report = op(&mut profile.dictionary)?;

        if report.changed() {
            profile.updated_at = Utc::now();
            self.store
                .save_profile(&profile)
                .await
                .map_err(persistence)?;
        }

        tracing::info!(
            client = client_code,
            action,
            added = report.added,
            duplicates = report.duplicates,
            updated = report.updated,
            rejected = report.rejected,
            mappings = report.mappings_changed,
            saved = report.changed(),
            "dictionary mutation"
        );
        Ok(report)
    }

    /// Add raw tokens to the bucket at `path`.
    pub async fn add_tokens<T: AsRef<str>>(
        &self,
        client_code: &str,
        path: &str,
        tokens: &[T],
        opts: TokenOptions,
    ) -> Result<MergeReport> {
        self.modify(client_code, "add", |dict| {
            mutate::add_tokens(dict, path, tokens, opts)
        })
        .await
    }

    pub async fn apply_suggestions(
        &self,
        client_code: &str,
        suggestions: &SuggestionSet,
    ) -> Result<MergeReport> {
        self.modify(client_code, "apply", |dict| {
            mutate::apply_suggestions(dict, suggestions)
        })
        .await
    }

    pub async fn harvest(&self, client_code: &str, entries: &[HarvestEntry]) -> Result<MergeReport> {
        self.modify(client_code, "harvest", |dict| mutate::harvest(dict, entries))
            .await
    }

    /// Rewrite a legacy stored dictionary in the current shape.
    pub async fn upgrade(&self, client_code: &str) -> Result<UpgradeReport> {
        let _guard = self.locks.lock(client_code).await;
        let record = self
            .store
            .get_profile(client_code)
            .await
            .map_err(persistence)?
            .ok_or_else(|| DictionaryError::ProfileNotFound(client_code.to_string()))?;
        let raw = record
            .dictionary
            .ok_or_else(|| DictionaryError::DictionaryMissing(client_code.to_string()))?;

        let upgraded = needs_migration(&raw);
        let dictionary = migrate(client_code, &raw)?;
        let token_count = dictionary.token_count();

        if upgraded {
            let profile = ClientAIProfile {
                client_code: record.client_code,
                dictionary,
                created_at: record.created_at,
                updated_at: Utc::now(),
            };
            self.store
                .save_profile(&profile)
                .await
                .map_err(persistence)?;
            tracing::info!(client = client_code, tokens = token_count, "dictionary upgraded");
        }

        Ok(UpgradeReport {
            upgraded,
            token_count,
        })
    }

    /// Insert or update corpus keywords. Blank keywords are skipped.
    pub async fn import_keywords(
        &self,
        client_code: &str,
        keywords: &[KeywordRecord],
    ) -> Result<usize> {
        let keywords: Vec<KeywordRecord> = keywords
            .iter()
            .filter(|k| !k.keyword.trim().is_empty())
            .map(|k| KeywordRecord {
                keyword: k.keyword.trim().to_string(),
                client_code: client_code.to_string(),
                search_volume: k.search_volume,
            })
            .collect();
        let written = self
            .store
            .upsert_keywords(client_code, &keywords)
            .await
            .map_err(persistence)?;
        tracing::info!(client = client_code, keywords = written, "keywords imported");
        Ok(written)
    }

    /// Classify one keyword against the current dictionary.
    pub async fn classify(&self, client_code: &str, keyword: &str) -> Result<TagAssignment> {
        let dict = self.dictionary(client_code).await?;
        Ok(Tagger::new(&dict).classify(keyword))
    }

    pub async fn explain(&self, client_code: &str, keyword: &str) -> Result<Explanation> {
        let dict = self.dictionary(client_code).await?;
        Ok(Tagger::new(&dict).explain(keyword))
    }

    /// Re-tag the client's whole corpus.
    ///
    /// `on_batch(processed, total)` runs on the blocking pool after every
    /// batch. A cancelled run writes nothing.
    pub async fn retag<F>(
        &self,
        client_code: &str,
        opts: TagOptions,
        on_batch: F,
    ) -> Result<RetagOutcome>
    where
        F: FnMut(usize, usize) + Send + 'static,
    {
        let started_at = Utc::now();
        let (dictionary_hash, tagger) = {
            let _guard = self.locks.lock(client_code).await;
            let dict = self.dictionary(client_code).await?;
            (dict.fingerprint(), Tagger::new(&dict))
        };
        let keywords = self
            .store
            .get_keywords(client_code)
            .await
            .map_err(persistence)?;

        tracing::info!(
            client = client_code,
            keywords = keywords.len(),
            tokens = tagger.len(),
            batch_size = opts.batch_size,
            "tagging run started"
        );

        let handle = tokio::task::spawn_blocking(move || {
            tag_corpus(&tagger, &keywords, &opts, on_batch)
        });
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        };

        let tags = match outcome {
            TagRunOutcome::Completed(tags) => tags,
            TagRunOutcome::Cancelled { processed, total } => {
                return Ok(RetagOutcome::Cancelled { processed, total });
            }
        };

        let _guard = self.locks.lock(client_code).await;
        self.store
            .save_tags(client_code, &tags)
            .await
            .map_err(persistence)?;
        let run = TagRun {
            id: uuid::Uuid::new_v4().to_string(),
            client_code: client_code.to_string(),
            started_at,
            finished_at: Utc::now(),
            keyword_count: tags.len() as i64,
            dictionary_hash,
        };
        self.store.record_tag_run(&run).await.map_err(persistence)?;

        tracing::info!(
            client = client_code,
            run = %run.id,
            keywords = run.keyword_count,
            elapsed_ms = (run.finished_at - run.started_at).num_milliseconds(),
            "tagging run completed"
        );
        Ok(RetagOutcome::Completed(run))
    }

    pub async fn read_tags(&self, client_code: &str) -> Result<Vec<TagAssignment>> {
        self.store.read_tags(client_code).await.map_err(persistence)
    }

    /// Compare the last run's dictionary hash with the current dictionary.
    pub async fn tag_status(&self, client_code: &str) -> Result<TagStatus> {
        let dict = self.dictionary(client_code).await?;
        let dictionary_hash = dict.fingerprint();
        let last_run = self
            .store
            .last_tag_run(client_code)
            .await
            .map_err(persistence)?;
        let tag_count = self.read_tags(client_code).await?.len();
        let stale = last_run
            .as_ref()
            .map(|run| run.dictionary_hash != dictionary_hash)
            .unwrap_or(true);
        Ok(TagStatus {
            client_code: client_code.to_string(),
            tag_count,
            last_run,
            dictionary_hash,
            stale,
        })
    }
}

impl DictionaryService<SqliteStore> {
    /// Service over the configured SQLite database.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(SqliteStore::open(config).await?))
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}
