//! In-memory [`Store`] implementation for tests and embedding.
//!
//! Uses `HashMap`s behind `std::sync::RwLock` for thread safety. Profiles
//! keep their dictionary as serialized JSON so loads go through the same
//! migration path as the SQLite store.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;

use crate::models::{ClientAIProfile, KeywordRecord, TagAssignment, TagRun};

use super::{ProfileRecord, Store};

/// In-memory store. Keyword corpora keep insertion order.
pub struct InMemoryStore {
    profiles: RwLock<HashMap<String, ProfileRecord>>,
    keywords: RwLock<HashMap<String, Vec<KeywordRecord>>>,
    tags: RwLock<HashMap<String, Vec<TagAssignment>>>,
    runs: RwLock<Vec<TagRun>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
            keywords: RwLock::new(HashMap::new()),
            tags: RwLock::new(HashMap::new()),
            runs: RwLock::new(Vec::new()),
        }
    }

    /// Seed a profile row with an arbitrary stored dictionary, e.g. a
    /// legacy string-array shape or `None`.
    pub fn insert_raw_profile(
        &self,
        client_code: &str,
        dictionary: Option<serde_json::Value>,
    ) -> Result<()> {
        let now = Utc::now();
        write(&self.profiles)?.insert(
            client_code.to_string(),
            ProfileRecord {
                client_code: client_code.to_string(),
                dictionary,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_profile(&self, client_code: &str) -> Result<Option<ProfileRecord>> {
        Ok(read(&self.profiles)?.get(client_code).cloned())
    }

    async fn save_profile(&self, profile: &ClientAIProfile) -> Result<()> {
        let dictionary = serde_json::to_value(&profile.dictionary)?;
        write(&self.profiles)?.insert(
            profile.client_code.clone(),
            ProfileRecord {
                client_code: profile.client_code.clone(),
                dictionary: Some(dictionary),
                created_at: profile.created_at,
                updated_at: profile.updated_at,
            },
        );
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<String>> {
        let mut codes: Vec<String> = read(&self.profiles)?.keys().cloned().collect();
        codes.sort();
        Ok(codes)
    }

    async fn get_keywords(&self, client_code: &str) -> Result<Vec<KeywordRecord>> {
        Ok(read(&self.keywords)?
            .get(client_code)
            .cloned()
            .unwrap_or_default())
    }

    async fn upsert_keywords(
        &self,
        client_code: &str,
        keywords: &[KeywordRecord],
    ) -> Result<usize> {
        let mut all = write(&self.keywords)?;
        let corpus = all.entry(client_code.to_string()).or_default();
        for k in keywords {
            match corpus.iter_mut().find(|e| e.keyword == k.keyword) {
                Some(existing) => existing.search_volume = k.search_volume,
                None => corpus.push(KeywordRecord {
                    keyword: k.keyword.clone(),
                    client_code: client_code.to_string(),
                    search_volume: k.search_volume,
                }),
            }
        }
        Ok(keywords.len())
    }

    async fn save_tags(&self, client_code: &str, tags: &[TagAssignment]) -> Result<()> {
        let mut sorted = tags.to_vec();
        sorted.sort_by(|a, b| a.keyword.cmp(&b.keyword));
        write(&self.tags)?.insert(client_code.to_string(), sorted);
        Ok(())
    }

    async fn read_tags(&self, client_code: &str) -> Result<Vec<TagAssignment>> {
        Ok(read(&self.tags)?
            .get(client_code)
            .cloned()
            .unwrap_or_default())
    }

    async fn record_tag_run(&self, run: &TagRun) -> Result<()> {
        write(&self.runs)?.push(run.clone());
        Ok(())
    }

    async fn last_tag_run(&self, client_code: &str) -> Result<Option<TagRun>> {
        Ok(read(&self.runs)?
            .iter()
            .filter(|r| r.client_code == client_code)
            .max_by_key(|r| r.finished_at)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TagBucket, TokenEntry};
    use serde_json::json;

    fn kw(keyword: &str, volume: i64) -> KeywordRecord {
        KeywordRecord {
            keyword: keyword.to_string(),
            client_code: "c1".to_string(),
            search_volume: volume,
        }
    }

    #[tokio::test]
    async fn test_profile_round_trip() {
        let store = InMemoryStore::new();
        assert!(store.get_profile("c1").await.unwrap().is_none());

        let mut profile = ClientAIProfile::new("c1");
        profile
            .dictionary
            .brand_tokens
            .insert(TokenEntry::legacy("acme".to_string()));
        store.save_profile(&profile).await.unwrap();

        let record = store.get_profile("c1").await.unwrap().unwrap();
        let dict = record.dictionary.unwrap();
        assert_eq!(dict["brandTokens"][0]["token"], "acme");
        assert_eq!(store.list_profiles().await.unwrap(), vec!["c1".to_string()]);
    }

    #[tokio::test]
    async fn test_raw_profile_is_returned_unmigrated() {
        let store = InMemoryStore::new();
        store
            .insert_raw_profile("c1", Some(json!({ "brandTokens": ["acme"] })))
            .unwrap();
        let record = store.get_profile("c1").await.unwrap().unwrap();
        assert_eq!(record.dictionary.unwrap()["brandTokens"][0], "acme");
    }

    #[tokio::test]
    async fn test_upsert_keywords_updates_volume() {
        let store = InMemoryStore::new();
        store
            .upsert_keywords("c1", &[kw("pump", 10), kw("valve", 5)])
            .await
            .unwrap();
        store.upsert_keywords("c1", &[kw("pump", 40)]).await.unwrap();

        let corpus = store.get_keywords("c1").await.unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus[0].search_volume, 40);
        assert!(store.get_keywords("c2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_tags_replaces_wholesale() {
        let store = InMemoryStore::new();
        let tag = |k: &str, bucket| TagAssignment {
            keyword: k.to_string(),
            bucket,
            product_line: None,
            intent: None,
        };
        store
            .save_tags("c1", &[tag("b", TagBucket::Core), tag("a", TagBucket::Brand)])
            .await
            .unwrap();
        store
            .save_tags("c1", &[tag("z", TagBucket::Unclassified)])
            .await
            .unwrap();

        let tags = store.read_tags("c1").await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].keyword, "z");
    }

    #[tokio::test]
    async fn test_last_tag_run_is_latest_for_client() {
        let store = InMemoryStore::new();
        let run = |id: &str, client: &str, secs: i64| TagRun {
            id: id.to_string(),
            client_code: client.to_string(),
            started_at: chrono::DateTime::from_timestamp(secs, 0).unwrap(),
            finished_at: chrono::DateTime::from_timestamp(secs + 1, 0).unwrap(),
            keyword_count: 1,
            dictionary_hash: "h".to_string(),
        };
        store.record_tag_run(&run("r1", "c1", 100)).await.unwrap();
        store.record_tag_run(&run("r2", "c1", 200)).await.unwrap();
        store.record_tag_run(&run("r3", "c2", 300)).await.unwrap();

        let last = store.last_tag_run("c1").await.unwrap().unwrap();
        assert_eq!(last.id, "r2");
        assert!(store.last_tag_run("c9").await.unwrap().is_none());
    }
}
