//! Core data models: token entries, the matching dictionary, client
//! profiles, corpus records, and tag assignments.
//!
//! Everything here serializes to the camelCase JSON shape stored by the
//! persistence layer. Bucket contents are kept sorted by token so the
//! serialized dictionary is deterministic.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::bucket::FlatBucket;
use crate::error::DictionaryError;
use crate::normalize::{normalize, word_count, MAX_TOKEN_WORDS};

/// Current stored dictionary shape. Legacy (string-array) dictionaries are `1`.
pub const CURRENT_VERSION: u32 = 2;

/// Whether a token rule applies dictionary-wide or only for this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    Global,
    #[default]
    Client,
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(Scope::Global),
            "client" => Ok(Scope::Client),
            other => Err(format!("unknown scope '{}': use global or client", other)),
        }
    }
}

/// Provenance of a token entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    #[default]
    Manual,
    Harvest,
    AiApply,
    LegacyMigrated,
}

/// A normalized token plus its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenEntry {
    pub token: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub is_hard_negative: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub source: TokenSource,
}

impl TokenEntry {
    /// Build an entry for an already-normalized token.
    pub fn new(token: String, scope: Scope, is_hard_negative: bool, source: TokenSource) -> Self {
        Self {
            token,
            scope,
            is_hard_negative,
            created_at: Utc::now(),
            source,
        }
    }

    /// Entry produced when upgrading a legacy string bucket.
    pub fn legacy(token: String) -> Self {
        Self::new(token, Scope::Client, false, TokenSource::LegacyMigrated)
    }
}

/// Outcome of [`TokenSet::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
    Unchanged,
}

/// A bucket: a set of [`TokenEntry`] unique by normalized token.
///
/// Serialized as a JSON array sorted by token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<TokenEntry>", into = "Vec<TokenEntry>")]
pub struct TokenSet {
    entries: BTreeMap<String, TokenEntry>,
}

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert with set semantics. Returns `false` (and changes nothing) if
    /// the token is already present.
    pub fn insert(&mut self, entry: TokenEntry) -> bool {
        if self.entries.contains_key(&entry.token) {
            return false;
        }
        self.entries.insert(entry.token.clone(), entry);
        true
    }

    /// Insert, or overwrite the scope and hard-negative flag of an existing
    /// entry. The original `createdAt` and `source` are kept on update.
    pub fn upsert(&mut self, entry: TokenEntry) -> Upsert {
        match self.entries.get_mut(&entry.token) {
            None => {
                self.entries.insert(entry.token.clone(), entry);
                Upsert::Inserted
            }
            Some(existing) => {
                if existing.scope == entry.scope
                    && existing.is_hard_negative == entry.is_hard_negative
                {
                    Upsert::Unchanged
                } else {
                    existing.scope = entry.scope;
                    existing.is_hard_negative = entry.is_hard_negative;
                    Upsert::Updated
                }
            }
        }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    pub fn get(&self, token: &str) -> Option<&TokenEntry> {
        self.entries.get(token)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TokenEntry> {
        self.entries.values()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<TokenEntry>> for TokenSet {
    fn from(entries: Vec<TokenEntry>) -> Self {
        let mut set = TokenSet::new();
        for mut entry in entries {
            entry.token = normalize(&entry.token);
            if !entry.token.is_empty() {
                set.insert(entry);
            }
        }
        set
    }
}

impl From<TokenSet> for Vec<TokenEntry> {
    fn from(set: TokenSet) -> Self {
        set.entries.into_values().collect()
    }
}

impl FromIterator<TokenEntry> for TokenSet {
    fn from_iter<I: IntoIterator<Item = TokenEntry>>(iter: I) -> Self {
        TokenSet::from(iter.into_iter().collect::<Vec<_>>())
    }
}

/// Closed set of search intents, in matching priority order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Transactional,
    CommercialResearch,
    Informational,
    Directory,
}

impl Intent {
    /// All intents in the order the tagger evaluates them.
    pub const ALL: [Intent; 4] = [
        Intent::Transactional,
        Intent::CommercialResearch,
        Intent::Informational,
        Intent::Directory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Transactional => "TRANSACTIONAL",
            Intent::CommercialResearch => "COMMERCIAL_RESEARCH",
            Intent::Informational => "INFORMATIONAL",
            Intent::Directory => "DIRECTORY",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = DictionaryError;

    /// Case-insensitive; `-` and spaces are accepted in place of `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Intent::ALL
            .into_iter()
            .find(|i| i.as_str() == key)
            .ok_or_else(|| DictionaryError::UnknownIntent(s.to_string()))
    }
}

fn all_intents() -> BTreeMap<Intent, TokenSet> {
    Intent::ALL.into_iter().map(|i| (i, TokenSet::new())).collect()
}

fn current_version() -> u32 {
    CURRENT_VERSION
}

/// The per-client taxonomy of matching tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingDictionary {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default)]
    pub brand_tokens: TokenSet,
    #[serde(default)]
    pub negative_tokens: TokenSet,
    #[serde(default)]
    pub industry_indicators: TokenSet,
    #[serde(default)]
    pub core_tokens: TokenSet,
    #[serde(default)]
    pub adjacent_tokens: TokenSet,
    #[serde(default)]
    pub stop_tokens: TokenSet,
    /// Product-line key → tokens. Open-ended: keys are created on first use.
    #[serde(default)]
    pub product_line_tokens: BTreeMap<String, TokenSet>,
    /// Intent → tokens. Always holds all four intents.
    #[serde(default = "all_intents")]
    pub intent_tokens: BTreeMap<Intent, TokenSet>,
    /// Normalized token → product-line keys it signals.
    #[serde(default)]
    pub product_line_map: BTreeMap<String, Vec<String>>,
}

impl Default for MatchingDictionary {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            brand_tokens: TokenSet::new(),
            negative_tokens: TokenSet::new(),
            industry_indicators: TokenSet::new(),
            core_tokens: TokenSet::new(),
            adjacent_tokens: TokenSet::new(),
            stop_tokens: TokenSet::new(),
            product_line_tokens: BTreeMap::new(),
            intent_tokens: all_intents(),
            product_line_map: BTreeMap::new(),
        }
    }
}

impl MatchingDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flat(&self, bucket: FlatBucket) -> &TokenSet {
        match bucket {
            FlatBucket::Brand => &self.brand_tokens,
            FlatBucket::Negative => &self.negative_tokens,
            FlatBucket::Industry => &self.industry_indicators,
            FlatBucket::Core => &self.core_tokens,
            FlatBucket::Adjacent => &self.adjacent_tokens,
            FlatBucket::Stop => &self.stop_tokens,
        }
    }

    pub fn flat_mut(&mut self, bucket: FlatBucket) -> &mut TokenSet {
        match bucket {
            FlatBucket::Brand => &mut self.brand_tokens,
            FlatBucket::Negative => &mut self.negative_tokens,
            FlatBucket::Industry => &mut self.industry_indicators,
            FlatBucket::Core => &mut self.core_tokens,
            FlatBucket::Adjacent => &mut self.adjacent_tokens,
            FlatBucket::Stop => &mut self.stop_tokens,
        }
    }

    /// Intent bucket; always present after construction or migration.
    pub fn intent(&self, intent: Intent) -> Option<&TokenSet> {
        self.intent_tokens.get(&intent)
    }

    /// Iterate every bucket with a label, flat buckets first.
    pub fn buckets(&self) -> impl Iterator<Item = (String, &TokenSet)> {
        let flat = FlatBucket::ALL
            .into_iter()
            .map(move |b| (b.name().to_string(), self.flat(b)));
        let lines = self
            .product_line_tokens
            .iter()
            .map(|(k, v)| (format!("productLineTokens.{}", k), v));
        let intents = self
            .intent_tokens
            .iter()
            .map(|(k, v)| (format!("intentTokens.{}", k), v));
        flat.chain(lines).chain(intents)
    }

    /// Total entries across all buckets (cross-bucket duplicates counted).
    pub fn token_count(&self) -> usize {
        self.buckets().map(|(_, set)| set.len()).sum()
    }

    /// Longest stored token, in words, clamped to `1..=MAX_TOKEN_WORDS`.
    pub fn max_token_words(&self) -> usize {
        self.buckets()
            .flat_map(|(_, set)| set.tokens().map(word_count).collect::<Vec<_>>())
            .chain(self.product_line_map.keys().map(|k| word_count(k)))
            .max()
            .unwrap_or(1)
            .clamp(1, MAX_TOKEN_WORDS)
    }

    /// SHA-256 over the classification-relevant content (tokens,
    /// hard-negative flags, product-line mapping). Audit metadata such as
    /// `createdAt` does not change the fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (label, set) in self.buckets() {
            hasher.update(label.as_bytes());
            hasher.update([0u8]);
            for entry in set.iter() {
                hasher.update(entry.token.as_bytes());
                hasher.update([entry.is_hard_negative as u8, 0u8]);
            }
            hasher.update([1u8]);
        }
        for (token, lines) in &self.product_line_map {
            hasher.update(token.as_bytes());
            for line in lines {
                hasher.update([0u8]);
                hasher.update(line.as_bytes());
            }
            hasher.update([1u8]);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// A client's AI profile; owns exactly one dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientAIProfile {
    pub client_code: String,
    pub dictionary: MatchingDictionary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClientAIProfile {
    /// Fresh profile with an empty dictionary.
    pub fn new(client_code: &str) -> Self {
        let now = Utc::now();
        Self {
            client_code: client_code.to_string(),
            dictionary: MatchingDictionary::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One keyword of a client's corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordRecord {
    pub keyword: String,
    pub client_code: String,
    #[serde(default)]
    pub search_volume: i64,
}

/// Bucket a keyword is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TagBucket {
    Excluded,
    Brand,
    Product,
    Industry,
    Core,
    Adjacent,
    Unclassified,
}

impl TagBucket {
    pub const ALL: [TagBucket; 7] = [
        TagBucket::Excluded,
        TagBucket::Brand,
        TagBucket::Product,
        TagBucket::Industry,
        TagBucket::Core,
        TagBucket::Adjacent,
        TagBucket::Unclassified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TagBucket::Excluded => "EXCLUDED",
            TagBucket::Brand => "BRAND",
            TagBucket::Product => "PRODUCT",
            TagBucket::Industry => "INDUSTRY",
            TagBucket::Core => "CORE",
            TagBucket::Adjacent => "ADJACENT",
            TagBucket::Unclassified => "UNCLASSIFIED",
        }
    }
}

impl fmt::Display for TagBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_uppercase();
        TagBucket::ALL
            .into_iter()
            .find(|b| b.as_str() == key)
            .ok_or_else(|| format!("unknown tag bucket: '{}'", s))
    }
}

/// Result of classifying one keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagAssignment {
    pub keyword: String,
    pub bucket: TagBucket,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_line: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
}

/// Audit record of a completed tagging run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRun {
    pub id: String,
    pub client_code: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub keyword_count: i64,
    pub dictionary_hash: String,
}
