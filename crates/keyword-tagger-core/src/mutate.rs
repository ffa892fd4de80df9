//! Dictionary mutators: add-token, apply (AI suggestions), and harvest.
//!
//! All three converge on the same set-semantics insertion into a
//! [`TokenSet`] and report what happened in a [`MergeReport`]. Each mutator
//! validates its whole input (bucket paths, intent keys, product-line keys)
//! before the first write, so an `Err` means the dictionary is untouched.
//!
//! Token inputs are normalized first. Inputs that normalize to nothing or
//! to more than four words are counted as `rejected` and skipped; they do
//! not fail the call.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bucket::{product_line_key, BucketPath};
use crate::error::{DictionaryError, Result};
use crate::models::{
    Intent, MatchingDictionary, Scope, TokenEntry, TokenSet, TokenSource, Upsert,
};
use crate::normalize::normalize_token;

/// Accounting for a single mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    /// Tokens actually inserted.
    pub added: usize,
    /// Tokens already present (in the bucket, or earlier in the same input).
    pub duplicates: usize,
    /// Existing entries whose scope or hard-negative flag changed.
    pub updated: usize,
    /// Inputs that were not valid tokens.
    pub rejected: usize,
    /// `productLineMap` entries created or overwritten.
    pub mappings_changed: usize,
    /// Product-line buckets created by this mutation.
    pub buckets_created: usize,
}

impl MergeReport {
    /// Whether the dictionary differs from before the mutation.
    pub fn changed(&self) -> bool {
        self.added + self.updated + self.mappings_changed + self.buckets_created > 0
    }

    fn absorb(&mut self, other: MergeReport) {
        self.added += other.added;
        self.duplicates += other.duplicates;
        self.updated += other.updated;
        self.rejected += other.rejected;
        self.mappings_changed += other.mappings_changed;
        self.buckets_created += other.buckets_created;
    }
}

/// Metadata applied to every token of an add-token call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenOptions {
    pub scope: Scope,
    pub is_hard_negative: bool,
    pub source: TokenSource,
}

fn insert_tokens<S: AsRef<str>>(set: &mut TokenSet, raw: &[S], opts: TokenOptions) -> MergeReport {
    let mut report = MergeReport::default();
    for token in raw {
        let Some(token) = normalize_token(token.as_ref()) else {
            report.rejected += 1;
            continue;
        };
        if set.insert(TokenEntry::new(token, opts.scope, opts.is_hard_negative, opts.source)) {
            report.added += 1;
        } else {
            report.duplicates += 1;
        }
    }
    report
}

fn ensure_product_line(dict: &mut MatchingDictionary, path: &BucketPath, report: &mut MergeReport) {
    if let BucketPath::ProductLine(key) = path {
        if !dict.product_line_tokens.contains_key(key) {
            report.buckets_created += 1;
        }
    }
}

/// Add one or more raw tokens to the bucket at `path`.
///
/// Re-adding an existing token is a no-op counted in `duplicates`.
pub fn add_tokens<S: AsRef<str>>(
    dict: &mut MatchingDictionary,
    path: &str,
    tokens: &[S],
    opts: TokenOptions,
) -> Result<MergeReport> {
    let path = BucketPath::parse(path)?;
    let mut report = MergeReport::default();
    ensure_product_line(dict, &path, &mut report);
    report.absorb(insert_tokens(dict.bucket_mut(&path), tokens, opts));
    Ok(report)
}

/// An externally proposed batch of additions, shaped like the dictionary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionSet {
    #[serde(default, alias = "brand_tokens")]
    pub brand_tokens: Vec<String>,
    #[serde(default, alias = "negative_tokens")]
    pub negative_tokens: Vec<String>,
    #[serde(default, alias = "industry_indicators")]
    pub industry_indicators: Vec<String>,
    #[serde(default, alias = "core_tokens")]
    pub core_tokens: Vec<String>,
    #[serde(default, alias = "adjacent_tokens")]
    pub adjacent_tokens: Vec<String>,
    #[serde(default, alias = "stop_tokens")]
    pub stop_tokens: Vec<String>,
    #[serde(default, alias = "product_line_tokens")]
    pub product_line_tokens: BTreeMap<String, Vec<String>>,
    #[serde(default, alias = "intent_tokens")]
    pub intent_tokens: BTreeMap<String, Vec<String>>,
    #[serde(default, alias = "product_line_map")]
    pub product_line_map: BTreeMap<String, Vec<String>>,
    /// Anything else the generator emitted; must be empty to apply.
    #[serde(flatten, skip_serializing)]
    pub unknown: BTreeMap<String, Value>,
}

impl SuggestionSet {
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| DictionaryError::InvalidSuggestion(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| DictionaryError::InvalidSuggestion(e.to_string()))
    }

    /// Resolve every target bucket, failing on the first invalid one.
    fn plan(&self) -> Result<Vec<(BucketPath, &[String])>> {
        if let Some(key) = self.unknown.keys().find(|k| k.as_str() != "version") {
            return Err(DictionaryError::UnknownBucket(key.clone()));
        }
        let mut plan: Vec<(BucketPath, &[String])> = Vec::new();
        for (name, tokens) in [
            ("brandTokens", &self.brand_tokens),
            ("negativeTokens", &self.negative_tokens),
            ("industryIndicators", &self.industry_indicators),
            ("coreTokens", &self.core_tokens),
            ("adjacentTokens", &self.adjacent_tokens),
            ("stopTokens", &self.stop_tokens),
        ] {
            if !tokens.is_empty() {
                plan.push((BucketPath::parse(name)?, tokens.as_slice()));
            }
        }
        for (key, tokens) in &self.product_line_tokens {
            plan.push((BucketPath::ProductLine(product_line_key(key)?), tokens.as_slice()));
        }
        for (key, tokens) in &self.intent_tokens {
            plan.push((BucketPath::Intent(key.parse::<Intent>()?), tokens.as_slice()));
        }
        for key in self.product_line_map.values().flatten() {
            product_line_key(key)?;
        }
        Ok(plan)
    }
}

/// Merge an AI-suggested addition set into the dictionary.
///
/// Every present field is merged with set semantics; product lines named by
/// the suggestion are created on first use. `report.added` is the total
/// across all buckets.
pub fn apply_suggestions(
    dict: &mut MatchingDictionary,
    suggestions: &SuggestionSet,
) -> Result<MergeReport> {
    let plan = suggestions.plan()?;
    let opts = TokenOptions {
        source: TokenSource::AiApply,
        ..TokenOptions::default()
    };

    let mut report = MergeReport::default();
    for (path, tokens) in plan {
        ensure_product_line(dict, &path, &mut report);
        report.absorb(insert_tokens(dict.bucket_mut(&path), tokens, opts));
    }

    for (raw_token, lines) in &suggestions.product_line_map {
        let Some(token) = normalize_token(raw_token) else {
            report.rejected += 1;
            continue;
        };
        let existing = dict.product_line_map.entry(token).or_default();
        let before = existing.len();
        for line in lines {
            let line = product_line_key(line)?;
            if !existing.contains(&line) {
                existing.push(line);
            }
        }
        if existing.len() > before {
            report.mappings_changed += 1;
        }
    }
    dict.product_line_map.retain(|_, lines| !lines.is_empty());

    Ok(report)
}

/// One manually curated token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestEntry {
    pub token: String,
    /// Bucket path, e.g. `brandTokens` or `intentTokens.DIRECTORY`.
    pub bucket: String,
    /// `None` keeps an existing entry's scope (CLIENT for new entries).
    #[serde(default)]
    pub scope: Option<Scope>,
    /// `None` keeps an existing entry's flag (false for new entries).
    #[serde(default)]
    pub is_hard_negative: Option<bool>,
    #[serde(default)]
    pub product_line: Option<String>,
}

/// Upsert curated tokens.
///
/// When an entry names a product line, `productLineMap[token]` is set to
/// exactly that line, replacing any earlier mapping (last write wins).
pub fn harvest(dict: &mut MatchingDictionary, entries: &[HarvestEntry]) -> Result<MergeReport> {
    let mut plan = Vec::with_capacity(entries.len());
    for entry in entries {
        let path = BucketPath::parse(&entry.bucket)?;
        let line = entry.product_line.as_deref().map(product_line_key).transpose()?;
        plan.push((path, line, entry));
    }

    let mut report = MergeReport::default();
    for (path, line, entry) in plan {
        let Some(token) = normalize_token(&entry.token) else {
            report.rejected += 1;
            continue;
        };
        ensure_product_line(dict, &path, &mut report);
        let set = dict.bucket_mut(&path);
        let existing = set.get(&token);
        let scope = entry
            .scope
            .or_else(|| existing.map(|e| e.scope))
            .unwrap_or_default();
        let hard_negative = entry
            .is_hard_negative
            .or_else(|| existing.map(|e| e.is_hard_negative))
            .unwrap_or(false);
        let token_entry = TokenEntry::new(token.clone(), scope, hard_negative, TokenSource::Harvest);
        match set.upsert(token_entry) {
            Upsert::Inserted => report.added += 1,
            Upsert::Updated => report.updated += 1,
            Upsert::Unchanged => report.duplicates += 1,
        }

        if let Some(line) = line {
            let mapped = vec![line];
            let previous = dict.product_line_map.get(&token).cloned();
            if previous.as_ref() != Some(&mapped) {
                if let Some(previous) = previous {
                    tracing::debug!(
                        token = %token,
                        from = ?previous,
                        to = ?mapped,
                        "overwriting product-line mapping"
                    );
                }
                dict.product_line_map.insert(token, mapped);
                report.mappings_changed += 1;
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opts() -> TokenOptions {
        TokenOptions::default()
    }

    #[test]
    fn test_add_token_twice_is_idempotent() {
        let mut dict = MatchingDictionary::new();
        let first = add_tokens(&mut dict, "brandTokens", &["Acme"], opts()).unwrap();
        let snapshot = dict.clone();
        let second = add_tokens(&mut dict, "brandTokens", &["  ACME "], opts()).unwrap();

        assert_eq!(first.added, 1);
        assert_eq!(second.added, 0);
        assert_eq!(second.duplicates, 1);
        assert!(!second.changed());
        assert_eq!(dict, snapshot);
    }

    #[test]
    fn test_add_token_nested_paths() {
        let mut dict = MatchingDictionary::new();
        let r = add_tokens(&mut dict, "productLineTokens.Winding", &["cone winder"], opts()).unwrap();
        assert_eq!(r.added, 1);
        assert_eq!(r.buckets_created, 1);
        assert!(dict.product_line_tokens["winding"].contains("cone winder"));

        add_tokens(&mut dict, "intentTokens.TRANSACTIONAL", &["buy"], opts()).unwrap();
        assert!(dict.intent_tokens[&Intent::Transactional].contains("buy"));
    }

    #[test]
    fn test_add_token_errors_leave_dictionary_untouched() {
        let mut dict = MatchingDictionary::new();
        let before = dict.clone();
        assert!(matches!(
            add_tokens(&mut dict, "colorTokens", &["red"], opts()),
            Err(DictionaryError::UnknownBucket(_))
        ));
        assert!(matches!(
            add_tokens(&mut dict, "intentTokens.NAVIGATIONAL", &["acme"], opts()),
            Err(DictionaryError::UnknownIntent(_))
        ));
        assert!(matches!(
            add_tokens(&mut dict, "productLineMap", &["x"], opts()),
            Err(DictionaryError::InvalidBucketPath(_))
        ));
        assert_eq!(dict, before);
    }

    #[test]
    fn test_add_token_rejects_invalid_tokens() {
        let mut dict = MatchingDictionary::new();
        let r = add_tokens(
            &mut dict,
            "coreTokens",
            &["   ", "one two three four five", "yarn"],
            opts(),
        )
        .unwrap();
        assert_eq!(r.added, 1);
        assert_eq!(r.rejected, 2);
    }

    #[test]
    fn test_apply_counts_unique_additions() {
        let mut dict = MatchingDictionary::new();
        let s = SuggestionSet::from_value(json!({ "brandTokens": ["acme", "acme"] })).unwrap();
        let r = apply_suggestions(&mut dict, &s).unwrap();
        assert_eq!(r.added, 1);
        assert_eq!(r.duplicates, 1);
        assert_eq!(dict.brand_tokens.get("acme").unwrap().source, TokenSource::AiApply);
    }

    #[test]
    fn test_apply_merges_all_fields_and_creates_lines() {
        let mut dict = MatchingDictionary::new();
        add_tokens(&mut dict, "coreTokens", &["twisting machine"], opts()).unwrap();
        let s = SuggestionSet::from_value(json!({
            "coreTokens": ["twisting machine", "yarn twister"],
            "negativeTokens": ["jobs"],
            "productLineTokens": { "TFO": ["two for one", "tfo"] },
            "intentTokens": { "COMMERCIAL_RESEARCH": ["price", "best"] },
            "productLineMap": { "tfo": ["tfo"] }
        }))
        .unwrap();
        let r = apply_suggestions(&mut dict, &s).unwrap();
        assert_eq!(r.added, 1 + 1 + 2 + 2);
        assert_eq!(r.duplicates, 1);
        assert_eq!(r.buckets_created, 1);
        assert_eq!(r.mappings_changed, 1);
        assert_eq!(dict.product_line_map["tfo"], vec!["tfo".to_string()]);

        // Re-applying changes nothing.
        let again = apply_suggestions(&mut dict, &s).unwrap();
        assert!(!again.changed());
    }

    #[test]
    fn test_apply_validates_before_writing() {
        let mut dict = MatchingDictionary::new();
        let before = dict.clone();
        let s = SuggestionSet::from_value(json!({
            "brandTokens": ["acme"],
            "intentTokens": { "NAVIGATIONAL": ["acme"] }
        }))
        .unwrap();
        assert!(matches!(
            apply_suggestions(&mut dict, &s),
            Err(DictionaryError::UnknownIntent(_))
        ));
        assert_eq!(dict, before);

        let s = SuggestionSet::from_value(json!({ "brandTokens": ["acme"], "colorTokens": ["red"] }))
            .unwrap();
        assert!(matches!(
            apply_suggestions(&mut dict, &s),
            Err(DictionaryError::UnknownBucket(k)) if k == "colorTokens"
        ));
        assert_eq!(dict, before);
    }

    #[test]
    fn test_suggestion_rejects_wrong_types() {
        assert!(matches!(
            SuggestionSet::from_value(json!({ "brandTokens": "acme" })),
            Err(DictionaryError::InvalidSuggestion(_))
        ));
    }

    #[test]
    fn test_harvest_upserts_with_flags() {
        let mut dict = MatchingDictionary::new();
        let entries = vec![
            HarvestEntry {
                token: "Free".into(),
                bucket: "coreTokens".into(),
                scope: Some(Scope::Global),
                is_hard_negative: Some(true),
                product_line: None,
            },
            HarvestEntry {
                token: "free".into(),
                bucket: "coreTokens".into(),
                scope: None,
                is_hard_negative: None,
                product_line: None,
            },
        ];
        let r = harvest(&mut dict, &entries).unwrap();
        assert_eq!(r.added, 1);
        assert_eq!(r.duplicates, 1);
        let e = dict.core_tokens.get("free").unwrap();
        assert!(e.is_hard_negative, "unspecified flag keeps existing value");
        assert_eq!(e.scope, Scope::Global);
        assert_eq!(e.source, TokenSource::Harvest);
    }

    #[test]
    fn test_harvest_product_line_last_write_wins() {
        let mut dict = MatchingDictionary::new();
        let mk = |line: &str| HarvestEntry {
            token: "twister".into(),
            bucket: format!("productLineTokens.{}", line),
            scope: Some(Scope::Client),
            is_hard_negative: None,
            product_line: Some(line.into()),
        };
        harvest(&mut dict, &[mk("TFO")]).unwrap();
        assert_eq!(dict.product_line_map["twister"], vec!["tfo".to_string()]);

        let r = harvest(&mut dict, &[mk("Ring Twister")]).unwrap();
        assert_eq!(r.mappings_changed, 1);
        assert_eq!(dict.product_line_map["twister"], vec!["ring twister".to_string()]);

        let r = harvest(&mut dict, &[mk("Ring Twister")]).unwrap();
        assert_eq!(r.mappings_changed, 0);
    }

    #[test]
    fn test_harvest_invalid_path_is_atomic() {
        let mut dict = MatchingDictionary::new();
        let before = dict.clone();
        let entries = vec![
            HarvestEntry {
                token: "acme".into(),
                bucket: "brandTokens".into(),
                scope: Some(Scope::Client),
                is_hard_negative: None,
                product_line: None,
            },
            HarvestEntry {
                token: "x".into(),
                bucket: "coreTokens.sub".into(),
                scope: Some(Scope::Client),
                is_hard_negative: None,
                product_line: None,
            },
        ];
        assert!(matches!(
            harvest(&mut dict, &entries),
            Err(DictionaryError::InvalidBucketPath(_))
        ));
        assert_eq!(dict, before);
    }

    #[test]
    fn test_harvest_entry_deserializes_camel_case() {
        let e: HarvestEntry = serde_json::from_value(json!({
            "token": "near me",
            "bucket": "intentTokens.DIRECTORY",
            "scope": "GLOBAL",
            "isHardNegative": false,
            "productLine": null
        }))
        .unwrap();
        assert_eq!(e.scope, Some(Scope::Global));
        assert_eq!(e.is_hard_negative, Some(false));
    }

    #[test]
    fn test_harvest_without_scope_keeps_global() {
        let mut dict = MatchingDictionary::new();
        let global = TokenOptions {
            scope: Scope::Global,
            ..TokenOptions::default()
        };
        add_tokens(&mut dict, "negativeTokens", &["jobs"], global).unwrap();

        let e: HarvestEntry = serde_json::from_value(json!({
            "token": "jobs",
            "bucket": "negativeTokens",
            "isHardNegative": false
        }))
        .unwrap();
        let r = harvest(&mut dict, &[e]).unwrap();
        assert_eq!(r.updated, 0);
        assert_eq!(r.duplicates, 1);
        assert!(!r.changed());
        assert_eq!(dict.negative_tokens.get("jobs").unwrap().scope, Scope::Global);

        let e: HarvestEntry = serde_json::from_value(json!({
            "token": "careers",
            "bucket": "negativeTokens"
        }))
        .unwrap();
        harvest(&mut dict, &[e]).unwrap();
        assert_eq!(dict.negative_tokens.get("careers").unwrap().scope, Scope::Client);
    }

    #[test]
    fn test_dotted_product_line_reachable_by_every_mutator() {
        let mut dict = MatchingDictionary::new();
        let s = SuggestionSet::from_value(json!({
            "productLineTokens": { "2.5 Inch Pumps": ["mini pump"] }
        }))
        .unwrap();
        let r = apply_suggestions(&mut dict, &s).unwrap();
        assert_eq!(r.buckets_created, 1);

        let r = add_tokens(&mut dict, "productLineTokens.2.5 inch pumps", &["compact pump"], opts())
            .unwrap();
        assert_eq!(r.added, 1);
        assert_eq!(r.buckets_created, 0);

        let e: HarvestEntry = serde_json::from_value(json!({
            "token": "small pump",
            "bucket": "productLineTokens.2.5 inch pumps",
            "productLine": "2.5 inch pumps"
        }))
        .unwrap();
        let r = harvest(&mut dict, &[e]).unwrap();
        assert_eq!(r.buckets_created, 0);

        assert_eq!(dict.product_line_tokens.len(), 1);
        let line = &dict.product_line_tokens["2.5 inch pumps"];
        for token in ["mini pump", "compact pump", "small pump"] {
            assert!(line.contains(token), "{} missing", token);
        }
        assert_eq!(dict.product_line_map["small pump"], vec!["2.5 inch pumps".to_string()]);
    }
}
