//! Dictionary migration from stored JSON.
//!
//! Stored dictionaries may predate [`TokenEntry`] records: buckets were
//! plain string arrays, and some rows were upgraded bucket-by-bucket, so a
//! single dictionary can mix both shapes. [`migrate`] inspects every
//! bucket independently and returns a current [`MatchingDictionary`].
//!
//! # Rules
//!
//! 1. A string element becomes `TokenEntry { scope: CLIENT,
//!    isHardNegative: false, source: legacy_migrated }`.
//! 2. An object element is read as a current `TokenEntry`.
//! 3. Missing buckets initialize empty; all four intents are present.
//! 4. Tokens are re-normalized; duplicates collapse to the first occurrence.
//! 5. camelCase and legacy snake_case field names are both read.
//! 6. An object whose metadata does not parse keeps its token: readable
//!    fields are salvaged and the rest take legacy defaults.
//! 7. Elements without a token and unknown intent keys are dropped with a
//!    warning rather than failing the whole dictionary.
//!
//! Migrating an already-current dictionary returns an equal structure.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::bucket::{product_line_key, FlatBucket, NestedBucket};
use crate::error::{DictionaryError, Result};
use crate::models::{
    Intent, MatchingDictionary, Scope, TokenEntry, TokenSet, TokenSource, CURRENT_VERSION,
};
use crate::normalize::normalize;

/// Upgrade a stored dictionary value to the current model.
///
/// `client_code` is only used for the error and log context.
pub fn migrate(client_code: &str, raw: &Value) -> Result<MatchingDictionary> {
    let obj = match raw {
        Value::Object(obj) => obj,
        Value::String(s) => {
            // Some rows hold the dictionary as a JSON-encoded string.
            let inner: Value = serde_json::from_str(s)
                .map_err(|_| DictionaryError::DictionaryMissing(client_code.to_string()))?;
            return migrate(client_code, &inner);
        }
        _ => return Err(DictionaryError::DictionaryMissing(client_code.to_string())),
    };

    let mut dict = MatchingDictionary::new();
    let mut legacy_seen = false;

    for bucket in FlatBucket::ALL {
        if let Some(value) = field(obj, bucket.name(), bucket.legacy_name()) {
            let (set, legacy) = migrate_bucket(client_code, bucket.name(), value);
            legacy_seen |= legacy;
            *dict.flat_mut(bucket) = set;
        }
    }

    if let Some(value) = field(
        obj,
        NestedBucket::ProductLine.name(),
        NestedBucket::ProductLine.legacy_name(),
    ) {
        match value {
            Value::Object(lines) => {
                for (raw_key, value) in lines {
                    let Ok(key) = product_line_key(raw_key) else {
                        tracing::warn!(client = client_code, "dropping product line with empty key");
                        continue;
                    };
                    let (set, legacy) = migrate_bucket(client_code, raw_key, value);
                    legacy_seen |= legacy;
                    merge_into(dict.product_line_tokens.entry(key).or_default(), set);
                }
            }
            Value::Null => {}
            _ => tracing::warn!(client = client_code, "productLineTokens is not an object; ignored"),
        }
    }

    if let Some(value) = field(
        obj,
        NestedBucket::Intent.name(),
        NestedBucket::Intent.legacy_name(),
    ) {
        match value {
            Value::Object(intents) => {
                for (raw_key, value) in intents {
                    let Ok(intent) = raw_key.parse::<Intent>() else {
                        tracing::warn!(client = client_code, intent = %raw_key, "dropping unknown intent bucket");
                        continue;
                    };
                    let (set, legacy) = migrate_bucket(client_code, raw_key, value);
                    legacy_seen |= legacy;
                    merge_into(dict.intent_tokens.entry(intent).or_default(), set);
                }
            }
            Value::Null => {}
            _ => tracing::warn!(client = client_code, "intentTokens is not an object; ignored"),
        }
    }

    if let Some(Value::Object(map)) = field(obj, "productLineMap", "product_line_map") {
        for (raw_token, lines) in map {
            let token = normalize(raw_token);
            if token.is_empty() {
                continue;
            }
            let lines: Vec<String> = match lines {
                Value::String(s) => vec![s.clone()],
                Value::Array(items) => items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
                _ => Vec::new(),
            };
            let target = dict.product_line_map.entry(token).or_default();
            for line in lines {
                let line = normalize(&line);
                if !line.is_empty() && !target.contains(&line) {
                    target.push(line);
                }
            }
        }
    }
    dict.product_line_map.retain(|_, lines| !lines.is_empty());

    let stored_version = obj.get("version").and_then(Value::as_u64).unwrap_or(1);
    if legacy_seen || stored_version < CURRENT_VERSION as u64 {
        tracing::debug!(
            client = client_code,
            from = stored_version,
            to = CURRENT_VERSION,
            "migrated legacy dictionary"
        );
    }
    dict.version = CURRENT_VERSION;

    Ok(dict)
}

/// True when the stored value would be changed by [`migrate`] in shape
/// (string elements, entries with unreadable metadata, missing version, or
/// an older version number).
pub fn needs_migration(raw: &Value) -> bool {
    let Value::Object(obj) = raw else {
        return true;
    };
    let version = obj.get("version").and_then(Value::as_u64).unwrap_or(1);
    if version < CURRENT_VERSION as u64 {
        return true;
    }
    fn is_legacy(item: &Value) -> bool {
        match item {
            Value::String(_) => true,
            Value::Object(_) => serde_json::from_value::<TokenEntry>(item.clone()).is_err(),
            _ => false,
        }
    }
    fn has_legacy(v: &Value) -> bool {
        match v {
            Value::Array(items) => items.iter().any(is_legacy),
            Value::Object(map) => map.values().any(has_legacy),
            _ => false,
        }
    }
    obj.iter()
        .filter(|(k, _)| k.as_str() != "productLineMap" && k.as_str() != "product_line_map")
        .any(|(_, v)| has_legacy(v))
}

fn field<'a>(obj: &'a Map<String, Value>, name: &str, legacy: &str) -> Option<&'a Value> {
    obj.get(name).or_else(|| obj.get(legacy))
}

/// Convert one bucket value. Returns the set and whether any legacy
/// (string) element was seen.
fn migrate_bucket(client_code: &str, label: &str, value: &Value) -> (TokenSet, bool) {
    let mut set = TokenSet::new();
    let mut legacy = false;
    let items = match value {
        Value::Array(items) => items,
        Value::Null => return (set, false),
        _ => {
            tracing::warn!(client = client_code, bucket = label, "bucket is not an array; ignored");
            return (set, false);
        }
    };
    for item in items {
        match item {
            Value::String(s) => {
                legacy = true;
                let token = normalize(s);
                if !token.is_empty() {
                    set.insert(TokenEntry::legacy(token));
                }
            }
            Value::Object(fields) => {
                let entry = match serde_json::from_value::<TokenEntry>(item.clone()) {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        let salvaged = salvage_entry(fields);
                        if salvaged.is_some() {
                            tracing::warn!(client = client_code, bucket = label, error = %e, "token entry metadata unreadable; kept token with defaults");
                        } else {
                            tracing::warn!(client = client_code, bucket = label, error = %e, "dropping token entry without a token");
                        }
                        salvaged
                    }
                };
                if let Some(mut entry) = entry {
                    entry.token = normalize(&entry.token);
                    if !entry.token.is_empty() {
                        set.insert(entry);
                    }
                }
            }
            _ => {
                tracing::warn!(client = client_code, bucket = label, "dropping non-token element");
            }
        }
    }
    (set, legacy)
}

/// Rebuild an entry whose metadata failed strict parsing. The token must be
/// a string; every other field is read when it can be and defaulted when it
/// cannot.
fn salvage_entry(fields: &Map<String, Value>) -> Option<TokenEntry> {
    let token = fields.get("token")?.as_str()?.to_string();
    let mut entry = TokenEntry::legacy(token);

    if let Some(scope) = fields
        .get("scope")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<Scope>().ok())
    {
        entry.scope = scope;
    }

    let hard_negative = field(fields, "isHardNegative", "is_hard_negative");
    match hard_negative {
        Some(Value::Bool(b)) => entry.is_hard_negative = *b,
        Some(Value::String(s)) => entry.is_hard_negative = s.trim().eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => entry.is_hard_negative = n.as_i64() == Some(1),
        _ => {}
    }

    match field(fields, "createdAt", "created_at") {
        Some(Value::String(s)) => {
            if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                entry.created_at = ts.with_timezone(&Utc);
            }
        }
        Some(Value::Number(n)) => {
            if let Some(ts) = n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)) {
                entry.created_at = ts;
            }
        }
        _ => {}
    }

    if let Some(source) = fields
        .get("source")
        .and_then(|v| serde_json::from_value::<TokenSource>(v.clone()).ok())
    {
        entry.source = source;
    }

    Some(entry)
}

fn merge_into(target: &mut TokenSet, source: TokenSet) {
    for entry in Vec::from(source) {
        target.insert(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_legacy_bucket_is_lossless() {
        let raw = json!({ "brandTokens": ["x", "y"] });
        let dict = migrate("c1", &raw).unwrap();
        let tokens: Vec<&str> = dict.brand_tokens.tokens().collect();
        assert_eq!(tokens, vec!["x", "y"]);
        for entry in dict.brand_tokens.iter() {
            assert_eq!(entry.scope, Scope::Client);
            assert!(!entry.is_hard_negative);
            assert_eq!(entry.source, TokenSource::LegacyMigrated);
        }
    }

    #[test]
    fn test_missing_buckets_initialized() {
        let dict = migrate("c1", &json!({})).unwrap();
        assert!(dict.core_tokens.is_empty());
        assert_eq!(dict.intent_tokens.len(), 4);
        assert!(dict.product_line_tokens.is_empty());
        assert_eq!(dict.version, CURRENT_VERSION);
    }

    #[test]
    fn test_mixed_shapes_per_bucket() {
        let raw = json!({
            "negativeTokens": [{"token": "free", "scope": "GLOBAL", "isHardNegative": true}],
            "coreTokens": ["Yarn  Twisting", "yarn twisting"],
            "productLineTokens": { "TFO": ["two for one"] },
            "intentTokens": { "TRANSACTIONAL": ["buy"], "INFORMATIONAL": [{"token": "what is"}] }
        });
        let dict = migrate("c1", &raw).unwrap();

        let free = dict.negative_tokens.get("free").unwrap();
        assert_eq!(free.scope, Scope::Global);
        assert!(free.is_hard_negative);

        assert_eq!(dict.core_tokens.len(), 1);
        assert!(dict.core_tokens.contains("yarn twisting"));
        assert!(dict.product_line_tokens["tfo"].contains("two for one"));
        assert!(dict.intent_tokens[&Intent::Transactional].contains("buy"));
        assert!(dict.intent_tokens[&Intent::Informational].contains("what is"));
        assert!(dict.intent_tokens[&Intent::Directory].is_empty());
    }

    #[test]
    fn test_snake_case_legacy_keys() {
        let raw = json!({ "stop_tokens": ["the"], "product_line_map": { "Twister": "TFO" } });
        let dict = migrate("c1", &raw).unwrap();
        assert!(dict.stop_tokens.contains("the"));
        assert_eq!(dict.product_line_map["twister"], vec!["tfo".to_string()]);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let raw = json!({
            "brandTokens": ["acme"],
            "intentTokens": { "DIRECTORY": ["near me"] },
            "productLineMap": { "twister": ["tfo"] }
        });
        let once = migrate("c1", &raw).unwrap();
        let stored = serde_json::to_value(&once).unwrap();
        assert!(!needs_migration(&stored));
        let twice = migrate("c1", &stored).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unknown_intent_dropped() {
        let raw = json!({ "intentTokens": { "NAVIGATIONAL": ["acme"] } });
        let dict = migrate("c1", &raw).unwrap();
        assert!(dict.intent_tokens.values().all(TokenSet::is_empty));
    }

    #[test]
    fn test_non_object_is_missing() {
        assert!(matches!(
            migrate("c1", &Value::Null),
            Err(DictionaryError::DictionaryMissing(c)) if c == "c1"
        ));
        assert!(matches!(
            migrate("c1", &json!([1, 2])),
            Err(DictionaryError::DictionaryMissing(_))
        ));
    }

    #[test]
    fn test_json_encoded_string_dictionary() {
        let raw = Value::String(r#"{"coreTokens":["pump"]}"#.to_string());
        let dict = migrate("c1", &raw).unwrap();
        assert!(dict.core_tokens.contains("pump"));
    }

    #[test]
    fn test_needs_migration_detection() {
        assert!(needs_migration(&json!({ "version": 2, "coreTokens": ["pump"] })));
        assert!(needs_migration(&json!({ "coreTokens": [] })));
        assert!(!needs_migration(&json!({ "version": 2, "coreTokens": [{"token": "pump"}] })));
    }

    #[test]
    fn test_unreadable_metadata_keeps_tokens() {
        let raw = json!({
            "brandTokens": [
                {"token": "acme", "scope": "client"},
                {"token": "zenith", "isHardNegative": "false"},
                {"token": "orbit", "createdAt": 1700000000},
                "legacy"
            ]
        });
        let dict = migrate("c1", &raw).unwrap();
        let tokens: Vec<&str> = dict.brand_tokens.tokens().collect();
        assert_eq!(tokens, vec!["acme", "legacy", "orbit", "zenith"]);

        let acme = dict.brand_tokens.get("acme").unwrap();
        assert_eq!(acme.scope, Scope::Client);
        assert_eq!(acme.source, TokenSource::LegacyMigrated);
        assert!(!dict.brand_tokens.get("zenith").unwrap().is_hard_negative);
        assert_eq!(dict.brand_tokens.get("orbit").unwrap().created_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_salvage_reads_what_it_can() {
        let raw = json!({
            "negativeTokens": [
                {"token": "free", "scope": "global", "isHardNegative": "TRUE", "source": "harvest"},
                {"scope": "GLOBAL"}
            ]
        });
        let dict = migrate("c1", &raw).unwrap();
        assert_eq!(dict.negative_tokens.len(), 1);
        let free = dict.negative_tokens.get("free").unwrap();
        assert_eq!(free.scope, Scope::Global);
        assert!(free.is_hard_negative);
        assert_eq!(free.source, TokenSource::Harvest);

        assert!(needs_migration(&json!({
            "version": 2,
            "brandTokens": [{"token": "acme", "scope": "client"}]
        })));
    }
}
