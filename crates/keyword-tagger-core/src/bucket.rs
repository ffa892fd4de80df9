//! Bucket identifiers and path resolution.
//!
//! A bucket path is either a flat bucket name (`brandTokens`) or a nested
//! bucket plus key joined by `.` (`productLineTokens.tfo twisting`,
//! `intentTokens.TRANSACTIONAL`). Paths parse into the closed
//! [`BucketPath`] union; resolution against a dictionary never uses
//! dynamic field access.
//!
//! | Path | Result |
//! |------|--------|
//! | `coreTokens` / `core_tokens` | `Flat(Core)` |
//! | `productLineTokens.<key>` | `ProductLine(key)`, created if absent; the key may contain `.` |
//! | `intentTokens.<intent>` | `Intent(..)`, unknown key → `UnknownIntent` |
//! | `productLineTokens`, `intentTokens`, `productLineMap` | `InvalidBucketPath` |
//! | `coreTokens.x`, `coreTokens.x.y`, `.x` | `InvalidBucketPath` |
//! | anything else | `UnknownBucket` |

use std::fmt;
use std::str::FromStr;

use crate::error::{DictionaryError, Result};
use crate::models::{Intent, MatchingDictionary, TokenSet};
use crate::normalize::normalize;

/// Separator between a nested bucket and its key.
pub const PATH_SEPARATOR: char = '.';

/// The six flat buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FlatBucket {
    Brand,
    Negative,
    Industry,
    Core,
    Adjacent,
    Stop,
}

impl FlatBucket {
    pub const ALL: [FlatBucket; 6] = [
        FlatBucket::Brand,
        FlatBucket::Negative,
        FlatBucket::Industry,
        FlatBucket::Core,
        FlatBucket::Adjacent,
        FlatBucket::Stop,
    ];

    /// Field name in the stored dictionary.
    pub fn name(&self) -> &'static str {
        match self {
            FlatBucket::Brand => "brandTokens",
            FlatBucket::Negative => "negativeTokens",
            FlatBucket::Industry => "industryIndicators",
            FlatBucket::Core => "coreTokens",
            FlatBucket::Adjacent => "adjacentTokens",
            FlatBucket::Stop => "stopTokens",
        }
    }

    /// Legacy snake_case field name.
    pub fn legacy_name(&self) -> &'static str {
        match self {
            FlatBucket::Brand => "brand_tokens",
            FlatBucket::Negative => "negative_tokens",
            FlatBucket::Industry => "industry_indicators",
            FlatBucket::Core => "core_tokens",
            FlatBucket::Adjacent => "adjacent_tokens",
            FlatBucket::Stop => "stop_tokens",
        }
    }

    pub fn from_name(name: &str) -> Option<FlatBucket> {
        FlatBucket::ALL
            .into_iter()
            .find(|b| b.name() == name || b.legacy_name() == name)
    }
}

impl fmt::Display for FlatBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Nested (map-valued) buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestedBucket {
    ProductLine,
    Intent,
}

impl NestedBucket {
    pub fn name(&self) -> &'static str {
        match self {
            NestedBucket::ProductLine => "productLineTokens",
            NestedBucket::Intent => "intentTokens",
        }
    }

    pub fn legacy_name(&self) -> &'static str {
        match self {
            NestedBucket::ProductLine => "product_line_tokens",
            NestedBucket::Intent => "intent_tokens",
        }
    }

    pub fn from_name(name: &str) -> Option<NestedBucket> {
        [NestedBucket::ProductLine, NestedBucket::Intent]
            .into_iter()
            .find(|b| b.name() == name || b.legacy_name() == name)
    }
}

/// Names that exist on the dictionary but are not token arrays.
const NON_ARRAY_FIELDS: &[&str] = &["productLineMap", "product_line_map", "version"];

/// A resolved location of a token set inside a [`MatchingDictionary`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BucketPath {
    Flat(FlatBucket),
    /// Normalized product-line key.
    ProductLine(String),
    Intent(Intent),
}

impl BucketPath {
    /// Only the first `.` separates bucket from key, so product-line keys
    /// may themselves contain dots (`productLineTokens.2.5 inch pumps`).
    pub fn parse(path: &str) -> Result<BucketPath> {
        let trimmed = path.trim();
        let Some((parent, key)) = trimmed.split_once(PATH_SEPARATOR) else {
            return if let Some(flat) = FlatBucket::from_name(trimmed) {
                Ok(BucketPath::Flat(flat))
            } else if NestedBucket::from_name(trimmed).is_some()
                || NON_ARRAY_FIELDS.contains(&trimmed)
                || trimmed.is_empty()
            {
                Err(DictionaryError::InvalidBucketPath(path.to_string()))
            } else {
                Err(DictionaryError::UnknownBucket(trimmed.to_string()))
            };
        };
        if parent.is_empty() || key.trim().is_empty() {
            return Err(DictionaryError::InvalidBucketPath(path.to_string()));
        }
        match NestedBucket::from_name(parent) {
            Some(NestedBucket::ProductLine) => Ok(BucketPath::ProductLine(product_line_key(key)?)),
            Some(NestedBucket::Intent) => Ok(BucketPath::Intent(key.parse()?)),
            None if FlatBucket::from_name(parent).is_some()
                || NON_ARRAY_FIELDS.contains(&parent) =>
            {
                Err(DictionaryError::InvalidBucketPath(path.to_string()))
            }
            None => Err(DictionaryError::UnknownBucket(parent.to_string())),
        }
    }
}

impl FromStr for BucketPath {
    type Err = DictionaryError;

    fn from_str(s: &str) -> Result<Self> {
        BucketPath::parse(s)
    }
}

impl fmt::Display for BucketPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketPath::Flat(b) => write!(f, "{}", b.name()),
            BucketPath::ProductLine(key) => {
                write!(f, "{}{}{}", NestedBucket::ProductLine.name(), PATH_SEPARATOR, key)
            }
            BucketPath::Intent(i) => {
                write!(f, "{}{}{}", NestedBucket::Intent.name(), PATH_SEPARATOR, i)
            }
        }
    }
}

/// Normalize a product-line key; empty keys are not addressable.
pub fn product_line_key(raw: &str) -> Result<String> {
    let key = normalize(raw);
    if key.is_empty() {
        return Err(DictionaryError::InvalidBucketPath(format!(
            "{}{}{}",
            NestedBucket::ProductLine.name(),
            PATH_SEPARATOR,
            raw
        )));
    }
    Ok(key)
}

impl MatchingDictionary {
    /// Resolve a path to its token set, creating product-line buckets on
    /// first use.
    pub fn bucket_mut(&mut self, path: &BucketPath) -> &mut TokenSet {
        match path {
            BucketPath::Flat(b) => self.flat_mut(*b),
            BucketPath::ProductLine(key) => {
                self.product_line_tokens.entry(key.clone()).or_default()
            }
            BucketPath::Intent(i) => self.intent_tokens.entry(*i).or_default(),
        }
    }

    /// Read-only resolution; `None` for a product line that does not exist.
    pub fn bucket(&self, path: &BucketPath) -> Option<&TokenSet> {
        match path {
            BucketPath::Flat(b) => Some(self.flat(*b)),
            BucketPath::ProductLine(key) => self.product_line_tokens.get(key),
            BucketPath::Intent(i) => self.intent_tokens.get(i),
        }
    }
}
