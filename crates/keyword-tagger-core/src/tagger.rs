//! Keyword classification engine.
//!
//! The tagger compiles a [`MatchingDictionary`] into a token index once per
//! run, then classifies each keyword independently. Classification is a
//! pure function of `(keyword, dictionary)`; repeated runs over the same
//! inputs produce identical assignments.
//!
//! # Algorithm
//!
//! 1. Normalize the keyword and split it into words.
//! 2. Build every n-gram up to the longest stored token (max 4 words),
//!    longest first, then left to right.
//! 3. Evaluate, first match wins:
//!    a. any matched entry flagged hard-negative, in any bucket → EXCLUDED
//!    b. stop tokens cover every word → EXCLUDED; n-grams made only of
//!       stop-covered words are dropped from the remaining stages
//!    c. negative token → EXCLUDED
//!    d. brand token → BRAND
//!    e. product line (`productLineMap`, then `productLineTokens`) → PRODUCT
//!    f. intent, in order TRANSACTIONAL, COMMERCIAL_RESEARCH, INFORMATIONAL,
//!       DIRECTORY; sets `intent` and continues
//!    g. industry → INDUSTRY, core → CORE, adjacent → ADJACENT
//!    h. otherwise UNCLASSIFIED
//!
//! Corpora are tagged in batches by [`tag_corpus`], in parallel via rayon,
//! with a cancellation check between batches.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use crate::bucket::FlatBucket;
use crate::models::{Intent, KeywordRecord, MatchingDictionary, TagAssignment, TagBucket};
use crate::normalize::{ngrams, normalize, NGram};

/// Everything the dictionary says about one token.
#[derive(Debug, Default, Clone)]
struct TokenRules {
    hard_negative: bool,
    stop: bool,
    negative: bool,
    brand: bool,
    industry: bool,
    core: bool,
    adjacent: bool,
    /// From `productLineMap`.
    mapped_lines: Vec<String>,
    /// From `productLineTokens`, in key order.
    bucket_lines: Vec<String>,
    /// In [`Intent::ALL`] order.
    intents: Vec<Intent>,
}

/// The rule that decided an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    HardNegative,
    StopOnly,
    Negative,
    Brand,
    ProductLineMap,
    ProductLineTokens,
    Industry,
    Core,
    Adjacent,
    NoMatch,
}

/// Assignment plus the evidence behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Explanation {
    pub assignment: TagAssignment,
    pub rule: Rule,
    /// Token that triggered `rule`, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_token: Option<String>,
    /// Token that set the intent, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_token: Option<String>,
}

/// Read-only compiled view of a dictionary.
///
/// `Tagger` is `Send + Sync` and holds no references to the source
/// dictionary, so one instance can be shared across worker threads.
#[derive(Debug, Clone)]
pub struct Tagger {
    index: HashMap<String, TokenRules>,
    max_words: usize,
}

impl Tagger {
    pub fn new(dict: &MatchingDictionary) -> Self {
        let mut index: HashMap<String, TokenRules> = HashMap::new();

        for bucket in FlatBucket::ALL {
            for entry in dict.flat(bucket).iter() {
                let rules = index.entry(entry.token.clone()).or_default();
                rules.hard_negative |= entry.is_hard_negative;
                match bucket {
                    FlatBucket::Brand => rules.brand = true,
                    FlatBucket::Negative => rules.negative = true,
                    FlatBucket::Industry => rules.industry = true,
                    FlatBucket::Core => rules.core = true,
                    FlatBucket::Adjacent => rules.adjacent = true,
                    FlatBucket::Stop => rules.stop = true,
                }
            }
        }

        for (line, set) in &dict.product_line_tokens {
            for entry in set.iter() {
                let rules = index.entry(entry.token.clone()).or_default();
                rules.hard_negative |= entry.is_hard_negative;
                rules.bucket_lines.push(line.clone());
            }
        }

        for intent in Intent::ALL {
            if let Some(set) = dict.intent(intent) {
                for entry in set.iter() {
                    let rules = index.entry(entry.token.clone()).or_default();
                    rules.hard_negative |= entry.is_hard_negative;
                    rules.intents.push(intent);
                }
            }
        }

        for (token, lines) in &dict.product_line_map {
            if !lines.is_empty() {
                index.entry(token.clone()).or_default().mapped_lines = lines.clone();
            }
        }

        Self {
            index,
            max_words: dict.max_token_words(),
        }
    }

    /// Number of distinct tokens in the compiled index.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn classify(&self, keyword: &str) -> TagAssignment {
        self.explain(keyword).assignment
    }

    /// Classify and report which rule and token decided the result.
    pub fn explain(&self, keyword: &str) -> Explanation {
        let normalized = normalize(keyword);
        let words: Vec<&str> = if normalized.is_empty() {
            Vec::new()
        } else {
            normalized.split(' ').collect()
        };
        let grams = ngrams(&words, self.max_words);
        let matched: Vec<(&NGram, &TokenRules)> = grams
            .iter()
            .filter_map(|g| self.index.get(&g.text).map(|r| (g, r)))
            .collect();

        let done = |bucket: TagBucket, rule: Rule, token: Option<&str>| Explanation {
            assignment: TagAssignment {
                keyword: keyword.to_string(),
                bucket,
                product_line: None,
                intent: None,
            },
            rule,
            matched_token: token.map(str::to_string),
            intent_token: None,
        };

        if words.is_empty() {
            return done(TagBucket::Unclassified, Rule::NoMatch, None);
        }

        // a. hard negative anywhere
        if let Some((g, _)) = matched.iter().find(|(_, r)| r.hard_negative) {
            return done(TagBucket::Excluded, Rule::HardNegative, Some(g.text.as_str()));
        }

        // b. stop-token coverage
        let mut covered = vec![false; words.len()];
        for (g, _) in matched.iter().filter(|(_, r)| r.stop) {
            covered[g.start..g.start + g.len].iter_mut().for_each(|c| *c = true);
        }
        if covered.iter().all(|c| *c) {
            return done(TagBucket::Excluded, Rule::StopOnly, None);
        }
        let live: Vec<&(&NGram, &TokenRules)> = matched
            .iter()
            .filter(|(g, _)| !covered[g.start..g.start + g.len].iter().all(|c| *c))
            .collect();
        let first = |pred: &dyn Fn(&TokenRules) -> bool| {
            live.iter()
                .find(|(_, r)| pred(*r))
                .map(|(g, r)| (g.text.as_str(), *r))
        };

        // c. negative
        if let Some((token, _)) = first(&|r| r.negative) {
            return done(TagBucket::Excluded, Rule::Negative, Some(token));
        }

        // d. brand
        if let Some((token, _)) = first(&|r| r.brand) {
            return done(TagBucket::Brand, Rule::Brand, Some(token));
        }

        // e. product line: direct map first, then bucket scan
        let product = first(&|r| !r.mapped_lines.is_empty())
            .map(|(t, r)| (t, r.mapped_lines[0].clone(), Rule::ProductLineMap))
            .or_else(|| {
                first(&|r| !r.bucket_lines.is_empty())
                    .map(|(t, r)| (t, r.bucket_lines[0].clone(), Rule::ProductLineTokens))
            });
        if let Some((token, line, rule)) = product {
            let mut out = done(TagBucket::Product, rule, Some(token));
            out.assignment.product_line = Some(line);
            return out;
        }

        // f. intent, in fixed enum order
        let intent = Intent::ALL
            .into_iter()
            .find_map(|i| first(&|r| r.intents.contains(&i)).map(|(t, _)| (i, t)));

        // g. topicality
        let topical = [
            (TagBucket::Industry, Rule::Industry, first(&|r| r.industry)),
            (TagBucket::Core, Rule::Core, first(&|r| r.core)),
            (TagBucket::Adjacent, Rule::Adjacent, first(&|r| r.adjacent)),
        ]
        .into_iter()
        .find_map(|(b, rule, hit)| hit.map(|(t, _)| (b, rule, t)));

        let mut out = match topical {
            Some((bucket, rule, token)) => done(bucket, rule, Some(token)),
            None => done(TagBucket::Unclassified, Rule::NoMatch, None),
        };
        if let Some((intent, token)) = intent {
            out.assignment.intent = Some(intent);
            out.intent_token = Some(token.to_string());
        }
        out
    }
}

/// Classify a single keyword against a dictionary.
///
/// Compiles the dictionary on every call; use [`Tagger`] for batches.
pub fn classify(keyword: &str, dict: &MatchingDictionary) -> TagAssignment {
    Tagger::new(dict).classify(keyword)
}

/// Options for a corpus run.
#[derive(Debug, Clone)]
pub struct TagOptions {
    /// Keywords per batch; cancellation is checked between batches.
    pub batch_size: usize,
    /// Classify each batch on the rayon pool.
    pub parallel: bool,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for TagOptions {
    fn default() -> Self {
        Self {
            batch_size: 5000,
            parallel: true,
            cancel: None,
        }
    }
}

/// Result of a corpus run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagRunOutcome {
    /// One assignment per keyword, sorted by keyword.
    Completed(Vec<TagAssignment>),
    /// Cancelled between batches; partial results were discarded.
    Cancelled { processed: usize, total: usize },
}

fn is_cancelled(cancel: &Option<Arc<AtomicBool>>) -> bool {
    cancel
        .as_ref()
        .map(|flag| flag.load(Ordering::Relaxed))
        .unwrap_or(false)
}

/// Tag a whole corpus.
///
/// `on_batch(processed, total)` is called after each completed batch.
pub fn tag_corpus<F>(
    tagger: &Tagger,
    keywords: &[KeywordRecord],
    opts: &TagOptions,
    mut on_batch: F,
) -> TagRunOutcome
where
    F: FnMut(usize, usize),
{
    let total = keywords.len();
    let batch_size = opts.batch_size.max(1);
    let mut out: Vec<TagAssignment> = Vec::with_capacity(total);

    for batch in keywords.chunks(batch_size) {
        if is_cancelled(&opts.cancel) {
            tracing::info!(processed = out.len(), total, "tagging run cancelled");
            return TagRunOutcome::Cancelled {
                processed: out.len(),
                total,
            };
        }
        if opts.parallel {
            let tagged: Vec<TagAssignment> = batch
                .par_iter()
                .map(|k| tagger.classify(&k.keyword))
                .collect();
            out.extend(tagged);
        } else {
            out.extend(batch.iter().map(|k| tagger.classify(&k.keyword)));
        }
        on_batch(out.len(), total);
    }

    out.sort_by(|a, b| a.keyword.cmp(&b.keyword));
    out.dedup_by(|a, b| a.keyword == b.keyword);
    TagRunOutcome::Completed(out)
}
