//! # Keyword Tagger Core
//!
//! Shared logic for Keyword Tagger: token normalization, the per-client
//! matching dictionary, legacy migration, bucket paths, mutators, the
//! classification engine, and the store abstraction.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! runtime-specific dependencies. Persistence is reached through the
//! [`store::Store`] trait; the `keyword-tagger` crate provides the SQLite
//! implementation.

pub mod bucket;
pub mod error;
pub mod migrate;
pub mod models;
pub mod mutate;
pub mod normalize;
pub mod store;
pub mod tagger;

pub use error::{DictionaryError, Result};
pub use models::{
    ClientAIProfile, Intent, KeywordRecord, MatchingDictionary, Scope, TagAssignment, TagBucket,
    TagRun, TokenEntry, TokenSet, TokenSource,
};
pub use tagger::{classify, Tagger};
