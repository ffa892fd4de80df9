//! # Keyword Tagger
//!
//! Per-client matching dictionaries and bulk keyword tagging for search
//! analytics.
//!
//! Each client owns a dictionary of normalized tokens grouped into buckets
//! (brand, negative, product line, intent, industry, core, adjacent, stop).
//! The dictionary grows incrementally from manual additions, AI-suggested
//! sets, and harvested terms; a tagging run classifies the client's whole
//! keyword corpus against it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────┐
//! │ dict add /  │──▶│ DictionaryService │──▶│  SQLite   │
//! │ apply /     │   │ lock → migrate →  │   │ profiles  │
//! │ harvest     │   │ mutate → save     │   │ keywords  │
//! └─────────────┘   └────────┬─────────┘   │ tags      │
//!                            │ snapshot     └────▲─────┘
//!                            ▼                   │
//!                     ┌─────────────┐            │
//!                     │ Tagger +    │── tags ────┘
//!                     │ rayon batch │
//!                     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! kwtag init
//! kwtag profile create acme
//! kwtag dict add acme brandTokens acme
//! kwtag keywords import acme ./keywords.csv
//! kwtag tag acme
//! kwtag stats acme
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite `Store` implementation |
//! | [`service`] | Per-client serialized dictionary service |
//! | [`progress`] | Tagging progress on stderr |
//! | [`stats`] / [`export`] | Tag reporting |

pub mod config;
pub mod db;
pub mod dict_cmd;
pub mod export;
pub mod keywords_cmd;
pub mod logging;
pub mod migrate;
pub mod profile_cmd;
pub mod progress;
pub mod service;
pub mod sqlite_store;
pub mod stats;
pub mod tag_cmd;
