//! # Keyword Tagger CLI (`kwtag`)
//!
//! The `kwtag` binary manages client profiles, their matching
//! dictionaries, keyword corpora, and tagging runs.
//!
//! ## Usage
//!
//! ```bash
//! kwtag --config ./config/kwtag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kwtag init` | Create the SQLite database and schema |
//! | `kwtag profile create <client>` | Create a profile with an empty dictionary |
//! | `kwtag dict show <client>` | Print the dictionary as JSON |
//! | `kwtag dict add <client> <path> <token>...` | Add tokens to a bucket |
//! | `kwtag dict apply <client> <file>` | Merge an AI suggestion set |
//! | `kwtag dict harvest <client> <file>` | Upsert curated tokens |
//! | `kwtag keywords import <client> <file>` | Import a keyword corpus |
//! | `kwtag tag <client>` | Re-tag the whole corpus |
//! | `kwtag tags list|status|export <client>` | Inspect stored tags |
//! | `kwtag classify <client> "<keyword>"` | Classify one keyword |
//! | `kwtag stats <client>` | Tag distribution by bucket |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use keyword_tagger::config::{self, Config};
use keyword_tagger::progress::ProgressMode;
use keyword_tagger::{
    dict_cmd, export, keywords_cmd, logging, migrate, profile_cmd, stats, tag_cmd,
};
use keyword_tagger_core::models::{Scope, TagBucket};

/// Keyword Tagger CLI: per-client matching dictionaries and bulk keyword
/// tagging.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/kwtag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "kwtag",
    about = "Keyword Tagger: per-client matching dictionaries and bulk keyword tagging",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kwtag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it against an existing database is safe.
    Init,

    /// Manage client profiles.
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Inspect and edit a client's matching dictionary.
    Dict {
        #[command(subcommand)]
        action: DictAction,
    },

    /// Manage a client's keyword corpus.
    Keywords {
        #[command(subcommand)]
        action: KeywordsAction,
    },

    /// Re-tag a client's whole keyword corpus.
    ///
    /// Replaces all stored tags for the client. Ctrl-C cancels between
    /// batches and keeps the previous tags.
    Tag {
        client: String,

        /// Progress output on stderr: `off`, `human`, or `json`.
        /// Defaults to `human` when stderr is a terminal.
        #[arg(long)]
        progress: Option<ProgressMode>,
    },

    /// Inspect stored tags.
    Tags {
        #[command(subcommand)]
        action: TagsAction,
    },

    /// Classify a single keyword against the current dictionary.
    Classify {
        client: String,
        keyword: String,

        /// Show the deciding rule and matched tokens.
        #[arg(long)]
        explain: bool,
    },

    /// Show tag distribution and dictionary size for a client.
    Stats { client: String },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Create a profile with an empty dictionary (no-op if it exists).
    Create { client: String },
    /// List client codes with a profile.
    List,
}

#[derive(Subcommand)]
enum DictAction {
    /// Print the (migrated) dictionary as JSON.
    Show { client: String },

    /// Add tokens to a bucket.
    ///
    /// Paths: `brandTokens`, `negativeTokens`, `industryIndicators`,
    /// `coreTokens`, `adjacentTokens`, `stopTokens`,
    /// `productLineTokens.<line>`, `intentTokens.<INTENT>`.
    Add {
        client: String,
        path: String,
        #[arg(required = true)]
        tokens: Vec<String>,

        /// Token scope: `client` or `global`.
        #[arg(long, default_value = "client")]
        scope: Scope,

        /// Exclude any keyword containing these tokens.
        #[arg(long)]
        hard_negative: bool,
    },

    /// Merge an AI suggestion set (JSON shaped like the dictionary).
    Apply { client: String, file: PathBuf },

    /// Upsert curated tokens from a JSON array of harvest entries.
    Harvest { client: String, file: PathBuf },

    /// Rewrite a legacy stored dictionary in the current shape.
    Upgrade { client: String },
}

#[derive(Subcommand)]
enum KeywordsAction {
    /// Import keywords, one per line as `keyword[,volume]`.
    Import { client: String, file: PathBuf },
}

#[derive(Subcommand)]
enum TagsAction {
    /// List stored tags.
    List {
        client: String,

        /// Only show one bucket (e.g. `BRAND`).
        #[arg(long)]
        bucket: Option<TagBucket>,
    },
    /// Show the last run and whether tags are stale.
    Status { client: String },
    /// Export tags as JSON.
    Export {
        client: String,

        /// Write to a file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = match config::load_config(&cli.config) {
        Ok(cfg) => cfg,
        // classify is read-only; without a config file use the default database location
        Err(_) if matches!(cli.command, Commands::Classify { .. }) && !cli.config.exists() => {
            Config::minimal()
        }
        Err(e) => return Err(e),
    };
    logging::init(&cfg.logging.filter);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Profile { action } => match action {
            ProfileAction::Create { client } => profile_cmd::run_create(&cfg, &client).await?,
            ProfileAction::List => profile_cmd::run_list(&cfg).await?,
        },
        Commands::Dict { action } => match action {
            DictAction::Show { client } => dict_cmd::run_show(&cfg, &client).await?,
            DictAction::Add {
                client,
                path,
                tokens,
                scope,
                hard_negative,
            } => {
                dict_cmd::run_add(&cfg, &client, &path, &tokens, scope, hard_negative).await?;
            }
            DictAction::Apply { client, file } => {
                dict_cmd::run_apply(&cfg, &client, &file).await?;
            }
            DictAction::Harvest { client, file } => {
                dict_cmd::run_harvest(&cfg, &client, &file).await?;
            }
            DictAction::Upgrade { client } => dict_cmd::run_upgrade(&cfg, &client).await?,
        },
        Commands::Keywords { action } => match action {
            KeywordsAction::Import { client, file } => {
                keywords_cmd::run_import(&cfg, &client, &file).await?;
            }
        },
        Commands::Tag { client, progress } => {
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            tag_cmd::run_tag(&cfg, &client, mode).await?;
        }
        Commands::Tags { action } => match action {
            TagsAction::List { client, bucket } => {
                tag_cmd::run_list(&cfg, &client, bucket).await?;
            }
            TagsAction::Status { client } => tag_cmd::run_status(&cfg, &client).await?,
            TagsAction::Export { client, output } => {
                export::run_export(&cfg, &client, output.as_deref()).await?;
            }
        },
        Commands::Classify {
            client,
            keyword,
            explain,
        } => {
            tag_cmd::run_classify(&cfg, &client, &keyword, explain).await?;
        }
        Commands::Stats { client } => {
            stats::run_stats(&cfg, &client).await?;
        }
    }

    Ok(())
}
