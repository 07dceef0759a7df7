//! Trawl command line.
//!
//! Index a directory tree, then search it.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use trawl::indexer::{BackgroundIndexer, IndexProgress};
use trawl::observability::init_tracing;
use trawl::query::{
    load_scopes, regex_filter, resolve_time_field, save_scopes, scope_filters, search,
    SearchHit, SearchRequest, TimeField, DEFAULT_TOP_K,
};
use trawl::storage::{counts_for_root, open_store, Database, PathScope};
use trawl::Config;

/// Incremental full-text index over a local directory tree
#[derive(Parser, Debug)]
#[command(name = "trawl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data directory for the `SQLite` store
    #[arg(short, long, env = "TRAWL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TRAWL_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "TRAWL_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index a directory tree
    Index {
        /// Root directory
        root: PathBuf,

        /// Remove stored files that no longer exist under the root
        #[arg(long, env = "TRAWL_PRUNE")]
        prune: bool,

        /// Files committed per batch
        #[arg(long, env = "TRAWL_BATCH_SIZE", default_value = "200")]
        batch_size: usize,

        /// Bytes read from each text file
        #[arg(long, env = "TRAWL_MAX_READ_BYTES", default_value = "200000")]
        max_read_bytes: u64,

        /// Days before an index pass is redone (0 = never)
        #[arg(long, env = "TRAWL_REINDEX_DAYS", default_value = "30")]
        reindex_days: u32,

        /// Days before a content digest is recomputed (0 = always)
        #[arg(long, env = "TRAWL_VERIFY_HASH_DAYS", default_value = "7")]
        verify_hash_days: u32,

        /// Hash large files in full instead of sampling them
        #[arg(long, env = "TRAWL_FULL_HASH")]
        full_hash: bool,

        /// Extra directory substrings to skip, in addition to the defaults
        #[arg(short, long, value_delimiter = ',')]
        exclude: Vec<String>,
    },

    /// Search the index
    Search {
        /// Query text; empty or `*` lists recent files
        #[arg(default_value = "")]
        query: String,

        /// Maximum ranked candidates
        #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,

        /// Restrict to these directories (defaults to saved scopes)
        #[arg(short, long)]
        scope: Vec<PathBuf>,

        /// Only files changed (or created, with --created) on or after this
        /// date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        since: Option<String>,

        /// Use creation time instead of modification time
        #[arg(long)]
        created: bool,

        /// Keep only results whose text matches this pattern
        #[arg(long)]
        regex: Option<String>,

        /// Apply --regex to every candidate chunk, not only the best per file
        #[arg(long, requires = "regex")]
        any_chunk: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show counts for a directory
    Stats {
        /// Root directory
        root: PathBuf,
    },

    /// Manage saved search scopes
    Scopes {
        #[command(subcommand)]
        action: ScopeAction,
    },
}

#[derive(Subcommand, Debug)]
enum ScopeAction {
    /// List saved scopes
    List,
    /// Add a directory
    Add { dir: PathBuf },
    /// Remove a directory
    Remove { dir: PathBuf },
    /// Remove all scopes
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.log_json)?;

    let mut config = Config {
        log_level: cli.log_level,
        log_json: cli.log_json,
        ..Config::default()
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    if let Command::Index {
        prune,
        batch_size,
        max_read_bytes,
        reindex_days,
        verify_hash_days,
        full_hash,
        exclude,
        ..
    } = &cli.command
    {
        config.prune_missing = *prune;
        config.batch_size = *batch_size;
        config.max_read_bytes = *max_read_bytes;
        config.reindex_days = *reindex_days;
        config.verify_hash_days = *verify_hash_days;
        config.force_full_hash_on_large = *full_hash;
        config.excludes.extend(exclude.iter().cloned());
    }

    config.validate()?;
    tracing::debug!(?config, "Configuration loaded");

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data directory {}", config.data_dir.display()))?;

    match cli.command {
        Command::Index { root, .. } => run_index(&config, &root).await,
        Command::Search {
            query,
            top_k,
            scope,
            since,
            created,
            regex,
            any_chunk,
            json,
        } => {
            let db = open_store(config.database_path())?;
            let scopes = if scope.is_empty() {
                db.with_conn(scope_filters)?
            } else {
                scope.iter().map(PathScope::new).collect()
            };

            let requested = if created {
                TimeField::Created
            } else {
                TimeField::Modified
            };
            let probe = scope.first().map_or(config.data_dir.as_path(), PathBuf::as_path);
            let resolved = resolve_time_field(requested, probe);
            if resolved.degraded {
                eprintln!("creation time unavailable here, filtering by modification time");
            }

            let mut request = SearchRequest::new(query)
                .with_top_k(top_k)
                .with_scopes(scopes)
                .with_time_field(resolved.field);
            if let Some(since) = since.as_deref() {
                request = request.since(parse_since(since)?, resolved.field);
            }
            if any_chunk {
                if let Some(pattern) = &regex {
                    request = request.with_pattern(pattern.clone());
                }
            }

            let mut hits = db.with_conn(|conn| search(conn, &request))?;
            if let (Some(pattern), false) = (&regex, any_chunk) {
                hits = regex_filter(hits, pattern)?;
            }

            print_hits(&hits, json)
        }
        Command::Stats { root } => {
            let db = open_store(config.database_path())?;
            let root = root.canonicalize().unwrap_or(root);
            let counts = db.with_conn(|conn| counts_for_root(conn, &PathScope::new(&root)))?;

            println!("root:            {}", root.display());
            println!("files:           {}", counts.files_total);
            println!("files with text: {}", counts.files_with_text);
            println!("chunks:          {}", counts.chunks_total);
            println!(
                "last indexed:    {}",
                counts
                    .last_indexed_at
                    .map_or_else(|| "never".to_string(), format_timestamp)
            );
            Ok(())
        }
        Command::Scopes { action } => {
            let db = open_store(config.database_path())?;
            manage_scopes(&db, action)
        }
    }
}

async fn run_index(config: &Config, root: &Path) -> anyhow::Result<()> {
    let runner = BackgroundIndexer::new(config.database_path(), config.index_options());
    runner.start(root, |p: &IndexProgress| {
        if !p.done {
            eprintln!(
                "{} seen, {} indexed, {} chunks, {} failed ({:.1}s)",
                p.files_seen, p.files_indexed, p.chunks_written, p.files_failed, p.elapsed_secs
            );
        }
    })?;

    let cancel_on_signal = runner.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("cancelling, committing current batch...");
            cancel_on_signal.cancel();
        }
    });

    let Some(summary) = runner.wait().await? else {
        bail!("index run did not start");
    };

    println!(
        "{} files seen, {} indexed, {} chunks written, {} hashed, {} failed, {} pruned{}",
        summary.files_seen,
        summary.files_indexed,
        summary.chunks_written,
        summary.files_hashed,
        summary.files_failed,
        summary.files_pruned,
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    Ok(())
}

fn manage_scopes(db: &Database, action: ScopeAction) -> anyhow::Result<()> {
    let mut scopes = db.with_conn(load_scopes)?;

    match action {
        ScopeAction::List => {
            for dir in &scopes {
                println!("{dir}");
            }
            return Ok(());
        }
        ScopeAction::Add { dir } => {
            let dir = absolute(&dir)?;
            if !scopes.contains(&dir) {
                scopes.push(dir);
            }
        }
        ScopeAction::Remove { dir } => {
            let dir = absolute(&dir)?;
            scopes.retain(|s| *s != dir);
        }
        ScopeAction::Clear => scopes.clear(),
    }

    db.with_conn(|conn| save_scopes(conn, &scopes))?;
    Ok(())
}

fn absolute(dir: &Path) -> anyhow::Result<String> {
    let path = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir()
            .context("resolving current directory")?
            .join(dir)
    };
    Ok(path.canonicalize().unwrap_or(path).to_string_lossy().into_owned())
}

fn parse_since(raw: &str) -> anyhow::Result<i64> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc().timestamp());
        }
    }

    let parsed = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("invalid --since value '{raw}', expected YYYY-MM-DD or RFC 3339"))?;
    Ok(parsed.timestamp())
}

fn format_timestamp(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map_or_else(|| ts.to_string(), |dt| dt.to_rfc3339())
}

fn print_hits(hits: &[SearchHit], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(hits)?);
        return Ok(());
    }

    for hit in hits {
        let preview: String = hit.text.chars().take(120).collect();
        println!("{}  [chunk {}]  {preview}", hit.path, hit.ordinal);
    }
    eprintln!("{} results", hits.len());
    Ok(())
}
