// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Campus forum developer CLI.
//!
//! Drives [`VoteClient`] against a JSON-backed [`MemoryBackend`]: seed a store,
//! browse the feed, cast votes, and audit or repair score drift.

mod render;
mod store;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use forum_app_core::config::ConfigService;
use forum_app_core::prefs::{FeedPrefs, FEED_PREFS_KEY};
use forum_config_fs::FsConfigStore;
use forum_vote_client::{PersistStatus, VoteClient};
use forum_vote_core::audit::{find_drift, repair};
use forum_vote_core::{
    Direction, FeedQuery, ItemId, MemoryBackend, SortKey, Viewer, ALL_CHANNELS,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Campus forum developer CLI: seed, browse, vote, audit")]
struct Args {
    /// JSON store file
    #[arg(long, global = true, default_value = "forum-store.json")]
    store: PathBuf,
    /// Act as this signed-in user
    #[arg(long = "as", global = true, value_name = "USER")]
    user: Option<String>,
    /// Give the acting user the admin role
    #[arg(long, global = true)]
    admin: bool,
    /// Preferences directory (defaults to the platform config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a small demo store
    Seed {
        /// Overwrite an existing store file
        #[arg(long)]
        force: bool,
    },
    /// List questions
    Feed {
        /// Channel to show ("All" for every channel)
        #[arg(long)]
        channel: Option<String>,
        /// `new` or `top`
        #[arg(long)]
        sort: Option<SortKey>,
        /// Case-insensitive title/details filter
        #[arg(long)]
        search: Option<String>,
        /// Save channel and sort as the new defaults
        #[arg(long)]
        remember: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one question
    Show {
        /// Question id
        id: String,
    },
    /// Vote on a question; repeating the same vote removes it
    Vote {
        /// Question id
        id: String,
        /// `up` or `down`
        direction: Direction,
    },
    /// Delete a question with its votes and replies (admin only)
    Delete {
        /// Question id
        id: String,
    },
    /// Report questions whose score disagrees with their vote rows
    Audit {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Apply compensating deltas to every drifted score
    Repair,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    run(Args::parse()).await
}

async fn run(args: Args) -> Result<()> {
    let config = config_service(args.config_dir.as_deref());
    let prefs = load_prefs(config.as_ref());
    let viewer = viewer(args.user.as_deref(), args.admin)?;
    let path = args.store.as_path();
    let mut out = io::stdout();

    match args.cmd {
        Command::Seed { force } => {
            if path.exists() && !force {
                bail!("{} already exists (pass --force to overwrite)", path.display());
            }
            let backend = MemoryBackend::from_snapshot(store::demo_snapshot());
            store::save(path, &backend)?;
            writeln!(out, "seeded {} questions into {}", backend.len(), path.display())?;
        }
        Command::Feed {
            channel,
            sort,
            search,
            remember,
            json,
        } => {
            let mut query = prefs.query();
            if let Some(channel) = channel {
                query = query.in_channel(channel);
            }
            if let Some(sort) = sort {
                query.sort = sort;
            }
            if let Some(search) = search {
                query = query.matching(search);
            }

            let backend = Arc::new(store::load(path)?);
            let client = open_client(&backend, viewer, &prefs);
            let feed = client.load_feed(&query).await?;

            if remember {
                remember_query(config.as_ref(), &prefs, &query)?;
            }
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&feed)?)?;
            } else if feed.entries.is_empty() {
                writeln!(out, "no questions")?;
            } else {
                writeln!(out, "{}", render::feed_table(&feed))?;
            }
        }
        Command::Show { id } => {
            let backend = Arc::new(store::load(path)?);
            let client = open_client(&backend, viewer, &prefs);
            let item = ItemId::new(id);
            let Some(entry) = client.load_item(&item).await? else {
                bail!("no question with id {item}");
            };
            writeln!(out, "{}", render::detail_table(&entry))?;
        }
        Command::Vote { id, direction } => {
            let backend = Arc::new(store::load(path)?);
            let client = open_client(&backend, viewer, &prefs);
            let item = ItemId::new(id);
            if client.load_item(&item).await?.is_none() {
                bail!("no question with id {item}");
            }

            let mut outcome = client.cast_vote(&item, direction)?;
            let status = outcome.persistence.settled().await;
            store::save(path, &backend)?;
            if let PersistStatus::Failed(failure) = status {
                bail!("vote on {item} not saved: {failure:?}");
            }
            writeln!(
                out,
                "{item}: {} (score {})",
                render::vote_label(outcome.direction()),
                outcome.score
            )?;
        }
        Command::Delete { id } => {
            let backend = Arc::new(store::load(path)?);
            let client = open_client(&backend, viewer, &prefs);
            let item = ItemId::new(id);
            let existed = client.delete_item(&item).await?;
            store::save(path, &backend)?;
            if existed {
                writeln!(out, "deleted {item}")?;
            } else {
                writeln!(out, "{item} was already gone")?;
            }
        }
        Command::Audit { json } => {
            let snapshot = store::load(path)?.snapshot();
            let drift = find_drift(&snapshot.items, &snapshot.votes);
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&drift)?)?;
            } else if drift.is_empty() {
                writeln!(out, "no drift")?;
            } else {
                writeln!(out, "{}", render::drift_table(&drift))?;
            }
        }
        Command::Repair => {
            let backend = store::load(path)?;
            let snapshot = backend.snapshot();
            let drift = find_drift(&snapshot.items, &snapshot.votes);
            let fixed = repair(&backend, &drift).await?;
            store::save(path, &backend)?;
            writeln!(out, "repaired {fixed} question(s)")?;
        }
    }
    Ok(())
}

fn viewer(user: Option<&str>, admin: bool) -> Result<Option<Viewer>> {
    Ok(match (user, admin) {
        (Some(user), true) => Some(Viewer::admin(user)),
        (Some(user), false) => Some(Viewer::member(user)),
        (None, true) => bail!("--admin requires --as <USER>"),
        (None, false) => None,
    })
}

fn open_client(
    backend: &Arc<MemoryBackend>,
    viewer: Option<Viewer>,
    prefs: &FeedPrefs,
) -> VoteClient<MemoryBackend> {
    let client = VoteClient::with_prefs(Arc::clone(backend), prefs);
    if let Some(viewer) = viewer {
        client.begin_session(viewer);
    }
    client
}

// Config (best-effort): a missing or unwritable config dir falls back to defaults.
fn config_service(dir: Option<&Path>) -> Option<ConfigService<FsConfigStore>> {
    let store = match dir {
        Some(dir) => FsConfigStore::with_base(dir),
        None => FsConfigStore::new(),
    };
    store
        .map(ConfigService::new)
        .map_err(|err| warn!(%err, "preferences unavailable; using defaults"))
        .ok()
}

fn load_prefs(config: Option<&ConfigService<FsConfigStore>>) -> FeedPrefs {
    config
        .and_then(|c| {
            c.load_or_init::<FeedPrefs>(FEED_PREFS_KEY)
                .map_err(|err| warn!(%err, "could not read feed preferences"))
                .ok()
        })
        .unwrap_or_default()
}

fn remember_query(
    config: Option<&ConfigService<FsConfigStore>>,
    prefs: &FeedPrefs,
    query: &FeedQuery,
) -> Result<()> {
    let Some(config) = config else {
        warn!("no preferences directory; feed defaults not saved");
        return Ok(());
    };
    let updated = FeedPrefs {
        channel: query.channel_filter().unwrap_or(ALL_CHANNELS).to_owned(),
        sort: query.sort,
        ..prefs.clone()
    };
    config.save(FEED_PREFS_KEY, &updated)?;
    info!(channel = %updated.channel, sort = ?updated.sort, "feed defaults saved");
    Ok(())
}
