// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! JSON file persistence for the CLI's in-memory store.

use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use forum_vote_core::audit::tally;
use forum_vote_core::{
    Direction, Item, ItemId, MemoryBackend, MemorySnapshot, ReplyTally, Timestamp, UserId,
    VoteRecord,
};
use tracing::{debug, info};

/// Load the store at `path`, or an empty store if the file does not exist.
pub fn load(path: &Path) -> Result<MemoryBackend> {
    match fs::read(path) {
        Ok(bytes) => {
            let snapshot: MemorySnapshot = serde_json::from_slice(&bytes)
                .with_context(|| format!("parsing store {}", path.display()))?;
            debug!(
                path = %path.display(),
                items = snapshot.items.len(),
                votes = snapshot.votes.len(),
                "store loaded"
            );
            Ok(MemoryBackend::from_snapshot(snapshot))
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no store file; starting empty");
            Ok(MemoryBackend::new())
        }
        Err(err) => Err(err).with_context(|| format!("reading store {}", path.display())),
    }
}

/// Write the store to `path` as pretty JSON.
pub fn save(path: &Path, backend: &MemoryBackend) -> Result<()> {
    let json = serde_json::to_vec_pretty(&backend.snapshot())?;
    fs::write(path, json).with_context(|| format!("writing store {}", path.display()))?;
    Ok(())
}

const DEMO_EPOCH_MS: i64 = 1_700_000_000_000;

/// A small consistent store: every score equals its rows' tally.
pub fn demo_snapshot() -> MemorySnapshot {
    let questions = [
        ("q-welcome", "General", "Welcome thread", "Introduce yourself here."),
        (
            "q-rust",
            "CS Related",
            "Is Rust worth learning for systems coursework?",
            "Thinking of using it for the OS lab.",
        ),
        (
            "q-pcb",
            "Electronics Related",
            "Cheapest PCB fab for student projects?",
            "",
        ),
        (
            "q-bridge",
            "Civil",
            "Load testing the truss bridge model",
            "What safety factor do people use?",
        ),
        ("q-gears", "Mechanical", "Helical vs spur gears", ""),
    ];
    let votes = [
        ("alice", "q-rust", Direction::Up),
        ("bob", "q-rust", Direction::Up),
        ("carol", "q-pcb", Direction::Down),
        ("alice", "q-bridge", Direction::Up),
    ];

    let votes: Vec<VoteRecord> = votes
        .into_iter()
        .map(|(user, item, direction)| VoteRecord {
            user: UserId::new(user),
            item: ItemId::new(item),
            direction,
        })
        .collect();
    let scores = tally(&votes);
    let items = questions
        .into_iter()
        .zip(0_i64..)
        .map(|((id, channel, title, details), n)| {
            let id = ItemId::new(id);
            Item {
                score: scores.get(&id).copied().unwrap_or(0),
                id,
                title: title.to_owned(),
                details: details.to_owned(),
                channel: channel.to_owned(),
                author: UserId::new("seed"),
                created_at: Timestamp(DEMO_EPOCH_MS + n * 60_000),
            }
        })
        .collect();
    let replies = vec![
        ReplyTally {
            item: ItemId::new("q-bridge"),
            count: 1,
        },
        ReplyTally {
            item: ItemId::new("q-rust"),
            count: 2,
        },
    ];

    MemorySnapshot {
        items,
        votes,
        replies,
    }
}
