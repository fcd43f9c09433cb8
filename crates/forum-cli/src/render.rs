// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Table output.

use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use forum_vote_core::audit::Drift;
use forum_vote_core::{Direction, Feed, FeedEntry};

/// Short label for the viewer's vote.
pub fn vote_label(vote: Option<Direction>) -> &'static str {
    match vote {
        Some(Direction::Up) => "up",
        Some(Direction::Down) => "down",
        None => "-",
    }
}

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(header.to_vec());
    table
}

/// One row per feed entry, in feed order.
pub fn feed_table(feed: &Feed) -> Table {
    let mut out = table(&["ID", "SCORE", "VOTE", "REPLIES", "CHANNEL", "TITLE"]);
    for entry in &feed.entries {
        out.add_row(vec![
            entry.item.id.to_string(),
            entry.item.score.to_string(),
            vote_label(entry.my_vote).to_owned(),
            entry.reply_count.to_string(),
            entry.item.channel.clone(),
            entry.item.title.clone(),
        ]);
    }
    out
}

/// Field/value listing for a single question.
pub fn detail_table(entry: &FeedEntry) -> Table {
    let mut out = table(&["FIELD", "VALUE"]);
    let item = &entry.item;
    out.add_row(vec!["id".to_owned(), item.id.to_string()]);
    out.add_row(vec!["title".to_owned(), item.title.clone()]);
    out.add_row(vec!["channel".to_owned(), item.channel.clone()]);
    out.add_row(vec!["author".to_owned(), item.author.to_string()]);
    out.add_row(vec!["created_at".to_owned(), item.created_at.0.to_string()]);
    out.add_row(vec!["score".to_owned(), item.score.to_string()]);
    out.add_row(vec!["my_vote".to_owned(), vote_label(entry.my_vote).to_owned()]);
    out.add_row(vec!["replies".to_owned(), entry.reply_count.to_string()]);
    if !item.details.is_empty() {
        out.add_row(vec!["details".to_owned(), item.details.clone()]);
    }
    out
}

/// One row per drifted item.
pub fn drift_table(drift: &[Drift]) -> Table {
    let mut out = table(&["ID", "STORED", "EXPECTED", "CORRECTION"]);
    for d in drift {
        out.add_row(vec![
            d.item.to_string(),
            d.stored.to_string(),
            d.expected.to_string(),
            format!("{:+}", d.correction()),
        ]);
    }
    out
}
