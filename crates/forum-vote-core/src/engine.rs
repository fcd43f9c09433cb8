// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Vote state machine.
//!
//! | previous | requested | next | delta |
//! |----------|-----------|------|-------|
//! | none     | up        | up   | +1    |
//! | none     | down      | down | −1    |
//! | up       | up        | none | −1    |
//! | down     | down      | none | +1    |
//! | up       | down      | down | −2    |
//! | down     | up        | up   | +2    |

use crate::Direction;

/// Shape of a vote transition.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TransitionKind {
    /// No previous vote; a row is created.
    Set,
    /// Same direction requested again; the row is deleted.
    ToggleOff,
    /// Opposite direction requested; the row is overwritten.
    Switch,
}

/// Result of applying a requested action to a previously known vote.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Transition {
    /// Vote before the action.
    pub previous: Option<Direction>,
    /// Vote to store after the action (`None` = delete the row).
    pub next: Option<Direction>,
    /// Signed adjustment for the item's aggregate score.
    pub delta: i64,
}

impl Transition {
    /// Classify the transition.
    pub fn kind(&self) -> TransitionKind {
        match (self.previous, self.next) {
            (None, _) => TransitionKind::Set,
            (Some(_), None) => TransitionKind::ToggleOff,
            (Some(_), Some(_)) => TransitionKind::Switch,
        }
    }
}

/// Compute the next vote and score delta for `requested` given `previous`.
///
/// Total over its domain: three previous states times two requested actions.
/// The delta always equals `weight(next) - weight(previous)`.
pub fn transition(previous: Option<Direction>, requested: Direction) -> Transition {
    let next = match previous {
        Some(current) if current == requested => None,
        _ => Some(requested),
    };
    Transition {
        previous,
        next,
        delta: Direction::weight_of(next) - Direction::weight_of(previous),
    }
}
