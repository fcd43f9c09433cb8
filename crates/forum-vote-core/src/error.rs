// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error types for store ports and client-side vote handling.

use crate::ItemId;

/// Failure reported by a store port.
///
/// Absence is not an error: lookups return `Option`/empty maps for missing rows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or timed out.
    #[error("[STORE_UNAVAILABLE] {0}")]
    Unavailable(String),
    /// The store refused the operation (constraint, permission, malformed input).
    #[error("[STORE_REJECTED] {0}")]
    Rejected(String),
    /// The referenced item does not exist.
    #[error("[STORE_ITEM_NOT_FOUND] {0}")]
    ItemNotFound(ItemId),
}

/// Failure surfaced to the UI layer by vote and feed entry points.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoteError {
    /// No signed-in viewer. Rejected locally, before any store call.
    #[error("[VOTE_SIGN_IN_REQUIRED] sign in to vote")]
    SignInRequired,
    /// The viewer lacks the role required for the operation.
    #[error("[VOTE_FORBIDDEN] {0}")]
    Forbidden(String),
    /// The item has not been loaded into the current view, so its previous
    /// vote is unknown.
    #[error("[VOTE_ITEM_NOT_LOADED] {0}")]
    NotLoaded(ItemId),
    /// A store read failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
