// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for the forum crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`backend`] - Fault-injecting wrapper around `MemoryBackend`
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`fixtures`] - Item builders and seeded stores

pub mod backend;
pub mod config;
pub mod fixtures;

// Re-export commonly used items at crate root for convenience
pub use backend::FaultyBackend;
pub use config::InMemoryConfigStore;
pub use fixtures::{seeded_backend, ItemBuilder};
