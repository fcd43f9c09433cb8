// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for the forum client (config, prefs, notices).
//! Keeps UI adapters thin and framework-agnostic.

pub mod config;
pub mod notice;
pub mod prefs;
