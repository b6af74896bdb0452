// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for BUZZ IT (config port, server prefs).
//! Keeps the server binary thin and storage-agnostic.

pub mod config;
pub mod prefs;
