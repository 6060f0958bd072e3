// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Configuration services for the reproducibility harness.
//! Keeps storage adapters thin; settings are plain serde structs.

pub mod config;
pub mod settings;
