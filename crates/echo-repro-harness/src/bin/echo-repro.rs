// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! CLI entry point for the reproducibility harness.

use anyhow::Result;
use echo_repro_harness::cli::entrypoint;

fn main() -> Result<()> {
    entrypoint()
}
