// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Echo reproducibility harness.
//!
//! Runs a discrete-event simulator repeatedly and verifies that every run logs a
//! logically identical event sequence: wall-clock fields are stripped, records are
//! grouped into logical time steps, and each step is sorted into a canonical order
//! before runs are compared line by line.

pub mod canon;
pub mod cli;
pub mod compare;
pub mod error;
pub mod orchestrate;
pub mod pipeline;
pub mod record;
pub mod repro;
pub mod segment;

pub use canon::{canonicalize, CanonicalSegment, CanonicalSequence};
pub use compare::{compare, Equivalence};
pub use error::ReproError;
pub use orchestrate::{Invocation, Orchestrator, ProcessSimulator, Simulator};
pub use pipeline::{ArtifactPaths, LogPipeline};
pub use record::{NormalizedRecord, Normalizer};
pub use segment::{segment, BoundaryMatcher, Segment};
