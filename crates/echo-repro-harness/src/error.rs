// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error taxonomy for the reproducibility harness.
//!
//! None of these are recovered locally: every variant aborts the session and is
//! reported to the operator with enough context to triage without re-running.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Errors produced while normalizing, comparing, or orchestrating runs.
#[derive(Debug, Error)]
pub enum ReproError {
    /// A log line is not a JSON object.
    #[error("malformed record in {source_name} at line {line}: {reason}")]
    MalformedRecord {
        /// Identifier of the log the line came from.
        source_name: String,
        /// 1-based physical line number.
        line: usize,
        /// Parser message.
        reason: String,
    },
    /// The two canonical sequences have different lengths.
    #[error(
        "the number of lines differs: {first} has {first_len}, {second} has {second_len}"
    )]
    LengthMismatch {
        /// Identifier of the first run.
        first: String,
        /// Identifier of the second run.
        second: String,
        /// Canonical line count of the first run.
        first_len: usize,
        /// Canonical line count of the second run.
        second_len: usize,
    },
    /// Same length, different content at `index`.
    #[error(
        "the lines at index {index} (step {step}) are not equal\n  {first}: {first_value}\n  {second}: {second_value}"
    )]
    Divergence {
        /// Index into the canonical sequence.
        index: usize,
        /// Ordinal of the segment containing `index` in the first run.
        step: usize,
        /// Identifier of the first run.
        first: String,
        /// Identifier of the second run.
        second: String,
        /// Canonical line of the first run at `index`.
        first_value: String,
        /// Canonical line of the second run at `index`.
        second_value: String,
    },
    /// Filesystem failure on a log or artifact.
    #[error("{context} {}: {source}", path.display())]
    Io {
        /// What was being attempted.
        context: &'static str,
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The simulator could not be launched.
    #[error("failed to launch simulator `{program}` for run {run}: {source}")]
    SimulatorSpawn {
        /// Program that was launched.
        program: String,
        /// Run index.
        run: usize,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The simulator exited unsuccessfully.
    #[error("simulator run {run} failed ({status})")]
    SimulatorExit {
        /// Run index.
        run: usize,
        /// Exit status reported by the OS.
        status: ExitStatus,
    },
    /// The simulator exited cleanly but never wrote its log.
    #[error("simulator run {run} produced no log at {}", path.display())]
    MissingLog {
        /// Run index.
        run: usize,
        /// Expected log path.
        path: PathBuf,
    },
    /// A session was requested with zero runs.
    #[error("at least one run is required")]
    NoRuns,
    /// The session directory name could not be formatted.
    #[error("failed to format session timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

impl ReproError {
    /// Stable short name of the variant, used in repro summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedRecord { .. } => "malformed_record",
            Self::LengthMismatch { .. } => "length_mismatch",
            Self::Divergence { .. } => "divergence",
            Self::Io { .. } => "io",
            Self::SimulatorSpawn { .. } => "simulator_spawn",
            Self::SimulatorExit { .. } => "simulator_exit",
            Self::MissingLog { .. } => "missing_log",
            Self::NoRuns => "no_runs",
            Self::Timestamp(_) => "timestamp",
        }
    }

    pub(crate) fn io(
        context: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the harness.
pub type Result<T, E = ReproError> = std::result::Result<T, E>;
