// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reproduction bundles emitted when a comparison fails.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReproError, Result};
use crate::pipeline::ArtifactPaths;

/// Everything known about a failed comparison.
#[derive(Debug, Clone, Copy)]
pub struct FailureContext<'a> {
    /// Raw log of the newer run.
    pub new_log: &'a Path,
    /// Raw log of the older run.
    pub old_log: &'a Path,
    /// Canonical artifacts written for the comparison (may be missing).
    pub artifacts: &'a ArtifactPaths,
    /// The error that ended the session.
    pub error: &'a ReproError,
}

/// `summary.json` contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReproSummary {
    /// [`ReproError::kind`] of the failure.
    pub kind: String,
    /// Display form of the failure.
    pub message: String,
    /// Original path of the newer raw log.
    pub new_log: String,
    /// Original path of the older raw log.
    pub old_log: String,
    /// Diverging canonical index, for divergences.
    pub index: Option<usize>,
    /// Segment ordinal of the divergence.
    pub step: Option<usize>,
    /// Canonical lengths `(new, old)`, for length mismatches.
    pub lengths: Option<(usize, usize)>,
}

impl ReproSummary {
    /// Summarize `ctx`.
    pub fn from_failure(ctx: &FailureContext<'_>) -> Self {
        let (index, step, lengths) = match ctx.error {
            ReproError::Divergence { index, step, .. } => (Some(*index), Some(*step), None),
            ReproError::LengthMismatch {
                first_len,
                second_len,
                ..
            } => (None, None, Some((*first_len, *second_len))),
            _ => (None, None, None),
        };
        Self {
            kind: ctx.error.kind().to_owned(),
            message: ctx.error.to_string(),
            new_log: ctx.new_log.display().to_string(),
            old_log: ctx.old_log.display().to_string(),
            index,
            step,
            lengths,
        }
    }
}

/// Copy both logs and artifacts into `out_dir` and describe the failure.
///
/// Layout: `new.log`, `old.log`, `result_new.txt`, `result_old.txt` (when they
/// exist), `diff.txt` (the failure message) and `summary.json`.
pub fn create_repro_bundle(out_dir: &Path, ctx: &FailureContext<'_>) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .map_err(|e| ReproError::io("failed to create repro dir", out_dir, e))?;

    let copies = [
        (ctx.new_log, "new.log"),
        (ctx.old_log, "old.log"),
        (ctx.artifacts.new.as_path(), "result_new.txt"),
        (ctx.artifacts.old.as_path(), "result_old.txt"),
    ];
    for (from, name) in copies {
        if from.exists() {
            fs::copy(from, out_dir.join(name))
                .map_err(|e| ReproError::io("failed to copy into repro bundle", from, e))?;
        }
    }

    let diff = out_dir.join("diff.txt");
    fs::write(&diff, ctx.error.to_string())
        .map_err(|e| ReproError::io("failed to write", &diff, e))?;

    let summary_path = out_dir.join("summary.json");
    let f = File::create(&summary_path)
        .map_err(|e| ReproError::io("failed to create", &summary_path, e))?;
    serde_json::to_writer_pretty(f, &ReproSummary::from_failure(ctx))
        .map_err(|e| ReproError::io("failed to write", &summary_path, e.into()))?;

    Ok(out_dir.to_path_buf())
}
