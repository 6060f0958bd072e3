// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! File-level pipeline: raw log → normalized records → segments → canonical sequence.

use std::fs;
use std::path::{Path, PathBuf};

use echo_repro_config::settings::HarnessSettings;
use tracing::{debug, info};

use crate::canon::CanonicalSequence;
use crate::compare::{compare, Equivalence};
use crate::error::{ReproError, Result};
use crate::record::Normalizer;
use crate::segment::{segment, BoundaryMatcher};

/// Where the two canonical artifacts of a comparison are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Canonical form of the newer run.
    pub new: PathBuf,
    /// Canonical form of the older run.
    pub old: PathBuf,
}

impl ArtifactPaths {
    /// `result_new.txt` / `result_old.txt` (or the configured names) under `dir`.
    pub fn in_dir(dir: &Path, settings: &HarnessSettings) -> Self {
        Self {
            new: dir.join(&settings.artifact_new),
            old: dir.join(&settings.artifact_old),
        }
    }
}

/// Result of a successful file comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compared {
    /// Comparator verdict.
    pub equivalence: Equivalence,
    /// Fingerprint of the newer run's canonical sequence.
    pub fingerprint: String,
}

/// Normalizer and boundary matcher applied to every log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogPipeline {
    normalizer: Normalizer,
    matcher: BoundaryMatcher,
}

impl LogPipeline {
    /// Build from explicit parts.
    pub fn new(normalizer: Normalizer, matcher: BoundaryMatcher) -> Self {
        Self {
            normalizer,
            matcher,
        }
    }

    /// Build from persisted harness settings.
    pub fn from_settings(settings: &HarnessSettings) -> Self {
        let mut matcher = BoundaryMatcher::new(settings.boundary_marker.clone());
        if let Some(field) = &settings.boundary_field {
            matcher = matcher.in_field(field.clone());
        }
        Self::new(Normalizer::new(settings.time_fields.iter().cloned()), matcher)
    }

    /// Canonicalize raw log text; `source` identifies the run in errors.
    pub fn canonicalize_text(&self, source: &str, text: &str) -> Result<CanonicalSequence> {
        self.canonicalize_bytes(source, text.as_bytes())
    }

    /// Canonicalize undecoded log bytes.
    pub fn canonicalize_bytes(&self, source: &str, bytes: &[u8]) -> Result<CanonicalSequence> {
        let records = self.normalizer.normalize_bytes(source, bytes)?;
        let record_count = records.len();
        let segments = segment(records, &self.matcher);
        debug!(source, records = record_count, segments = segments.len(), "segmented log");
        Ok(CanonicalSequence::from_segments(source, &segments))
    }

    /// Read and canonicalize the raw log at `path`.
    pub fn canonicalize_file(&self, path: &Path) -> Result<CanonicalSequence> {
        let bytes = fs::read(path).map_err(|e| ReproError::io("failed to read log", path, e))?;
        self.canonicalize_bytes(&path.display().to_string(), &bytes)
    }

    /// Canonicalize both logs, persist their artifacts, then compare `new` against `old`.
    pub fn compare_files(
        &self,
        new: &Path,
        old: &Path,
        artifacts: &ArtifactPaths,
    ) -> Result<Compared> {
        let new_seq = self.canonicalize_file(new)?;
        let old_seq = self.canonicalize_file(old)?;
        self.compare_sequences(&new_seq, &old_seq, artifacts)
    }

    /// Persist the artifacts of two canonical sequences, then compare them.
    ///
    /// Artifacts are written before comparing so they are available for offline
    /// diffing when the comparison fails.
    pub fn compare_sequences(
        &self,
        new: &CanonicalSequence,
        old: &CanonicalSequence,
        artifacts: &ArtifactPaths,
    ) -> Result<Compared> {
        for path in [&artifacts.new, &artifacts.old] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .map_err(|e| ReproError::io("failed to create artifact dir", parent, e))?;
            }
        }
        new.write_to(&artifacts.new)?;
        old.write_to(&artifacts.old)?;

        let equivalence = compare(new, old)?;
        let fingerprint = new.fingerprint();
        info!(
            new = new.source(),
            old = old.source(),
            lines = equivalence.lines,
            fingerprint = %fingerprint,
            "runs are logically equivalent"
        );
        Ok(Compared {
            equivalence,
            fingerprint,
        })
    }
}
