// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Canonical ordering of segments and the flattened per-run sequence.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{ReproError, Result};
use crate::segment::Segment;

/// A segment whose members are sorted by canonical text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalSegment {
    /// Canonical text of the boundary header, if the segment has one.
    pub header: Option<String>,
    /// Canonical member texts in byte order.
    pub members: Vec<String>,
}

/// Sort a segment's members by canonical text; the header stays in front.
pub fn canonicalize(segment: &Segment) -> CanonicalSegment {
    let mut members: Vec<String> = segment.members.iter().map(|r| r.canonical_text()).collect();
    // stable: equal texts are indistinguishable anyway
    members.sort();
    CanonicalSegment {
        header: segment.header.as_ref().map(|r| r.canonical_text()),
        members,
    }
}

/// One line of a canonical sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalLine {
    /// Ordinal of the segment this line belongs to.
    pub step: usize,
    /// True for segment headers.
    pub header: bool,
    /// Canonical record text.
    pub text: String,
}

/// The flattened, order-normalized form of one run's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalSequence {
    source: String,
    steps: usize,
    lines: Vec<CanonicalLine>,
}

impl CanonicalSequence {
    /// Canonicalize and flatten `segments`; `source` identifies the run.
    pub fn from_segments(source: impl Into<String>, segments: &[Segment]) -> Self {
        let mut lines = Vec::with_capacity(segments.iter().map(Segment::len).sum());
        for (step, seg) in segments.iter().enumerate() {
            let canon = canonicalize(seg);
            if let Some(text) = canon.header {
                lines.push(CanonicalLine {
                    step,
                    header: true,
                    text,
                });
            }
            lines.extend(canon.members.into_iter().map(|text| CanonicalLine {
                step,
                header: false,
                text,
            }));
        }
        Self {
            source: source.into(),
            steps: segments.len(),
            lines,
        }
    }

    /// Identifier of the run this sequence came from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of segments.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Number of canonical lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True when the run logged nothing.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// All lines in order.
    pub fn lines(&self) -> &[CanonicalLine] {
        &self.lines
    }

    /// Text of each line in order.
    pub fn texts(&self) -> impl Iterator<Item = &str> + '_ {
        self.lines.iter().map(|l| l.text.as_str())
    }

    /// Hex BLAKE3 digest over the newline-terminated lines.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for text in self.texts() {
            hasher.update(text.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize().as_bytes())
    }

    /// One line per entry, each newline-terminated.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for text in self.texts() {
            out.push_str(text);
            out.push('\n');
        }
        out
    }

    /// Write [`render`](Self::render) output to `path`, replacing any existing file.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let write = || -> std::io::Result<()> {
            let mut w = BufWriter::new(File::create(path)?);
            for text in self.texts() {
                w.write_all(text.as_bytes())?;
                w.write_all(b"\n")?;
            }
            w.flush()
        };
        write().map_err(|e| ReproError::io("failed to write canonical artifact", path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Normalizer;
    use crate::segment::{segment, BoundaryMatcher};

    fn sequence(text: &str) -> CanonicalSequence {
        let recs = Normalizer::default().normalize_log("t", text).unwrap();
        CanonicalSequence::from_segments("t", &segment(recs, &BoundaryMatcher::default()))
    }

    #[test]
    fn members_sorted_header_first() {
        let seq = sequence(concat!(
            "{\"M\":\"Handling the next waiting request\"}\n",
            "{\"M\":\"z\"}\n",
            "{\"M\":\"a\"}\n",
        ));
        let texts: Vec<&str> = seq.texts().collect();
        assert_eq!(
            texts,
            [
                r#"{"M":"Handling the next waiting request"}"#,
                r#"{"M":"a"}"#,
                r#"{"M":"z"}"#
            ]
        );
        assert!(seq.lines()[0].header);
        assert_eq!(seq.steps(), 1);
    }

    #[test]
    fn header_never_sorts_into_members() {
        // "A" sorts before "Handling..." but must stay behind the header
        let seq = sequence(concat!(
            "{\"M\":\"Handling the next\"}\n",
            "{\"M\":\"A\"}\n",
        ));
        assert!(seq.lines()[0].header);
        assert_eq!(seq.lines()[1].text, r#"{"M":"A"}"#);
    }

    #[test]
    fn sorting_happens_only_within_a_step() {
        let seq = sequence(concat!(
            "{\"M\":\"Handling the next\",\"n\":1}\n",
            "{\"M\":\"z\"}\n",
            "{\"M\":\"Handling the next\",\"n\":2}\n",
            "{\"M\":\"a\"}\n",
        ));
        let steps: Vec<usize> = seq.lines().iter().map(|l| l.step).collect();
        assert_eq!(steps, [0, 0, 1, 1]);
        assert_eq!(seq.lines()[1].text, r#"{"M":"z"}"#);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = sequence("{\"M\":\"b\"}\n{\"M\":\"a\"}\n");
        let b = sequence("{\"M\":\"a\"}\n{\"M\":\"b\"}\n");
        let c = sequence("{\"M\":\"a\"}\n{\"M\":\"c\"}\n");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn write_to_matches_render() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.txt");
        let seq = sequence("{\"M\":\"b\",\"T\":9}\n{\"M\":\"a\"}\n");
        seq.write_to(&path).unwrap();
        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert_eq!(on_disk, seq.render());
        assert_eq!(on_disk, "{\"M\":\"a\"}\n{\"M\":\"b\"}\n");
    }
}
