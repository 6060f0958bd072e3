// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Element-wise comparison of two canonical sequences.

use crate::canon::CanonicalSequence;
use crate::error::{ReproError, Result};

/// Proof that two runs are logically equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Equivalence {
    /// Number of canonical lines compared.
    pub lines: usize,
}

/// Assert `first` and `second` are identical line for line.
///
/// Lengths are checked before content, so a run with an extra record always
/// reports [`ReproError::LengthMismatch`] even if an earlier line also differs.
pub fn compare(first: &CanonicalSequence, second: &CanonicalSequence) -> Result<Equivalence> {
    if first.len() != second.len() {
        return Err(ReproError::LengthMismatch {
            first: first.source().to_owned(),
            second: second.source().to_owned(),
            first_len: first.len(),
            second_len: second.len(),
        });
    }
    let diverged = first
        .lines()
        .iter()
        .zip(second.lines())
        .enumerate()
        .find(|(_, (a, b))| a.text != b.text);
    if let Some((index, (a, b))) = diverged {
        return Err(ReproError::Divergence {
            index,
            step: a.step,
            first: first.source().to_owned(),
            second: second.source().to_owned(),
            first_value: a.text.clone(),
            second_value: b.text.clone(),
        });
    }
    Ok(Equivalence { lines: first.len() })
}
