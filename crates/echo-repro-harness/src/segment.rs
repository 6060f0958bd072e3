// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Segmentation of a normalized record stream into logical time steps.
//!
//! A boundary record ("Handling the next ...") opens a new step and becomes its
//! header. Every boundary record opens its own segment, including a leading one;
//! records seen before the first boundary form a header-less segment.

use serde_json::Value;

use crate::record::NormalizedRecord;

/// Marker the simulator logs when it advances to the next waiting request.
pub const DEFAULT_BOUNDARY_MARKER: &str = "Handling the next";

/// Predicate recognising boundary records by plain substring search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryMatcher {
    marker: String,
    field: Option<String>,
}

impl Default for BoundaryMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_BOUNDARY_MARKER)
    }
}

impl BoundaryMatcher {
    /// Match `marker` in any string value of the record.
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            field: None,
        }
    }

    /// Only inspect the top-level `field`.
    pub fn in_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// True when `record` opens a new logical time step.
    pub fn is_boundary(&self, record: &NormalizedRecord) -> bool {
        match &self.field {
            Some(field) => record
                .fields()
                .get(field)
                .is_some_and(|v| self.contains_marker(v)),
            None => record.fields().values().any(|v| self.contains_marker(v)),
        }
    }

    fn contains_marker(&self, value: &Value) -> bool {
        match value {
            Value::String(s) => s.contains(self.marker.as_str()),
            Value::Array(items) => items.iter().any(|v| self.contains_marker(v)),
            Value::Object(map) => map.values().any(|v| self.contains_marker(v)),
            _ => false,
        }
    }
}

/// One logical time step: an optional boundary header and its member records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    /// Boundary record that opened the step; `None` for records before any boundary.
    pub header: Option<NormalizedRecord>,
    /// Non-boundary records in emission order.
    pub members: Vec<NormalizedRecord>,
}

impl Segment {
    /// True when the segment holds neither a header nor members.
    pub fn is_empty(&self) -> bool {
        self.header.is_none() && self.members.is_empty()
    }

    /// Header plus members.
    pub fn len(&self) -> usize {
        usize::from(self.header.is_some()) + self.members.len()
    }
}

/// Split `records` into segments. Never fails; empty input yields no segments.
pub fn segment<I>(records: I, matcher: &BoundaryMatcher) -> Vec<Segment>
where
    I: IntoIterator<Item = NormalizedRecord>,
{
    let mut segments = Vec::new();
    let mut current = Segment::default();
    for record in records {
        if matcher.is_boundary(&record) {
            let finished = std::mem::replace(
                &mut current,
                Segment {
                    header: Some(record),
                    members: Vec::new(),
                },
            );
            if !finished.is_empty() {
                segments.push(finished);
            }
        } else {
            current.members.push(record);
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}
