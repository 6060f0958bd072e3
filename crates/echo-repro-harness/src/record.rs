// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Record normalization: parse one JSON log line and strip non-deterministic fields.

use serde_json::{Map, Value};

use crate::error::{ReproError, Result};

/// Time key written by the simulator's structured logger.
pub const DEFAULT_TIME_FIELD: &str = "T";

/// A log record with its non-deterministic fields removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    line: usize,
    fields: Map<String, Value>,
}

impl NormalizedRecord {
    /// 1-based source line number.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Remaining fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Compact JSON with object keys in byte order at every depth.
    ///
    /// Two records with the same content always produce the same text, whatever
    /// order their fields were written in.
    pub fn canonical_text(&self) -> String {
        let mut out = String::new();
        write_object(&self.fields, &mut out);
        out
    }
}

/// Strips a fixed set of top-level fields from each record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalizer {
    fields: Vec<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new([DEFAULT_TIME_FIELD])
    }
}

impl Normalizer {
    /// Strip the given field names.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Field names that are removed.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Parse `line` and remove the configured fields.
    ///
    /// `source` names the log the line came from and is only used for errors.
    pub fn normalize(&self, source: &str, line_no: usize, line: &str) -> Result<NormalizedRecord> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let malformed = |reason: String| ReproError::MalformedRecord {
            source_name: source.to_owned(),
            line: line_no,
            reason,
        };
        let value: Value = serde_json::from_str(line).map_err(|e| malformed(e.to_string()))?;
        let mut fields = match value {
            Value::Object(fields) => fields,
            other => {
                return Err(malformed(format!(
                    "expected a JSON object, found {}",
                    kind_of(&other)
                )))
            }
        };
        for field in &self.fields {
            fields.remove(field);
        }
        Ok(NormalizedRecord {
            line: line_no,
            fields,
        })
    }

    /// Normalize every line of a raw log, failing on the first malformed one.
    pub fn normalize_log(&self, source: &str, text: &str) -> Result<Vec<NormalizedRecord>> {
        self.normalize_bytes(source, text.as_bytes())
    }

    /// Like [`Self::normalize_log`] for undecoded log bytes.
    ///
    /// Each line is decoded on its own, so invalid UTF-8 is reported as a
    /// malformed record at that line.
    pub fn normalize_bytes(&self, source: &str, bytes: &[u8]) -> Result<Vec<NormalizedRecord>> {
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        let body = bytes.strip_suffix(b"\n").unwrap_or(bytes);
        body.split(|&b| b == b'\n')
            .enumerate()
            .map(|(idx, raw)| {
                let line = std::str::from_utf8(raw).map_err(|e| ReproError::MalformedRecord {
                    source_name: source.to_owned(),
                    line: idx + 1,
                    reason: format!("invalid UTF-8: {e}"),
                })?;
                self.normalize(source, idx + 1, line)
            })
            .collect()
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => write_object(map, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        // scalars already serialize deterministically
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_object(map: &Map<String, Value>, out: &mut String) {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
    out.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::String(key.clone()).to_string());
        out.push(':');
        write_value(value, out);
    }
    out.push('}');
}
