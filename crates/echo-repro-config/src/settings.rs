// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persisted settings for the reproducibility harness (simulator launch + log conventions).

use serde::{Deserialize, Serialize};

/// Logical key under which [`HarnessSettings`] are stored.
pub const SETTINGS_KEY: &str = "repro_harness";

/// Placeholder in [`HarnessSettings::simulator_args`] replaced by the config path.
pub const CONFIG_PLACEHOLDER: &str = "{config}";

/// Placeholder in [`HarnessSettings::simulator_args`] replaced by the log destination.
pub const LOG_PLACEHOLDER: &str = "{log}";

/// Everything the harness needs to know about the simulator and its log format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessSettings {
    /// Simulator executable, resolved relative to `working_dir` when not absolute.
    pub simulator_program: String,
    /// Argument template; see [`CONFIG_PLACEHOLDER`] and [`LOG_PLACEHOLDER`].
    pub simulator_args: Vec<String>,
    /// Working directory the simulator is launched in.
    pub working_dir: String,
    /// Root directory for per-session raw logs and comparison artifacts.
    pub log_root: String,
    /// Top-level record fields stripped before comparison (wall-clock time).
    pub time_fields: Vec<String>,
    /// Substring marking a record that opens a new logical time step.
    pub boundary_marker: String,
    /// Restrict the marker search to this top-level field; `None` searches every string value.
    pub boundary_field: Option<String>,
    /// File name of the canonical artifact for the newer run of a comparison.
    pub artifact_new: String,
    /// File name of the canonical artifact for the older run of a comparison.
    pub artifact_old: String,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            simulator_program: "./timeservice".into(),
            simulator_args: [
                "simulation",
                "-config",
                CONFIG_PLACEHOLDER,
                "-console=false",
                "-logfile",
                LOG_PLACEHOLDER,
            ]
            .map(String::from)
            .to_vec(),
            working_dir: "../../".into(),
            log_root: "logs".into(),
            time_fields: vec!["T".into()],
            boundary_marker: "Handling the next".into(),
            boundary_field: None,
            artifact_new: "result_new.txt".into(),
            artifact_old: "result_old.txt".into(),
        }
    }
}

impl HarnessSettings {
    /// Expand the argument template for one run.
    pub fn expand_args(&self, config: &str, log: &str) -> Vec<String> {
        self.simulator_args
            .iter()
            .map(|arg| {
                arg.replace(CONFIG_PLACEHOLDER, config)
                    .replace(LOG_PLACEHOLDER, log)
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn expand_args_substitutes_both_placeholders() {
        let settings = HarnessSettings::default();
        let args = settings.expand_args("cfg.toml", "/tmp/0.log");
        assert_eq!(
            args,
            [
                "simulation",
                "-config",
                "cfg.toml",
                "-console=false",
                "-logfile",
                "/tmp/0.log"
            ]
        );
    }

    #[test]
    fn partial_blob_fills_defaults() {
        let parsed: HarnessSettings =
            serde_json::from_str(r#"{"boundary_marker": "tick"}"#).unwrap();
        assert_eq!(parsed.boundary_marker, "tick");
        assert_eq!(parsed.time_fields, vec!["T".to_string()]);
        assert_eq!(parsed.log_root, "logs");
    }
}
