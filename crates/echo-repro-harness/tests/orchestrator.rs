// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Session orchestration against scripted simulators.

use std::cell::Cell;
use std::fs;
use std::path::Path;

use anyhow::Result;
use echo_repro_config::settings::HarnessSettings;
use echo_repro_harness::error::Result as ReproResult;
use echo_repro_harness::{Invocation, Orchestrator, ReproError, Simulator};

const STEP: &str = r#"{"T":"{t}","M":"Handling the next waiting request"}"#;

/// Writes `logs[run]` (the last entry repeats), with `{t}` replaced by the run index.
struct Scripted {
    logs: Vec<Vec<&'static str>>,
    calls: Cell<usize>,
}

impl Scripted {
    fn new(logs: Vec<Vec<&'static str>>) -> Self {
        Self {
            logs,
            calls: Cell::new(0),
        }
    }
}

impl Simulator for Scripted {
    fn run(&self, invocation: &Invocation) -> ReproResult<()> {
        self.calls.set(self.calls.get() + 1);
        let lines = &self.logs[invocation.run.min(self.logs.len() - 1)];
        let mut text = String::new();
        for line in lines {
            text.push_str(&line.replace("{t}", &invocation.run.to_string()));
            text.push('\n');
        }
        fs::write(&invocation.log, text).map_err(|source| ReproError::Io {
            context: "scripted write",
            path: invocation.log.clone(),
            source,
        })
    }
}

fn settings_in(root: &Path) -> HarnessSettings {
    HarnessSettings {
        log_root: root.display().to_string(),
        ..HarnessSettings::default()
    }
}

const BASE: &[&str] = &[
    r#"{"T":"{t}","M":"Starting simulation"}"#,
    STEP,
    r#"{"T":"{t}","M":"a"}"#,
    r#"{"T":"{t}","M":"b"}"#,
    STEP,
    r#"{"T":"{t}","M":"c"}"#,
];

const SHUFFLED: &[&str] = &[
    r#"{"M":"Starting simulation","T":"{t}"}"#,
    STEP,
    r#"{"T":"{t}","M":"b"}"#,
    r#"{"T":"{t}","M":"a"}"#,
    STEP,
    r#"{"T":"{t}","M":"c"}"#,
];

const DIVERGENT: &[&str] = &[
    r#"{"T":"{t}","M":"Starting simulation"}"#,
    STEP,
    r#"{"T":"{t}","M":"a"}"#,
    STEP,
    r#"{"T":"{t}","M":"b"}"#,
    r#"{"T":"{t}","M":"c"}"#,
];

#[test]
fn equivalent_runs_complete_the_session() -> Result<()> {
    let root = tempfile::tempdir()?;
    let settings = settings_in(root.path());
    let sim = Scripted::new(vec![
        BASE.to_vec(),
        SHUFFLED.to_vec(),
        BASE.to_vec(),
        SHUFFLED.to_vec(),
    ]);
    let orchestrator = Orchestrator::new(sim, &settings, "cfg.toml");

    let report = orchestrator.run(4)?;

    assert_eq!(report.runs, 4);
    assert_eq!(report.comparisons, 3);
    assert_eq!(report.fingerprints.len(), 4);
    assert!(report.fingerprints.windows(2).all(|w| w[0] == w[1]));
    assert!(report.session_dir.is_absolute());
    assert!(report.session_dir.starts_with(std::path::absolute(root.path())?));
    for run in 0..4 {
        assert!(report.session_dir.join(format!("{run}.log")).is_file());
    }
    let new = fs::read_to_string(root.path().join("result_new.txt"))?;
    let old = fs::read_to_string(root.path().join("result_old.txt"))?;
    assert_eq!(new, old);
    assert!(!new.contains("\"T\""));
    Ok(())
}

#[test]
fn single_run_needs_no_comparison() -> Result<()> {
    let root = tempfile::tempdir()?;
    let sim = Scripted::new(vec![BASE.to_vec()]);
    let orchestrator = Orchestrator::new(sim, &settings_in(root.path()), "cfg.toml")
        .with_session_dir(root.path().join("only"));
    let report = orchestrator.run(1)?;
    assert_eq!(report.comparisons, 0);
    assert!(!root.path().join("result_new.txt").exists());
    Ok(())
}

#[test]
fn zero_runs_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let sim = Scripted::new(vec![BASE.to_vec()]);
    let orchestrator = Orchestrator::new(sim, &settings_in(root.path()), "c");
    assert!(matches!(orchestrator.run(0), Err(ReproError::NoRuns)));
}

#[test]
fn divergent_run_halts_session_and_emits_bundle() -> Result<()> {
    let root = tempfile::tempdir()?;
    let repro = root.path().join("repro");
    let sim = Scripted::new(vec![BASE.to_vec(), SHUFFLED.to_vec(), DIVERGENT.to_vec()]);
    let orchestrator = Orchestrator::new(&sim, &settings_in(root.path()), "cfg.toml")
        .with_session_dir(root.path().join("session"))
        .with_repro_dir(&repro);

    let err = orchestrator.run(10).unwrap_err();

    match &err {
        ReproError::Divergence {
            index,
            step,
            first,
            second,
            ..
        } => {
            // [setup] [STEP a b] [STEP c] vs [setup] [STEP a] [STEP b c]
            assert_eq!(*index, 3);
            assert_eq!(*step, 2);
            assert!(first.ends_with("2.log"));
            assert!(second.ends_with("1.log"));
        }
        other => panic!("expected divergence, got {other}"),
    }
    // halted at run 2: run 3 never happened
    assert_eq!(sim.calls.get(), 3);
    assert!(!root.path().join("session/3.log").exists());
    assert!(repro.join("diff.txt").is_file());
    assert!(repro.join("summary.json").is_file());
    assert!(repro.join("result_new.txt").is_file());
    Ok(())
}

/// Writes its own log, then overwrites the previous run's log with garbage.
struct Clobbering(Scripted);

impl Simulator for Clobbering {
    fn run(&self, invocation: &Invocation) -> ReproResult<()> {
        self.0.run(invocation)?;
        if let Some(prev) = invocation.run.checked_sub(1) {
            let old = invocation.log.with_file_name(format!("{prev}.log"));
            fs::write(&old, "not json\n").map_err(|source| ReproError::Io {
                context: "clobber",
                path: old.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

#[test]
fn previous_run_is_compared_from_its_first_canonicalization() -> Result<()> {
    let root = tempfile::tempdir()?;
    let sim = Clobbering(Scripted::new(vec![BASE.to_vec(), SHUFFLED.to_vec()]));
    let orchestrator = Orchestrator::new(&sim, &settings_in(root.path()), "cfg.toml")
        .with_session_dir(root.path().join("session"));

    let report = orchestrator.run(4)?;

    assert_eq!(report.comparisons, 3);
    assert_eq!(sim.0.calls.get(), 4);
    assert_eq!(
        fs::read_to_string(root.path().join("session/2.log"))?,
        "not json\n"
    );
    let new = fs::read_to_string(root.path().join("result_new.txt"))?;
    assert_eq!(new, fs::read_to_string(root.path().join("result_old.txt"))?);
    Ok(())
}

struct Silent;

impl Simulator for Silent {
    fn run(&self, _invocation: &Invocation) -> ReproResult<()> {
        Ok(())
    }
}

#[test]
fn run_without_log_is_fatal() {
    let root = tempfile::tempdir().unwrap();
    let err = Orchestrator::new(Silent, &settings_in(root.path()), "c")
        .run(3)
        .unwrap_err();
    assert!(matches!(err, ReproError::MissingLog { run: 0, .. }));
}

struct Crashing;

impl Simulator for Crashing {
    fn run(&self, invocation: &Invocation) -> ReproResult<()> {
        Err(ReproError::SimulatorSpawn {
            program: "sim".into(),
            run: invocation.run,
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })
    }
}

#[test]
fn simulator_failure_propagates() {
    let root = tempfile::tempdir().unwrap();
    let err = Orchestrator::new(Crashing, &settings_in(root.path()), "c")
        .run(2)
        .unwrap_err();
    assert!(matches!(err, ReproError::SimulatorSpawn { run: 0, .. }));
}

#[test]
fn malformed_first_run_fails_immediately() {
    let root = tempfile::tempdir().unwrap();
    let sim = Scripted::new(vec![vec!["not json"]]);
    let err = Orchestrator::new(sim, &settings_in(root.path()), "c")
        .run(3)
        .unwrap_err();
    assert!(matches!(err, ReproError::MalformedRecord { line: 1, .. }));
}

#[cfg(unix)]
mod process {
    use super::*;
    use echo_repro_harness::ProcessSimulator;

    fn shell_settings(root: &Path, script: &str) -> HarnessSettings {
        HarnessSettings {
            simulator_program: "sh".into(),
            simulator_args: vec![
                "-c".into(),
                script.into(),
                "sh".into(),
                "{config}".into(),
                "{log}".into(),
            ],
            working_dir: root.display().to_string(),
            log_root: root.join("logs").display().to_string(),
            ..HarnessSettings::default()
        }
    }

    #[test]
    fn shell_simulator_with_wall_clock_noise_is_reproducible() -> Result<()> {
        let root = tempfile::tempdir()?;
        // $1 = config, $2 = log; T differs per run, member order flips on odd seconds
        let script = r#"
            t=$(date +%s%N)
            {
              printf '{"T":"%s","M":"Handling the next waiting request","cfg":"%s"}\n' "$t" "$1"
              if [ $(( $(date +%s) % 2 )) -eq 0 ]; then
                printf '{"T":"%s","M":"x"}\n{"T":"%s","M":"y"}\n' "$t" "$t"
              else
                printf '{"T":"%s","M":"y"}\n{"T":"%s","M":"x"}\n' "$t" "$t"
              fi
            } > "$2"
        "#;
        let settings = shell_settings(root.path(), script);
        let orchestrator =
            Orchestrator::new(ProcessSimulator::new(settings.clone()), &settings, "sim.toml");
        let report = orchestrator.run(3)?;
        assert_eq!(report.comparisons, 2);
        let canon = fs::read_to_string(root.path().join("logs/result_new.txt"))?;
        assert!(canon.contains("sim.toml"));
        Ok(())
    }

    #[test]
    fn non_zero_exit_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let settings = shell_settings(root.path(), "exit 3");
        let err = Orchestrator::new(ProcessSimulator::new(settings.clone()), &settings, "c")
            .run(2)
            .unwrap_err();
        assert!(matches!(err, ReproError::SimulatorExit { run: 0, .. }));
    }
}
