// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Sequential run orchestration: launch the simulator N times and compare each
//! run against the one before it.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use echo_repro_config::settings::HarnessSettings;
use time::{macros::format_description, OffsetDateTime};
use tracing::{info, warn};

use crate::error::{ReproError, Result};
use crate::pipeline::{ArtifactPaths, LogPipeline};
use crate::repro::{create_repro_bundle, FailureContext};

/// One simulator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// 0-based run index.
    pub run: usize,
    /// Simulation config path, passed through verbatim.
    pub config: String,
    /// Absolute path the run must write its log to.
    pub log: PathBuf,
}

/// Something that can execute one simulation run to completion.
pub trait Simulator {
    /// Run to completion; any launch failure or unsuccessful exit is an error.
    fn run(&self, invocation: &Invocation) -> Result<()>;
}

impl<S: Simulator + ?Sized> Simulator for &S {
    fn run(&self, invocation: &Invocation) -> Result<()> {
        (**self).run(invocation)
    }
}

/// Launches the simulator as a child process and waits for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSimulator {
    settings: HarnessSettings,
}

impl ProcessSimulator {
    /// Use `settings.simulator_program`, its argument template and working dir.
    pub fn new(settings: HarnessSettings) -> Self {
        Self { settings }
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let log = invocation.log.display().to_string();
        let mut cmd = Command::new(&self.settings.simulator_program);
        cmd.args(self.settings.expand_args(&invocation.config, &log));
        if !self.settings.working_dir.is_empty() {
            cmd.current_dir(&self.settings.working_dir);
        }
        cmd
    }
}

impl Simulator for ProcessSimulator {
    fn run(&self, invocation: &Invocation) -> Result<()> {
        let status = self
            .command(invocation)
            .status()
            .map_err(|source| ReproError::SimulatorSpawn {
                program: self.settings.simulator_program.clone(),
                run: invocation.run,
                source,
            })?;
        if !status.success() {
            return Err(ReproError::SimulatorExit {
                run: invocation.run,
                status,
            });
        }
        Ok(())
    }
}

/// Summary of a clean session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestrationReport {
    /// Directory holding `<i>.log` for every run.
    pub session_dir: PathBuf,
    /// Runs executed.
    pub runs: usize,
    /// Adjacent-pair comparisons performed (`runs - 1`).
    pub comparisons: usize,
    /// Canonical fingerprint of each run, in run order.
    pub fingerprints: Vec<String>,
}

/// Drives a session of repeated runs.
pub struct Orchestrator<S> {
    simulator: S,
    pipeline: LogPipeline,
    config: String,
    log_root: PathBuf,
    artifacts: ArtifactPaths,
    session_dir: Option<PathBuf>,
    repro_dir: Option<PathBuf>,
}

impl<S: Simulator> Orchestrator<S> {
    /// Build a session for `config` from persisted settings.
    pub fn new(simulator: S, settings: &HarnessSettings, config: impl Into<String>) -> Self {
        let log_root = PathBuf::from(&settings.log_root);
        Self {
            simulator,
            pipeline: LogPipeline::from_settings(settings),
            config: config.into(),
            artifacts: ArtifactPaths::in_dir(&log_root, settings),
            log_root,
            session_dir: None,
            repro_dir: None,
        }
    }

    /// Write run logs into `dir` instead of a fresh timestamped directory.
    pub fn with_session_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.session_dir = Some(dir.into());
        self
    }

    /// Emit a repro bundle into `dir` when a comparison fails.
    pub fn with_repro_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.repro_dir = Some(dir.into());
        self
    }

    /// Artifact locations used for every comparison.
    pub fn artifacts(&self) -> &ArtifactPaths {
        &self.artifacts
    }

    /// Run the simulator `runs` times, halting on the first failure.
    pub fn run(&self, runs: usize) -> Result<OrchestrationReport> {
        if runs == 0 {
            return Err(ReproError::NoRuns);
        }
        let session_dir = self.prepare_session_dir()?;
        info!(runs, session = %session_dir.display(), config = %self.config, "session starting");

        let first = self.launch(&session_dir, 0)?;
        let baseline = self.pipeline.canonicalize_file(&first)?;
        let mut fingerprints = vec![baseline.fingerprint()];
        // each log is canonicalized once and the result carried to the next pass
        let mut previous = (first, baseline);

        for run in 1..runs {
            let current = self.launch(&session_dir, run)?;
            let (previous_log, previous_seq) = &previous;
            let (current_seq, compared) = self
                .pipeline
                .canonicalize_file(&current)
                .and_then(|seq| {
                    let compared = self
                        .pipeline
                        .compare_sequences(&seq, previous_seq, &self.artifacts)?;
                    Ok((seq, compared))
                })
                .map_err(|error| self.on_failure(&current, previous_log, error))?;
            fingerprints.push(compared.fingerprint);
            previous = (current, current_seq);
        }

        info!(runs, "session complete; all runs logically equivalent");
        Ok(OrchestrationReport {
            session_dir,
            runs,
            comparisons: runs - 1,
            fingerprints,
        })
    }

    fn prepare_session_dir(&self) -> Result<PathBuf> {
        let dir = match &self.session_dir {
            Some(dir) => dir.clone(),
            None => self.log_root.join(session_name(OffsetDateTime::now_utc())?),
        };
        fs::create_dir_all(&dir)
            .map_err(|e| ReproError::io("failed to create session dir", &dir, e))?;
        // the simulator runs in its own working directory
        std::path::absolute(&dir).map_err(|e| ReproError::io("failed to resolve", &dir, e))
    }

    fn launch(&self, session_dir: &Path, run: usize) -> Result<PathBuf> {
        let log = session_dir.join(format!("{run}.log"));
        info!(run, log = %log.display(), "running simulator");
        let invocation = Invocation {
            run,
            config: self.config.clone(),
            log,
        };
        self.simulator.run(&invocation)?;
        if !invocation.log.is_file() {
            return Err(ReproError::MissingLog {
                run,
                path: invocation.log,
            });
        }
        Ok(invocation.log)
    }

    fn on_failure(&self, new_log: &Path, old_log: &Path, error: ReproError) -> ReproError {
        if let Some(dir) = &self.repro_dir {
            let ctx = FailureContext {
                new_log,
                old_log,
                artifacts: &self.artifacts,
                error: &error,
            };
            match create_repro_bundle(dir, &ctx) {
                Ok(path) => info!(bundle = %path.display(), "repro bundle emitted"),
                Err(err) => warn!(%err, "failed to emit repro bundle"),
            }
        }
        error
    }
}

/// `YYYY-MM-DD_HH-MM-SS` for `at`.
pub fn session_name(at: OffsetDateTime) -> Result<String> {
    let fmt = format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
    Ok(at.format(fmt)?)
}
