// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Command-line surface for `echo-repro`.

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::{Args, CommandFactory, FromArgMatches, Parser, Subcommand};
use echo_repro_config::config::ConfigService;
use echo_repro_config::settings::{HarnessSettings, SETTINGS_KEY};
use echo_repro_config_fs::FsConfigStore;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::orchestrate::{Orchestrator, ProcessSimulator};
use crate::pipeline::{ArtifactPaths, LogPipeline};

#[derive(Parser)]
#[command(name = "echo-repro")]
#[command(
    about = "Runs a simulation config repeatedly and verifies every run logs a logically identical event sequence",
    long_about = "Runs the simulation with the given config N times and compares each run's \
                  canonicalized log against the previous one. Fails on the first run that is not \
                  equivalent. Raw output is saved to <log-root>/<datetime>/ and the two most recent \
                  canonical logs to <log-root>/result_*.txt."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    #[command(flatten)]
    pub run: RunArgs,
    #[command(flatten)]
    pub overrides: SettingsArgs,
}

/// Top-level run options, by argument id and flag.
const RUN_ARGS: [(&str, &str); 3] = [
    ("num_tests", "--num-tests"),
    ("config_path", "--config-path"),
    ("emit_repro", "--emit-repro"),
];

impl Cli {
    /// Parse `args`. Settings overrides may appear anywhere; run options given
    /// before a subcommand are rejected instead of silently ignored.
    pub fn try_parse_args<I, T>(args: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut cmd = Self::command();
        let matches = cmd.try_get_matches_from_mut(args)?;
        if let Some(sub) = matches.subcommand_name() {
            let explicit = RUN_ARGS
                .iter()
                .find(|(id, _)| matches.value_source(id) == Some(ValueSource::CommandLine));
            if let Some((_, flag)) = explicit {
                return Err(cmd.error(
                    ErrorKind::ArgumentConflict,
                    format!("{flag} cannot be combined with the '{sub}' subcommand"),
                ));
            }
        }
        Self::from_arg_matches(&matches)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the simulation repeatedly and compare adjacent runs (the default)
    Run(RunArgs),
    /// Compare two existing raw logs
    Compare {
        /// Newer raw log
        new: PathBuf,
        /// Older raw log
        old: PathBuf,
        /// Directory for result_*.txt (defaults to the log root)
        #[arg(long)]
        artifacts: Option<PathBuf>,
    },
    /// Print or write the canonical form of one raw log
    Canon {
        /// Raw log to canonicalize
        log: PathBuf,
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// The number of runs to perform
    #[arg(short = 'n', long = "num-tests", default_value_t = 10)]
    pub num_tests: usize,
    /// Simulation config path, relative to the simulator's working directory
    #[arg(
        short = 'c',
        long = "config-path",
        default_value = "simulation/configs/simulation_test.toml"
    )]
    pub config_path: String,
    /// Optional directory to emit a reproduction bundle into on failure
    #[arg(long)]
    pub emit_repro: Option<PathBuf>,
}

#[derive(Args, Clone, Debug, Default)]
pub struct SettingsArgs {
    /// Read and persist settings in this directory instead of the user config dir
    #[arg(long, global = true)]
    pub settings_dir: Option<PathBuf>,
    /// Simulator executable
    #[arg(long, global = true)]
    pub simulator: Option<String>,
    /// Working directory for the simulator
    #[arg(long, global = true)]
    pub workdir: Option<String>,
    /// Root for session logs and comparison artifacts
    #[arg(long, global = true)]
    pub log_root: Option<String>,
    /// Field stripped before comparison (repeatable; replaces the configured list)
    #[arg(long = "time-field", global = true)]
    pub time_fields: Vec<String>,
    /// Substring marking the start of a logical time step
    #[arg(long, global = true)]
    pub marker: Option<String>,
}

impl SettingsArgs {
    /// Apply command-line overrides on top of persisted settings.
    pub fn apply(&self, mut settings: HarnessSettings) -> HarnessSettings {
        if let Some(program) = &self.simulator {
            settings.simulator_program.clone_from(program);
        }
        if let Some(dir) = &self.workdir {
            settings.working_dir.clone_from(dir);
        }
        if let Some(root) = &self.log_root {
            settings.log_root.clone_from(root);
        }
        if !self.time_fields.is_empty() {
            settings.time_fields.clone_from(&self.time_fields);
        }
        if let Some(marker) = &self.marker {
            settings.boundary_marker.clone_from(marker);
        }
        settings
    }
}

/// Load settings best-effort: fall back to defaults when the store is unusable.
pub fn load_settings(settings_dir: Option<&PathBuf>) -> HarnessSettings {
    let store = match settings_dir {
        Some(dir) => FsConfigStore::at(dir),
        None => FsConfigStore::new(),
    };
    let service = match store {
        Ok(store) => ConfigService::new(store),
        Err(err) => {
            warn!(%err, "config store unavailable; using default settings");
            return HarnessSettings::default();
        }
    };
    match service.load_or_init::<HarnessSettings>(SETTINGS_KEY) {
        Ok(loaded) => {
            if loaded.initialized {
                debug!(dir = %service.store().base().display(), "persisted default settings");
            }
            loaded.value
        }
        Err(err) => {
            warn!(%err, "could not load settings; using defaults");
            HarnessSettings::default()
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // a second init (e.g. from tests) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn entrypoint() -> Result<()> {
    let cli = Cli::try_parse_args(std::env::args_os()).unwrap_or_else(|e| e.exit());
    init_tracing();

    let settings = cli
        .overrides
        .apply(load_settings(cli.overrides.settings_dir.as_ref()));

    match cli.command.unwrap_or(Commands::Run(cli.run)) {
        Commands::Run(args) => {
            let simulator = ProcessSimulator::new(settings.clone());
            let mut orchestrator = Orchestrator::new(simulator, &settings, args.config_path);
            if let Some(dir) = args.emit_repro {
                orchestrator = orchestrator.with_repro_dir(dir);
            }
            let report = orchestrator.run(args.num_tests)?;
            println!(
                "echo-repro: OK. {} runs logically equivalent ({} comparisons). Logs in {}",
                report.runs,
                report.comparisons,
                report.session_dir.display()
            );
        }
        Commands::Compare {
            new,
            old,
            artifacts,
        } => {
            let dir = artifacts.unwrap_or_else(|| PathBuf::from(&settings.log_root));
            let paths = ArtifactPaths::in_dir(&dir, &settings);
            let compared =
                LogPipeline::from_settings(&settings).compare_files(&new, &old, &paths)?;
            println!(
                "echo-repro: OK. Files are equal ({} canonical lines).",
                compared.equivalence.lines
            );
        }
        Commands::Canon { log, out } => {
            let seq = LogPipeline::from_settings(&settings).canonicalize_file(&log)?;
            match out {
                Some(path) => {
                    seq.write_to(&path)
                        .with_context(|| format!("failed to canonicalize {}", log.display()))?;
                    println!(
                        "echo-repro: wrote {} lines ({} steps) to {}",
                        seq.len(),
                        seq.steps(),
                        path.display()
                    );
                }
                None => print!("{}", seq.render()),
            }
        }
    }

    Ok(())
}
