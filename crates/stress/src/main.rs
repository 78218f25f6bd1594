//! Stress runner for the iogate stop protocol.
//!
//! Repeats the add/stop races against fresh devices and exits non-zero if
//! any round reports a token held across a completed stop.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use iogate::RejectPolicy;
use iogate_driver::scenario::{self, ScenarioReport, StressConfig};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Policy {
	FailFast,
	CountAndRelease,
}

impl From<Policy> for RejectPolicy {
	fn from(policy: Policy) -> Self {
		match policy {
			Policy::FailFast => Self::FailFast,
			Policy::CountAndRelease => Self::CountAndRelease,
		}
	}
}

/// Stress runner command line arguments.
#[derive(Parser, Debug)]
#[command(name = "iogate-stress")]
#[command(about = "Race adds against stops on an iogate-backed device")]
struct Args {
	/// TOML file with `rounds` and a `[stress]` table
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Threads looping over adds
	#[arg(short, long)]
	acquirers: Option<usize>,

	/// Adds attempted by each thread per round
	#[arg(short, long)]
	iterations: Option<usize>,

	/// Stress rounds to run
	#[arg(short, long)]
	rounds: Option<usize>,

	/// How adds arriving after stop are accounted
	#[arg(short, long, value_enum)]
	policy: Option<Policy>,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
	rounds: usize,
	stress: StressConfig,
}

impl Default for FileConfig {
	fn default() -> Self {
		Self {
			rounds: 20,
			stress: StressConfig::default(),
		}
	}
}

fn load_config(path: &Path) -> anyhow::Result<FileConfig> {
	let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
	toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Loads the file config, applies flag overrides, and rejects unrunnable values.
fn resolve_config(args: &Args) -> anyhow::Result<FileConfig> {
	let mut config = match &args.config {
		Some(path) => load_config(path)?,
		None => FileConfig::default(),
	};
	if let Some(acquirers) = args.acquirers {
		config.stress.acquirers = acquirers;
	}
	if let Some(iterations) = args.iterations {
		config.stress.iterations = iterations;
	}
	if let Some(rounds) = args.rounds {
		config.rounds = rounds;
	}
	if let Some(policy) = args.policy {
		config.stress.gate.reject_policy = policy.into();
	}
	config.stress.total_attempts().context("invalid stress configuration")?;
	Ok(config)
}

fn main() -> anyhow::Result<ExitCode> {
	let args = Args::parse();
	setup_tracing(args.verbose);
	let config = resolve_config(&args)?;

	info!(
		rounds = config.rounds,
		acquirers = config.stress.acquirers,
		iterations = config.stress.iterations,
		policy = config.stress.gate.reject_policy.as_str(),
		"starting iogate-stress"
	);

	let mut dirty = 0usize;
	for round in 0..config.rounds {
		let reports = [
			("add_vs_stop", scenario::add_vs_stop(&config.stress.gate)),
			("adds_vs_stop", scenario::adds_vs_stop(&config.stress.gate)),
			("two_stoppers", scenario::two_stoppers(&config.stress.gate)),
			("stress", scenario::stress(&config.stress)?),
		];
		for (name, report) in &reports {
			if !check(round, name, report) {
				dirty += 1;
			}
		}
	}

	if dirty > 0 {
		warn!(dirty, "iogate-stress found unclean runs");
		return Ok(ExitCode::FAILURE);
	}
	info!("all rounds clean");
	Ok(ExitCode::SUCCESS)
}

fn check(round: usize, name: &str, report: &ScenarioReport) -> bool {
	let clean = report.is_clean();
	if clean {
		info!(
			round,
			scenario = name,
			completed = report.completed,
			rejected = report.rejected,
			usage_errors = report.usage_errors,
			"round clean"
		);
	} else {
		warn!(round, scenario = name, ?report, "round unclean");
	}
	clean
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("iogate=debug,iogate_driver=debug,iogate_stress=debug")
		} else {
			EnvFilter::new("iogate_stress=info,warn")
		}
	});
	tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}
