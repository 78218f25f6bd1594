//! Add/stop interleavings replayed against a [`Device`].
//!
//! Each runner builds a fresh device, races the participants on real
//! threads, and folds every outcome into a [`ScenarioReport`]. A clean
//! report has no safety violations and ends with the gate fully drained.

use std::sync::Barrier;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use iogate::{GateConfig, GatePhase, GateStats, StopReport};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{AddOutcome, Device, DriverError, StressConfigError};

/// Upper bound on [`StressConfig::acquirers`].
pub const MAX_ACQUIRERS: usize = 4_096;

/// Parameters for [`stress`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StressConfig {
	/// Threads looping over `pnp_add`.
	pub acquirers: usize,
	/// Adds attempted by each acquirer.
	pub iterations: usize,
	pub gate: GateConfig,
}

impl Default for StressConfig {
	fn default() -> Self {
		Self {
			acquirers: 50,
			iterations: 1_000,
			gate: GateConfig::new("stress"),
		}
	}
}

impl StressConfig {
	/// Total adds a run will attempt, after checking the config is runnable.
	pub fn total_attempts(&self) -> Result<u64, StressConfigError> {
		if self.acquirers > MAX_ACQUIRERS {
			return Err(StressConfigError::TooManyAcquirers {
				got: self.acquirers,
				max: MAX_ACQUIRERS,
			});
		}
		let overflow = StressConfigError::TooManyAttempts {
			acquirers: self.acquirers,
			iterations: self.iterations,
		};
		let iterations = u64::try_from(self.iterations).map_err(|_| overflow.clone())?;
		(self.acquirers as u64).checked_mul(iterations).ok_or(overflow)
	}
}

/// Tally of one scenario run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioReport {
	pub completed: u64,
	pub rejected: u64,
	/// Adds that saw the device stopped while holding a token.
	pub violations: u64,
	/// Stops refused because another stop was already in progress or done.
	pub usage_errors: u64,
	pub stops: u64,
	/// Gate stats after every participant finished.
	pub final_stats: Option<GateStats>,
}

impl ScenarioReport {
	/// No violations, exactly one stop, and a drained, stopped gate.
	pub fn is_clean(&self) -> bool {
		self.violations == 0
			&& self.stops == 1
			&& self
				.final_stats
				.is_some_and(|s| s.phase == GatePhase::Stopped && s.pending == 0 && s.drained_signals == 1)
	}

	fn record_add(&mut self, outcome: Result<AddOutcome, DriverError>) {
		match outcome {
			Ok(AddOutcome::Completed) => self.completed += 1,
			Ok(AddOutcome::Rejected(_)) => self.rejected += 1,
			Err(DriverError::SafetyViolation { .. }) => self.violations += 1,
			Err(DriverError::Usage { .. }) => self.usage_errors += 1,
		}
	}

	fn record_stop(&mut self, outcome: Result<StopReport, DriverError>) {
		match outcome {
			Ok(_) => self.stops += 1,
			Err(DriverError::Usage { .. }) => self.usage_errors += 1,
			Err(DriverError::SafetyViolation { .. }) => self.violations += 1,
		}
	}

	fn finish(mut self, device: &Device) -> Self {
		self.final_stats = Some(device.gate().stats());
		tracing::debug!(
			device = device.name(),
			completed = self.completed,
			rejected = self.rejected,
			violations = self.violations,
			usage_errors = self.usage_errors,
			"scenario.finished"
		);
		self
	}
}

/// One stopper thread against one add on the calling thread.
pub fn add_vs_stop(config: &GateConfig) -> ScenarioReport {
	let device = Device::with_config(config.clone());
	let mut report = ScenarioReport::default();

	thread::scope(|s| {
		let stopper = s.spawn(|| device.pnp_stop());
		report.record_add(device.pnp_add(|| {}));
		report.record_stop(join(stopper));
	});
	report.finish(&device)
}

/// One adder thread and one stopper thread against an add on the calling thread.
pub fn adds_vs_stop(config: &GateConfig) -> ScenarioReport {
	let device = Device::with_config(config.clone());
	let mut report = ScenarioReport::default();

	thread::scope(|s| {
		let adder = s.spawn(|| device.pnp_add(|| {}));
		let stopper = s.spawn(|| device.pnp_stop());
		report.record_add(device.pnp_add(|| {}));
		report.record_add(join(adder));
		report.record_stop(join(stopper));
	});
	report.finish(&device)
}

/// Two stopper threads against an add on the calling thread. One stop must be refused.
pub fn two_stoppers(config: &GateConfig) -> ScenarioReport {
	let device = Device::with_config(config.clone());
	let mut report = ScenarioReport::default();

	thread::scope(|s| {
		let first = s.spawn(|| device.pnp_stop());
		let second = s.spawn(|| device.pnp_stop());
		report.record_add(device.pnp_add(|| {}));
		report.record_stop(join(first));
		report.record_stop(join(second));
	});
	report.finish(&device)
}

/// Many acquirers looping over adds while one stopper fires at a random point.
pub fn stress(config: &StressConfig) -> Result<ScenarioReport, StressConfigError> {
	let total = config.total_attempts()?;
	let device = Device::with_config(config.gate.clone());
	let stop_after = if total == 0 { 0 } else { rand::rng().random_range(0..total) };
	let attempts = AtomicU64::new(0);
	let barrier = Barrier::new(config.acquirers + 1);
	let mut report = ScenarioReport::default();

	tracing::debug!(
		device = device.name(),
		acquirers = config.acquirers,
		iterations = config.iterations,
		stop_after,
		policy = config.gate.reject_policy.as_str(),
		"scenario.stress"
	);

	let (device_ref, barrier, attempts) = (&device, &barrier, &attempts);
	thread::scope(|s| {
		let workers: Vec<_> = (0..config.acquirers)
			.map(|_| {
				s.spawn(move || {
					let mut local = ScenarioReport::default();
					barrier.wait();
					for _ in 0..config.iterations {
						attempts.fetch_add(1, Ordering::Relaxed);
						local.record_add(device_ref.pnp_add(std::hint::spin_loop));
					}
					local
				})
			})
			.collect();

		barrier.wait();
		while attempts.load(Ordering::Relaxed) < stop_after {
			thread::yield_now();
		}
		report.record_stop(device.pnp_stop());

		for worker in workers {
			let local = join(worker);
			report.completed += local.completed;
			report.rejected += local.rejected;
			report.violations += local.violations;
			report.usage_errors += local.usage_errors;
		}
	});
	Ok(report.finish(&device))
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, T>) -> T {
	match handle.join() {
		Ok(value) => value,
		Err(payload) => std::panic::resume_unwind(payload),
	}
}

#[cfg(test)]
mod tests {
	use iogate::RejectPolicy;

	use super::*;

	fn configs() -> [GateConfig; 2] {
		[
			GateConfig::new("bcsp").reject_policy(RejectPolicy::FailFast),
			GateConfig::new("bcsp").reject_policy(RejectPolicy::CountAndRelease),
		]
	}

	#[test]
	fn add_vs_stop_is_always_clean() {
		for config in configs() {
			for _ in 0..500 {
				let report = add_vs_stop(&config);
				assert!(report.is_clean(), "{report:?}");
				assert_eq!(report.completed + report.rejected, 1);
			}
		}
	}

	#[test]
	fn adds_vs_stop_is_always_clean() {
		for config in configs() {
			for _ in 0..500 {
				let report = adds_vs_stop(&config);
				assert!(report.is_clean(), "{report:?}");
				assert_eq!(report.completed + report.rejected, 2);
			}
		}
	}

	#[test]
	fn two_stoppers_refuse_exactly_one() {
		for config in configs() {
			for _ in 0..500 {
				let report = two_stoppers(&config);
				assert!(report.is_clean(), "{report:?}");
				assert_eq!(report.usage_errors, 1);
			}
		}
	}

	#[test]
	fn stress_with_default_config_shape() {
		let config = StressConfig {
			acquirers: 16,
			iterations: 200,
			..StressConfig::default()
		};
		let report = stress(&config).unwrap();
		assert!(report.is_clean(), "{report:?}");
		assert_eq!(report.completed + report.rejected, 16 * 200);
		let stats = report.final_stats.unwrap();
		assert_eq!(stats.granted, report.completed);
		assert_eq!(stats.released, stats.granted);
	}

	#[test]
	fn stress_with_no_work_still_stops() {
		let config = StressConfig {
			acquirers: 0,
			iterations: 0,
			..StressConfig::default()
		};
		let report = stress(&config).unwrap();
		assert!(report.is_clean(), "{report:?}");
		assert_eq!(report.completed, 0);
	}

	#[test]
	fn stress_rejects_oversized_thread_count() {
		let config = StressConfig {
			acquirers: usize::MAX,
			iterations: 2,
			..StressConfig::default()
		};
		assert_eq!(
			stress(&config).unwrap_err(),
			StressConfigError::TooManyAcquirers {
				got: usize::MAX,
				max: MAX_ACQUIRERS,
			}
		);
	}

	#[cfg(target_pointer_width = "64")]
	#[test]
	fn stress_rejects_attempt_count_overflow() {
		let config = StressConfig {
			acquirers: MAX_ACQUIRERS,
			iterations: usize::MAX,
			..StressConfig::default()
		};
		assert!(matches!(stress(&config), Err(StressConfigError::TooManyAttempts { .. })));
		assert_eq!(
			StressConfig {
				acquirers: 4,
				iterations: 10,
				..StressConfig::default()
			}
			.total_attempts(),
			Ok(40)
		);
	}
}
