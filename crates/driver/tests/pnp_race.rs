//! Device-level add/stop races through the public scenario runners.

use std::sync::Arc;
use std::thread;

use iogate::{GateConfig, GatePhase, RejectPolicy};
use iogate_driver::scenario::{self, StressConfig};
use iogate_driver::{AddOutcome, Device, DriverError};

use rand as _;
use serde as _;
use thiserror as _;
use tracing as _;

fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn stop_racing_add_never_strands_a_token() {
	init_tracing();
	for _ in 0..1_000 {
		let report = scenario::add_vs_stop(&GateConfig::new("bcsp1"));
		assert_eq!(report.violations, 0);
		assert!(report.is_clean(), "{report:?}");
	}
}

#[test]
fn concurrent_stoppers_yield_one_usage_error() {
	init_tracing();
	for _ in 0..1_000 {
		let report = scenario::two_stoppers(&GateConfig::new("bcsp2"));
		assert_eq!(report.stops, 1);
		assert_eq!(report.usage_errors, 1);
		assert!(report.is_clean(), "{report:?}");
	}
}

#[test]
fn stress_fifty_acquirers_under_both_policies() {
	init_tracing();
	for policy in [RejectPolicy::FailFast, RejectPolicy::CountAndRelease] {
		let config = StressConfig {
			acquirers: 50,
			iterations: 100,
			gate: GateConfig::new("stress").reject_policy(policy),
		};
		let report = scenario::stress(&config).unwrap();
		assert!(report.is_clean(), "{policy:?}: {report:?}");
		assert_eq!(report.completed + report.rejected, 5_000);
	}
}

#[test]
fn adds_after_stop_are_rejected_on_every_thread() {
	init_tracing();
	let device = Arc::new(Device::new("bcsp3"));
	device.pnp_stop().unwrap();

	let handles: Vec<_> = (0..8)
		.map(|_| {
			let device = Arc::clone(&device);
			thread::spawn(move || device.pnp_add(|| panic!("work ran on a stopped device")))
		})
		.collect();
	for h in handles {
		match h.join().unwrap() {
			Ok(AddOutcome::Rejected(r)) => assert_eq!(r.phase, GatePhase::Stopped),
			other => panic!("unexpected add outcome: {other:?}"),
		}
	}
	assert!(matches!(device.pnp_stop(), Err(DriverError::Usage { .. })));
	assert_eq!(device.gate().stats().rejected, 8);
}
