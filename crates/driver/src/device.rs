use std::sync::atomic::{AtomicU64, Ordering};

use iogate::{GateConfig, IoGate, Rejected, StopReport};

use crate::DriverError;

/// Result of one [`Device::pnp_add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
	/// The work ran while the device was guaranteed live.
	Completed,
	/// The device was stopping; the work was skipped.
	Rejected(Rejected),
}

/// A stoppable device whose I/O is admitted through an [`IoGate`].
#[derive(Debug)]
pub struct Device {
	gate: IoGate,
	io_completed: AtomicU64,
}

impl Device {
	pub fn new(name: impl Into<String>) -> Self {
		Self::with_config(GateConfig::new(name))
	}

	pub fn with_config(config: GateConfig) -> Self {
		Self {
			gate: IoGate::with_config(config),
			io_completed: AtomicU64::new(0),
		}
	}

	pub fn name(&self) -> &str {
		self.gate.name()
	}

	pub fn gate(&self) -> &IoGate {
		&self.gate
	}

	/// Adds that ran their work to completion.
	pub fn io_completed(&self) -> u64 {
		self.io_completed.load(Ordering::Relaxed)
	}

	/// Runs `work` under a gate token.
	///
	/// Fails with [`DriverError::SafetyViolation`] if the device reports
	/// stopped while the token is held; the token is still released.
	pub fn pnp_add<F>(&self, work: F) -> Result<AddOutcome, DriverError>
	where
		F: FnOnce(),
	{
		let token = match self.gate.acquire() {
			Ok(token) => token,
			Err(rejected) => {
				tracing::trace!(device = self.name(), phase = %rejected.phase, "device.add rejected");
				return Ok(AddOutcome::Rejected(rejected));
			}
		};

		if self.gate.is_stopped() {
			drop(token);
			tracing::error!(device = self.name(), "device.add observed stopped device under token");
			return Err(DriverError::SafetyViolation {
				device: self.name().to_string(),
			});
		}

		work();
		self.io_completed.fetch_add(1, Ordering::Relaxed);
		self.gate.release(token);
		Ok(AddOutcome::Completed)
	}

	/// Stops the device, blocking until in-flight adds finish.
	pub fn pnp_stop(&self) -> Result<StopReport, DriverError> {
		let report = self.gate.try_stop().map_err(|source| DriverError::Usage {
			device: self.name().to_string(),
			source,
		})?;
		tracing::debug!(device = self.name(), waited = ?report.waited, io = self.io_completed(), "device.stopped");
		Ok(report)
	}
}
