use iogate::UsageViolation;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
	/// An add held a granted token while the device reported itself stopped.
	#[error("device `{device}` was stopped while an add held a token")]
	SafetyViolation { device: String },
	#[error("device `{device}`: {source}")]
	Usage {
		device: String,
		#[source]
		source: UsageViolation,
	},
}

/// A [`StressConfig`](crate::scenario::StressConfig) that cannot be run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StressConfigError {
	#[error("acquirers must be at most {max}, got {got}")]
	TooManyAcquirers { got: usize, max: usize },
	#[error("{acquirers} acquirers x {iterations} iterations overflows the attempt counter")]
	TooManyAttempts { acquirers: usize, iterations: usize },
}
