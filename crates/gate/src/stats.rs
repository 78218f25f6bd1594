use std::time::Duration;

use crate::GatePhase;

/// Point-in-time view of a gate, taken under its lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateStats {
	pub phase: GatePhase,
	/// Outstanding tokens, including the baseline pin while active.
	pub pending: usize,
	/// Tokens handed out by `acquire`.
	pub granted: u64,
	/// Acquire attempts turned away after stop was requested.
	pub rejected: u64,
	/// Granted tokens returned so far.
	pub released: u64,
	/// Times the drain fired. Never exceeds one.
	pub drained_signals: u64,
}

impl GateStats {
	/// Granted tokens not yet released.
	pub fn outstanding(&self) -> u64 {
		self.granted.saturating_sub(self.released)
	}
}

/// Result of a completed stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopReport {
	/// Time from stop initiation until the drain was observed.
	pub waited: Duration,
	/// Stats captured at the moment the gate entered `Stopped`.
	pub stats: GateStats,
}
