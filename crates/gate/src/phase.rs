use std::fmt;

use serde::{Deserialize, Serialize};

use crate::UsageViolation;

/// Lifecycle of one gate. Transitions only move forward, one step at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GatePhase {
	/// Accepting new tokens.
	Active,
	/// Stop requested; waiting for outstanding tokens to drain.
	Stopping,
	/// Pending count reached zero while stopping.
	Drained,
	/// The stopper observed the drain and finished teardown.
	Stopped,
}

impl GatePhase {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Active => "active",
			Self::Stopping => "stopping",
			Self::Drained => "drained",
			Self::Stopped => "stopped",
		}
	}

	/// Returns true when new tokens may be granted.
	pub const fn accepts_io(self) -> bool {
		matches!(self, Self::Active)
	}

	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Stopped)
	}

	/// The only phase reachable from `self`, if any.
	pub const fn successor(self) -> Option<Self> {
		match self {
			Self::Active => Some(Self::Stopping),
			Self::Stopping => Some(Self::Drained),
			Self::Drained => Some(Self::Stopped),
			Self::Stopped => None,
		}
	}

	/// Validates a single forward step.
	pub(crate) fn advance(self, to: Self) -> Result<Self, UsageViolation> {
		match self.successor() {
			Some(next) if next == to => Ok(to),
			_ => Err(UsageViolation::InvalidTransition { from: self, to }),
		}
	}
}

impl fmt::Display for GatePhase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
