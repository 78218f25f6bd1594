use std::fmt;
use std::sync::Arc;

use crate::gate::GateInner;

/// Permit for one unit of resource usage, issued by [`IoGate::acquire`](crate::IoGate::acquire).
///
/// Dropping the token releases it; the last release after a stop request
/// fires the gate's drain.
#[must_use = "dropping an IoToken releases it immediately"]
pub struct IoToken {
	gate: Arc<GateInner>,
}

impl IoToken {
	pub(crate) fn new(gate: Arc<GateInner>) -> Self {
		Self { gate }
	}

	/// Releases the token. Same as dropping it.
	pub fn release(self) {}

	/// Name of the issuing gate.
	pub fn gate_name(&self) -> &str {
		self.gate.name()
	}

	pub(crate) fn issued_by(&self, gate: &Arc<GateInner>) -> bool {
		Arc::ptr_eq(&self.gate, gate)
	}
}

impl Drop for IoToken {
	fn drop(&mut self) {
		self.gate.release_token();
	}
}

impl fmt::Debug for IoToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("IoToken").field("gate", &self.gate.name()).finish()
	}
}
