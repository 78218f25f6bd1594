//! Rejection and misuse types for [`IoGate`](crate::IoGate).

use thiserror::Error;

use crate::GatePhase;

/// Returned by [`IoGate::acquire`](crate::IoGate::acquire) once stop has been requested.
///
/// This is an expected outcome: the caller skips its I/O and the gate keeps
/// draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("gate rejected acquire while {phase}")]
pub struct Rejected {
	/// Phase observed inside the critical section that made the decision.
	pub phase: GatePhase,
	/// Whether the attempt was counted and released before rejecting.
	pub counted: bool,
}

/// Caller broke the gate contract. Panicking entry points abort with this as the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UsageViolation {
	/// A stop was initiated on a gate that is already stopping or stopped.
	#[error("stop already initiated on gate (phase: {0})")]
	StopAlreadyInitiated(GatePhase),
	/// A token issued by another gate was released here.
	#[error("token released into a gate that did not issue it")]
	ForeignToken,
	/// A release would drive the pending count below zero.
	#[error("release without an outstanding token (pending count already zero)")]
	Underflow,
	/// A phase change tried to skip a state or leave a terminal state.
	#[error("invalid phase transition {from} -> {to}")]
	InvalidTransition { from: GatePhase, to: GatePhase },
}
