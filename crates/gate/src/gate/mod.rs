use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tokio::sync::Notify;

use crate::stats::{GateStats, StopReport};
use crate::token::IoToken;
use crate::{GateConfig, GatePhase, RejectPolicy, Rejected, UsageViolation};


/// Everything guarded by the gate mutex.
///
/// Every read that decides and every write that follows it happen under one
/// lock acquisition. Nothing here is ever read outside the lock.
#[derive(Debug)]
pub(crate) struct GateState {
	/// Outstanding tokens plus the baseline pin held until stop.
	pending: usize,
	phase: GatePhase,
	granted: u64,
	rejected: u64,
	released: u64,
	drained_signals: u64,
	/// The stopper went away before observing the drain; the final release finishes the stop.
	stop_abandoned: bool,
}

impl GateState {
	fn new() -> Self {
		Self {
			pending: 1,
			phase: GatePhase::Active,
			granted: 0,
			rejected: 0,
			released: 0,
			drained_signals: 0,
			stop_abandoned: false,
		}
	}

	fn snapshot(&self) -> GateStats {
		GateStats {
			phase: self.phase,
			pending: self.pending,
			granted: self.granted,
			rejected: self.rejected,
			released: self.released,
			drained_signals: self.drained_signals,
		}
	}

	/// Drops one unit from the pending count. Returns true when this call fired the drain.
	fn release_locked(&mut self) -> Result<bool, UsageViolation> {
		self.pending = self.pending.checked_sub(1).ok_or(UsageViolation::Underflow)?;
		if self.pending == 0 && self.phase == GatePhase::Stopping {
			self.phase = self.phase.advance(GatePhase::Drained)?;
			self.drained_signals += 1;
			if self.stop_abandoned {
				self.phase = self.phase.advance(GatePhase::Stopped)?;
			}
			return Ok(true);
		}
		Ok(false)
	}
}

pub(crate) struct GateInner {
	config: GateConfig,
	state: Mutex<GateState>,
	/// Signalled on drain and on stop completion. Always paired with `state`.
	changed: Condvar,
	/// Async counterpart of `changed` for [`IoGate::try_stop_async`].
	changed_async: Notify,
}

impl GateInner {
	pub(crate) fn name(&self) -> &str {
		&self.config.name
	}

	/// Releases one granted token.
	pub(crate) fn release_token(&self) {
		let mut state = self.state.lock();
		let drained = match state.release_locked() {
			Ok(drained) => drained,
			Err(violation) => {
				drop(state);
				self.violation(violation)
			}
		};
		state.released += 1;
		let pending = state.pending;
		drop(state);

		tracing::trace!(gate = %self.config.name, pending, "iogate.release");
		if drained {
			tracing::debug!(gate = %self.config.name, "iogate.drained");
			self.wake();
		}
	}

	/// Moves an active gate into `Stopping` and drops the baseline pin.
	fn begin_stop(&self, state: &mut MutexGuard<'_, GateState>) -> Result<(), UsageViolation> {
		if state.phase != GatePhase::Active {
			tracing::warn!(gate = %self.config.name, phase = %state.phase, "iogate.stop rejected: already initiated");
			return Err(UsageViolation::StopAlreadyInitiated(state.phase));
		}
		state.phase = state.phase.advance(GatePhase::Stopping)?;
		let drained = state.release_locked()?;
		tracing::debug!(gate = %self.config.name, pending = state.pending, drained, "iogate.stopping");
		Ok(())
	}

	/// Completes a stop once the drain has been observed under the lock.
	fn finish_stop(&self, state: &mut MutexGuard<'_, GateState>, started: Instant) -> StopReport {
		state.phase = match state.phase.advance(GatePhase::Stopped) {
			Ok(phase) => phase,
			Err(violation) => self.violation(violation),
		};
		let report = StopReport {
			waited: started.elapsed(),
			stats: state.snapshot(),
		};
		tracing::debug!(gate = %self.config.name, waited = ?report.waited, "iogate.stopped");
		report
	}

	/// Called when an async stopper is dropped before it finished.
	fn abandon_stop(&self) {
		let mut state = self.state.lock();
		match state.phase {
			GatePhase::Drained => {
				state.phase = match state.phase.advance(GatePhase::Stopped) {
					Ok(phase) => phase,
					Err(violation) => self.violation(violation),
				};
			}
			GatePhase::Stopping => state.stop_abandoned = true,
			GatePhase::Active | GatePhase::Stopped => return,
		}
		let phase = state.phase;
		drop(state);
		tracing::debug!(gate = %self.config.name, %phase, "iogate.stop abandoned");
		self.wake();
	}

	fn wake(&self) {
		self.changed.notify_all();
		self.changed_async.notify_waiters();
	}

	fn violation(&self, violation: UsageViolation) -> ! {
		tracing::warn!(gate = %self.config.name, %violation, "iogate.usage_violation");
		panic!("iogate `{}`: {violation}", self.config.name);
	}
}

/// Completes a stop whose async waiter is dropped mid-wait.
struct StopGuard<'a> {
	inner: &'a GateInner,
	armed: bool,
}

impl Drop for StopGuard<'_> {
	fn drop(&mut self) {
		if self.armed {
			self.inner.abandon_stop();
		}
	}
}

/// Shutdown-gated reference counter for one stoppable resource.
///
/// Callers wrap each unit of I/O in [`acquire`](Self::acquire) and the
/// returned [`IoToken`]. Exactly one owner calls [`stop`](Self::stop), which
/// closes the gate, waits for every outstanding token to come back, and
/// leaves the gate in [`GatePhase::Stopped`] for good.
///
/// Cloning yields another handle to the same gate.
#[derive(Clone)]
pub struct IoGate {
	inner: Arc<GateInner>,
}

impl Default for IoGate {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for IoGate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.inner.state.lock();
		f.debug_struct("IoGate")
			.field("name", &self.inner.config.name)
			.field("phase", &state.phase)
			.field("pending", &state.pending)
			.finish()
	}
}

impl IoGate {
	/// Creates an active gate with the default configuration.
	pub fn new() -> Self {
		Self::with_config(GateConfig::default())
	}

	pub fn with_config(config: GateConfig) -> Self {
		Self {
			inner: Arc::new(GateInner {
				config,
				state: Mutex::new(GateState::new()),
				changed: Condvar::new(),
				changed_async: Notify::new(),
			}),
		}
	}

	pub fn config(&self) -> &GateConfig {
		&self.inner.config
	}

	pub fn name(&self) -> &str {
		self.inner.name()
	}

	/// Attempts to take a usage token. Never blocks beyond the gate lock.
	///
	/// Once stop has been requested every attempt is rejected. Under
	/// [`RejectPolicy::CountAndRelease`] the attempt is counted and released
	/// before returning, inside the same critical section as the phase check.
	pub fn acquire(&self) -> Result<IoToken, Rejected> {
		let mut state = self.inner.state.lock();
		if state.phase.accepts_io() {
			state.pending += 1;
			state.granted += 1;
			let pending = state.pending;
			drop(state);
			tracing::trace!(gate = %self.inner.config.name, pending, "iogate.acquire");
			return Ok(IoToken::new(Arc::clone(&self.inner)));
		}

		let phase = state.phase;
		state.rejected += 1;
		let counted = self.inner.config.reject_policy == RejectPolicy::CountAndRelease;
		let mut drained = false;
		if counted {
			state.pending += 1;
			drained = match state.release_locked() {
				Ok(drained) => drained,
				Err(violation) => {
					drop(state);
					self.inner.violation(violation)
				}
			};
		}
		drop(state);

		tracing::trace!(gate = %self.inner.config.name, %phase, counted, "iogate.acquire rejected");
		if drained {
			self.inner.wake();
		}
		Err(Rejected { phase, counted })
	}

	/// Returns `token` to this gate.
	///
	/// # Panics
	///
	/// Panics with [`UsageViolation::ForeignToken`] if another gate issued `token`.
	pub fn release(&self, token: IoToken) {
		if !token.issued_by(&self.inner) {
			self.inner.violation(UsageViolation::ForeignToken);
		}
		token.release();
	}

	/// Closes the gate and blocks until every outstanding token is released.
	///
	/// # Panics
	///
	/// Panics if stop was already initiated on this gate.
	pub fn stop(&self) -> StopReport {
		self.try_stop().unwrap_or_else(|violation| self.inner.violation(violation))
	}

	/// Like [`stop`](Self::stop), but reports a repeated stop as an error instead of panicking.
	pub fn try_stop(&self) -> Result<StopReport, UsageViolation> {
		let started = Instant::now();
		let mut state = self.inner.state.lock();
		self.inner.begin_stop(&mut state)?;
		while state.phase != GatePhase::Drained {
			self.inner.changed.wait(&mut state);
		}
		let report = self.inner.finish_stop(&mut state, started);
		drop(state);
		self.inner.wake();
		Ok(report)
	}

	/// Async form of [`stop`](Self::stop).
	///
	/// # Panics
	///
	/// Panics if stop was already initiated on this gate.
	pub async fn stop_async(&self) -> StopReport {
		match self.try_stop_async().await {
			Ok(report) => report,
			Err(violation) => self.inner.violation(violation),
		}
	}

	/// Async form of [`try_stop`](Self::try_stop). The gate lock is never held across an await.
	pub async fn try_stop_async(&self) -> Result<StopReport, UsageViolation> {
		let started = Instant::now();
		{
			let mut state = self.inner.state.lock();
			self.inner.begin_stop(&mut state)?;
		}
		let mut guard = StopGuard {
			inner: &self.inner,
			armed: true,
		};

		loop {
			// Register before checking so a drain between the check and the
			// await still wakes us.
			let mut notified = std::pin::pin!(self.inner.changed_async.notified());
			notified.as_mut().enable();
			{
				let mut state = self.inner.state.lock();
				if state.phase == GatePhase::Drained {
					let report = self.inner.finish_stop(&mut state, started);
					drop(state);
					guard.armed = false;
					self.inner.wake();
					return Ok(report);
				}
			}
			notified.await;
		}
	}

	/// Waits for another caller's stop to complete. Returns `false` on timeout.
	///
	/// Does not initiate a stop.
	pub fn wait_stopped_timeout(&self, timeout: Duration) -> bool {
		let deadline = Instant::now() + timeout;
		let mut state = self.inner.state.lock();
		while !state.phase.is_terminal() {
			if self.inner.changed.wait_until(&mut state, deadline).timed_out() {
				return state.phase.is_terminal();
			}
		}
		true
	}

	pub fn phase(&self) -> GatePhase {
		self.inner.state.lock().phase
	}

	/// Outstanding tokens, including the baseline pin while the gate is active.
	pub fn pending(&self) -> usize {
		self.inner.state.lock().pending
	}

	pub fn is_stopped(&self) -> bool {
		self.phase().is_terminal()
	}

	pub fn stats(&self) -> GateStats {
		self.inner.state.lock().snapshot()
	}
}
