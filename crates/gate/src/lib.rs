//! Shutdown-gated reference counting for stoppable resources.
//!
//! An [`IoGate`] admits concurrent users through [`IoGate::acquire`] until
//! one owner calls [`IoGate::stop`]. Stop closes the gate, drops the baseline
//! pin taken at construction, and blocks until the last outstanding
//! [`IoToken`] comes back. The phase check and the counter update of every
//! acquire and release share one critical section, so an acquire racing a
//! stop is either rejected or counted before the drain can fire.

mod config;
mod error;
mod gate;
mod phase;
mod stats;
mod token;

pub use config::{GateConfig, RejectPolicy};
pub use error::{Rejected, UsageViolation};
pub use gate::IoGate;
pub use phase::GatePhase;
pub use stats::{GateStats, StopReport};
pub use token::IoToken;


// Dev-dependencies only exercised by the integration tests.
#[cfg(test)]
use rand as _;
#[cfg(test)]
use tracing_subscriber as _;
