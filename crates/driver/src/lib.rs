//! Plug-and-play device model driven through an [`iogate::IoGate`].
//!
//! [`Device`] follows the add/stop shape of a bus driver: every add takes a
//! gate token for the duration of its I/O and every device is stopped once.
//! [`scenario`] replays the classic add/stop interleavings against it.

mod device;
mod error;
pub mod scenario;

pub use device::{AddOutcome, Device};
pub use error::{DriverError, StressConfigError};

#[cfg(test)]
use tracing_subscriber as _;
