//! Tunnel lifecycle across the main and post steps
//!
//! # Lifecycle
//!
//! - `setup`: install packages, write the config, bring the interface up
//! - (job body runs)
//! - `teardown`: bring the interface down and delete the config, always
//!   best-effort
//!
//! Teardown decides what to undo by probing the live interface and file, not
//! by trusting anything setup recorded.

pub mod setup;
pub mod teardown;

#[cfg(test)]
pub(crate) mod fake;

pub use setup::{run_setup, SetupError, SetupOutcome};
pub use teardown::{run_teardown, TeardownReport};
