//! WireGuard action - bring up a WireGuard tunnel for the duration of a CI job
//!
//! The action runs twice per job: once as the main step, which installs
//! WireGuard, writes the config and brings the interface up, and once as the
//! post step, which tears everything down again even if the job failed.
//!
//! # Architecture
//!
//! - `wireguard`: Config transformation (base64 decode, AllowedIPs, DNS)
//! - `action`: Runner inputs, saved state and workflow commands
//! - `platform`: Host operations (apt-get, wg-quick, file placement)
//! - `lifecycle`: Setup and teardown sequences
//! - `config`: Interface name, paths and packages (TOML)
//!
//! # Usage
//!
//! ```bash
//! # main step, with INPUT_WG-CONFIG-FILE etc. set by the runner
//! wireguard-action setup
//!
//! # post step, runs even when the job failed
//! wireguard-action teardown
//! ```

pub mod action;
pub mod config;
pub mod lifecycle;
pub mod platform;
pub mod wireguard;

pub use action::{ActionInputs, PostState, Workflow};
pub use config::ActionConfig;
pub use lifecycle::{run_setup, run_teardown};
