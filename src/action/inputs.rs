//! Action input and post-step state parsing
//!
//! The runner passes step inputs as environment variables named
//! `INPUT_<NAME>`, where NAME is upper-cased with spaces replaced by
//! underscores. Hyphens are kept, so `wg-config-file` arrives as
//! `INPUT_WG-CONFIG-FILE`.
//!
//! | Input | Required | Default |
//! |-------|----------|---------|
//! | `wg-config-file` | yes | |
//! | `allowed-ips` | no | empty |
//! | `keep-dns` | no | `false` |
//!
//! State saved by the main step comes back to the post step as
//! `STATE_<name>`.

use crate::wireguard::TransformOptions;
use std::env;
use thiserror::Error;

pub const INPUT_CONFIG: &str = "wg-config-file";
pub const INPUT_ALLOWED_IPS: &str = "allowed-ips";
pub const INPUT_KEEP_DNS: &str = "keep-dns";

/// State key written by setup
pub const STATE_STARTED: &str = "wireguard-started";

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Input required and not supplied: {0}")]
    MissingInput(String),
}

/// Environment variable carrying the input `name`
pub fn input_var(name: &str) -> String {
    format!("INPUT_{}", name.replace(' ', "_").to_uppercase())
}

/// Environment variable carrying the saved state `name`
pub fn state_var(name: &str) -> String {
    format!("STATE_{}", name)
}

/// Parsed inputs for the setup step
#[derive(Debug, Clone)]
pub struct ActionInputs {
    /// Plain-text or base64-encoded WireGuard config
    pub config: String,
    /// Optional `AllowedIPs` replacement, passed through verbatim
    pub allowed_ips: Option<String>,
    pub keep_dns: bool,
}

impl ActionInputs {
    /// Parse inputs from the current process environment
    pub fn from_env() -> Result<Self, InputError> {
        Self::from_env_fn(|key| env::var(key))
    }

    /// Parse inputs using a custom getter (for testing)
    pub fn from_env_fn<F>(get_var: F) -> Result<Self, InputError>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let input = |name: &str| -> Option<String> {
            get_var(&input_var(name))
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let config =
            input(INPUT_CONFIG).ok_or_else(|| InputError::MissingInput(INPUT_CONFIG.into()))?;
        let allowed_ips = input(INPUT_ALLOWED_IPS);
        let keep_dns = input(INPUT_KEEP_DNS).is_some_and(|v| v == "true");

        Ok(Self {
            config,
            allowed_ips,
            keep_dns,
        })
    }

    pub fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            allowed_ips: self.allowed_ips.clone(),
            keep_dns: self.keep_dns,
        }
    }
}

/// State handed from the setup step to the post step.
///
/// Advisory only: teardown probes the live interface and file instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostState {
    pub started: Option<bool>,
}

impl PostState {
    pub fn from_env() -> Self {
        Self::from_env_fn(|key| env::var(key))
    }

    pub fn from_env_fn<F>(get_var: F) -> Self
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let started = get_var(&state_var(STATE_STARTED))
            .ok()
            .filter(|v| !v.is_empty())
            .map(|v| v == "true");
        Self { started }
    }
}
