//! Host operations the action depends on
//!
//! Every side effect (package installs, file placement, `wg-quick`) goes
//! through [`TunnelHost`] so the setup and teardown sequences can be driven
//! against a fake host in tests.

pub mod linux;

use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Failed to run {command}: {source}")]
    SpawnError {
        command: String,
        source: std::io::Error,
    },
    #[error("{command} failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("Failed to stage config file: {0}")]
    StagingError(#[from] std::io::Error),
    #[error("Unsupported platform")]
    UnsupportedPlatform,
}

/// Result of probing for a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    Present,
    Absent,
    /// The probe itself failed, so presence is unknown
    Indeterminate(String),
}

impl Presence {
    pub fn is_present(&self) -> bool {
        matches!(self, Presence::Present)
    }
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Presence::Present => f.write_str("present"),
            Presence::Absent => f.write_str("absent"),
            Presence::Indeterminate(reason) => write!(f, "unknown ({})", reason),
        }
    }
}

/// External collaborators of the setup and teardown steps
#[allow(async_fn_in_trait)]
pub trait TunnelHost {
    async fn refresh_package_index(&self) -> Result<(), PlatformError>;
    async fn install_packages(&self, packages: &[String]) -> Result<(), PlatformError>;
    async fn ensure_directory(&self, dir: &Path) -> Result<(), PlatformError>;
    /// Write `contents` to `dest` with mode 0600, never exposing a partial file
    async fn install_file(&self, contents: &str, dest: &Path) -> Result<(), PlatformError>;
    async fn remove_file(&self, path: &Path) -> Result<(), PlatformError>;
    async fn tunnel_up(&self, config_path: &Path) -> Result<(), PlatformError>;
    async fn tunnel_down(&self, config_path: &Path) -> Result<(), PlatformError>;
    async fn tunnel_status(&self, interface: &str) -> Result<String, PlatformError>;
    async fn probe_interface(&self, interface: &str) -> Presence;
    async fn probe_file(&self, path: &Path) -> Presence;
}

/// Get the host implementation for the current platform
pub fn get_host(staging_dir: std::path::PathBuf) -> Result<linux::LinuxHost, PlatformError> {
    #[cfg(target_os = "linux")]
    {
        Ok(linux::LinuxHost::new(staging_dir))
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = staging_dir;
        Err(PlatformError::UnsupportedPlatform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_error_display() {
        let err = PlatformError::CommandFailed {
            command: "wg-quick up /etc/wireguard/wg0.conf".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "Line unrecognized".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "wg-quick up /etc/wireguard/wg0.conf failed (exit status: 1): Line unrecognized"
        );

        let err = PlatformError::UnsupportedPlatform;
        assert_eq!(err.to_string(), "Unsupported platform");
    }

    #[test]
    fn test_presence_display() {
        assert_eq!(Presence::Present.to_string(), "present");
        assert_eq!(Presence::Absent.to_string(), "absent");
        assert_eq!(
            Presence::Indeterminate("sudo: not found".into()).to_string(),
            "unknown (sudo: not found)"
        );
        assert!(Presence::Present.is_present());
        assert!(!Presence::Indeterminate(String::new()).is_present());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_get_host_returns_ok() {
        assert!(get_host(std::env::temp_dir()).is_ok());
    }
}
