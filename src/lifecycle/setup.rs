//! Main step: bring the tunnel up
//!
//! Steps run strictly in order and the first failure aborts the rest:
//!
//! 1. Refresh the package index
//! 2. Install WireGuard, its tools, and a resolvconf helper
//! 3. Transform the supplied config
//! 4. Create the config directory
//! 5. Stage the config privately, move it into place, chmod 600
//! 6. `wg-quick up`
//! 7. Log `wg show` output
//! 8. Record the started marker for the post step
//!
//! Nothing is rolled back on failure; the post step always runs and cleans
//! up whatever exists.

use crate::action::inputs::STATE_STARTED;
use crate::action::{ActionInputs, InputError, Workflow};
use crate::config::ActionConfig;
use crate::platform::{PlatformError, TunnelHost};
use crate::wireguard::{transform, OverrideOutcome, TransformReport};
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("{0}")]
    InputError(#[from] InputError),
    #[error("Failed to refresh package index: {0}")]
    PackageIndexError(#[source] PlatformError),
    #[error("Failed to install packages: {0}")]
    InstallError(#[source] PlatformError),
    #[error("Failed to write config to {path}: {source}")]
    WriteConfigError {
        path: PathBuf,
        #[source]
        source: PlatformError,
    },
    #[error("Failed to bring up {interface}: {source}")]
    TunnelUpError {
        interface: String,
        #[source]
        source: PlatformError,
    },
}

/// What setup did, for the caller to report
#[derive(Debug)]
pub struct SetupOutcome {
    pub transform: TransformReport,
    pub config_path: PathBuf,
    /// `wg show` output, if it could be read
    pub status: Option<String>,
}

pub async fn run_setup<H, W>(
    host: &H,
    config: &ActionConfig,
    inputs: &ActionInputs,
    workflow: &mut Workflow<W>,
) -> Result<SetupOutcome, SetupError>
where
    H: TunnelHost,
    W: Write,
{
    if config.packages.is_empty() {
        debug!("No packages configured, skipping install");
    } else {
        info!("Refreshing package index");
        host.refresh_package_index()
            .await
            .map_err(SetupError::PackageIndexError)?;

        info!("Installing {}", config.packages.join(", "));
        host.install_packages(&config.packages)
            .await
            .map_err(SetupError::InstallError)?;
    }

    let report = transform(&inputs.config, &inputs.transform_options());
    log_transform(&report, inputs, workflow);

    let config_path = config.config_path();
    let write_error = |source| SetupError::WriteConfigError {
        path: config_path.clone(),
        source,
    };
    host.ensure_directory(&config.config_dir)
        .await
        .map_err(write_error)?;
    host.install_file(&report.config, &config_path)
        .await
        .map_err(write_error)?;
    info!("Wrote {}", config_path.display());

    host.tunnel_up(&config_path)
        .await
        .map_err(|source| SetupError::TunnelUpError {
            interface: config.interface.clone(),
            source,
        })?;
    info!("Interface {} is up", config.interface);

    let status = match host.tunnel_status(&config.interface).await {
        Ok(status) => {
            info!("Tunnel status:\n{}", status.trim_end());
            Some(status)
        }
        Err(e) => {
            warn!("Could not read tunnel status: {}", e);
            None
        }
    };

    if let Err(e) = workflow.save_state(STATE_STARTED, "true") {
        warn!("Failed to record {} state: {}", STATE_STARTED, e);
    }

    Ok(SetupOutcome {
        transform: report,
        config_path,
        status,
    })
}

fn log_transform<W: Write>(
    report: &TransformReport,
    inputs: &ActionInputs,
    workflow: &mut Workflow<W>,
) {
    if report.decoded_from_base64 {
        info!("Decoded base64 config");
    }

    match report.allowed_ips {
        OverrideOutcome::NotRequested => {}
        OverrideOutcome::Applied => {
            info!(
                "AllowedIPs set to {}",
                inputs.allowed_ips.as_deref().unwrap_or_default()
            );
        }
        OverrideOutcome::NoMatchingLine => {
            let message = "allowed-ips was set but the config has no AllowedIPs line; override not applied";
            warn!("{}", message);
            workflow.warning(message);
        }
    }

    if report.dns_lines_removed > 0 {
        info!(
            "Removed {} DNS line(s); set keep-dns to keep them",
            report.dns_lines_removed
        );
    }
}
