//! Post step: best-effort tunnel teardown
//!
//! Teardown never fails the job. Each problem becomes a warning and the
//! remaining steps still run, so a stuck interface does not keep the config
//! (and its private key) on disk.

use crate::action::{PostState, Workflow};
use crate::config::ActionConfig;
use crate::platform::{PlatformError, Presence, TunnelHost};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
enum TeardownError {
    #[error("Failed to remove {path}: {source}")]
    RemoveConfigError {
        path: PathBuf,
        #[source]
        source: PlatformError,
    },
}

/// What teardown found and did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    pub interface: Presence,
    pub interface_down: bool,
    /// `None` when teardown stopped before probing the file
    pub config_file: Option<Presence>,
    pub config_removed: bool,
    pub warnings: Vec<String>,
}

impl TeardownReport {
    fn new() -> Self {
        Self {
            interface: Presence::Absent,
            interface_down: false,
            config_file: None,
            config_removed: false,
            warnings: Vec::new(),
        }
    }

    fn warn<W: Write>(&mut self, workflow: &mut Workflow<W>, message: String) {
        warn!("{}", message);
        workflow.warning(&message);
        self.warnings.push(message);
    }
}

pub async fn run_teardown<H, W>(
    host: &H,
    config: &ActionConfig,
    state: &PostState,
    workflow: &mut Workflow<W>,
) -> TeardownReport
where
    H: TunnelHost,
    W: Write,
{
    // Advisory only; the probes below decide what to undo
    debug!("Setup recorded started={:?}", state.started);

    let mut report = TeardownReport::new();
    if let Err(e) = teardown_steps(host, config, &mut report, workflow).await {
        report.warn(workflow, format!("Teardown did not complete: {}", e));
    }
    report
}

async fn teardown_steps<H, W>(
    host: &H,
    config: &ActionConfig,
    report: &mut TeardownReport,
    workflow: &mut Workflow<W>,
) -> Result<(), TeardownError>
where
    H: TunnelHost,
    W: Write,
{
    let config_path = config.config_path();

    report.interface = host.probe_interface(&config.interface).await;
    match report.interface.clone() {
        Presence::Present => {
            bring_down(host, config, &config_path, report, workflow).await;
        }
        Presence::Absent => {
            info!("Interface {} is not up, nothing to bring down", config.interface);
        }
        Presence::Indeterminate(reason) => {
            report.warn(
                workflow,
                format!(
                    "Could not determine whether {} is up ({}); attempting teardown anyway",
                    config.interface, reason
                ),
            );
            bring_down(host, config, &config_path, report, workflow).await;
        }
    }

    let file = host.probe_file(&config_path).await;
    report.config_file = Some(file.clone());
    match file {
        Presence::Present => {
            remove_config(host, &config_path, report).await?;
        }
        Presence::Absent => {
            info!("{} does not exist, nothing to remove", config_path.display());
        }
        Presence::Indeterminate(reason) => {
            report.warn(
                workflow,
                format!(
                    "Could not determine whether {} exists ({}); attempting removal anyway",
                    config_path.display(),
                    reason
                ),
            );
            remove_config(host, &config_path, report).await?;
        }
    }

    Ok(())
}

async fn bring_down<H, W>(
    host: &H,
    config: &ActionConfig,
    config_path: &Path,
    report: &mut TeardownReport,
    workflow: &mut Workflow<W>,
) where
    H: TunnelHost,
    W: Write,
{
    info!("Bringing down {}", config.interface);
    match host.tunnel_down(config_path).await {
        Ok(()) => {
            report.interface_down = true;
            info!("Interface {} is down", config.interface);
        }
        Err(e) => {
            report.warn(
                workflow,
                format!("Failed to bring down {}: {}", config.interface, e),
            );
        }
    }
}

async fn remove_config<H: TunnelHost>(
    host: &H,
    config_path: &Path,
    report: &mut TeardownReport,
) -> Result<(), TeardownError> {
    host.remove_file(config_path)
        .await
        .map_err(|source| TeardownError::RemoveConfigError {
            path: config_path.to_path_buf(),
            source,
        })?;
    report.config_removed = true;
    info!("Removed {}", config_path.display());
    Ok(())
}
