use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;
use wireguard_action::lifecycle::SetupError;
use wireguard_action::platform::{get_host, TunnelHost};
use wireguard_action::wireguard::{transform, OverrideOutcome, TransformOptions};
use wireguard_action::{ActionConfig, ActionInputs, PostState, Workflow};

#[derive(Parser)]
#[command(name = "wireguard-action")]
#[command(about = "Bring up a WireGuard tunnel for a CI job and tear it down afterward")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ./wg-action.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Interface name, overrides the config file
    #[arg(short, long, global = true)]
    interface: Option<String>,

    /// Directory for tunnel configs, overrides the config file
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Install WireGuard, write the config and bring the tunnel up
    ///
    /// Reads the wg-config-file, allowed-ips and keep-dns action inputs.
    Setup,
    /// Bring the tunnel down and remove the config (never fails)
    #[command(alias = "post")]
    Teardown,
    /// Show whether the tunnel and its config are present
    Status,
    /// Print the config that setup would write, without side effects
    Render {
        /// Read the config from this file instead of the action input
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// AllowedIPs override
        #[arg(long)]
        allowed_ips: Option<String>,

        /// Keep DNS lines
        #[arg(long)]
        keep_dns: bool,
    },
    /// Generate default config file
    Init,
}

/// Runner debug logging is switched on with either of these
fn runner_debug() -> bool {
    std::env::var("RUNNER_DEBUG").is_ok_and(|v| v == "1")
        || std::env::var("ACTIONS_STEP_DEBUG").is_ok_and(|v| v == "true")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries workflow commands
    let level = if cli.verbose || runner_debug() {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    // Never fatal: teardown must exit 0 whatever happens
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let loaded = ActionConfig::discover(cli.config.as_deref());
    let overrides = Overrides {
        interface: cli.interface,
        config_dir: cli.config_dir,
    };

    match cli.command {
        Commands::Setup => {
            let mut workflow = Workflow::from_env();
            let result = match loaded {
                Ok(config) => setup(&overrides.apply(config), &mut workflow).await,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = result {
                error!("Setup failed: {}", e);
                workflow.error(&e.to_string());
                std::process::exit(1);
            }
        }
        Commands::Teardown => {
            let mut workflow = Workflow::from_env();
            let config = match loaded {
                Ok(config) => config,
                Err(e) => {
                    workflow.warning(&format!("{}; falling back to defaults", e));
                    ActionConfig::default()
                }
            };
            let config = overrides.apply(config);
            let host = match get_host(config.staging_dir()) {
                Ok(host) => host,
                Err(e) => {
                    workflow.warning(&format!("Teardown skipped: {}", e));
                    return Ok(());
                }
            };
            let report =
                wireguard_action::run_teardown(&host, &config, &PostState::from_env(), &mut workflow)
                    .await;
            if report.warnings.is_empty() {
                info!("Teardown complete");
            } else {
                warn!("Teardown finished with {} warning(s)", report.warnings.len());
            }
        }
        Commands::Status => {
            let config = overrides.apply(loaded?);
            let host = get_host(config.staging_dir())?;
            let config_path = config.config_path();
            let interface = host.probe_interface(&config.interface).await;
            let file = host.probe_file(&config_path).await;

            println!("Interface {}: {}", config.interface, interface);
            println!("Config {}: {}", config_path.display(), file);
            if interface.is_present() {
                match host.tunnel_status(&config.interface).await {
                    Ok(status) => print!("{}", status),
                    Err(e) => println!("Error reading tunnel status: {}", e),
                }
            }
        }
        Commands::Render {
            file,
            allowed_ips,
            keep_dns,
        } => {
            let (raw, options) = match file {
                Some(path) => (
                    std::fs::read_to_string(&path)?,
                    TransformOptions {
                        allowed_ips,
                        keep_dns,
                    },
                ),
                None => {
                    let inputs = ActionInputs::from_env()?;
                    let mut options = inputs.transform_options();
                    if allowed_ips.is_some() {
                        options.allowed_ips = allowed_ips;
                    }
                    options.keep_dns |= keep_dns;
                    (inputs.config, options)
                }
            };

            let report = transform(&raw, &options);
            info!(
                "base64: {}, AllowedIPs: {:?}, DNS lines removed: {}",
                report.decoded_from_base64, report.allowed_ips, report.dns_lines_removed
            );
            if report.allowed_ips == OverrideOutcome::NoMatchingLine {
                warn!("No AllowedIPs line to override");
            }
            print!("{}", report.config);
        }
        Commands::Init => {
            info!("Generating default config...");
            let path = PathBuf::from(wireguard_action::config::LOCAL_CONFIG_FILE);
            ActionConfig::default().save(&path)?;
            println!("Created default config: {}", path.display());
        }
    }

    Ok(())
}

/// Command-line flags win over the config file
struct Overrides {
    interface: Option<String>,
    config_dir: Option<PathBuf>,
}

impl Overrides {
    fn apply(&self, mut config: ActionConfig) -> ActionConfig {
        if let Some(interface) = &self.interface {
            config.interface = interface.clone();
        }
        if let Some(dir) = &self.config_dir {
            config.config_dir = dir.clone();
        }
        config
    }
}

async fn setup(
    config: &ActionConfig,
    workflow: &mut Workflow<std::io::Stdout>,
) -> Result<(), Box<dyn std::error::Error>> {
    let inputs = ActionInputs::from_env().map_err(SetupError::from)?;
    info!("Setting up {}", config.interface);

    let host = get_host(config.staging_dir())?;
    let outcome = wireguard_action::run_setup(&host, config, &inputs, workflow).await?;
    info!("Tunnel {} started from {}", config.interface, outcome.config_path.display());
    workflow.notice(&format!(
        "WireGuard interface {} is up ({})",
        config.interface,
        outcome.config_path.display()
    ));
    Ok(())
}
