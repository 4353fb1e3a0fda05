//! OpenVPN Manager Daemon
//!
//! Privileged daemon that manages simple OpenVPN connections: it owns the
//! profile store, the current-selection pointer, the tunnel process and the
//! two protocol pipes. Clients drive it through `ovpnctl`.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use nix::unistd::Uid;
use ovpn_ipc::transport::{PipePair, ServerEndpoint};
use shared_utils::config::Config;
use shared_utils::logging::{init_logging, LogOptions};
use tracing::{info, warn};

use ovpn_daemon::dispatcher::Dispatcher;
use ovpn_daemon::profile_store::ProfileStore;
use ovpn_daemon::supervisor::Supervisor;

/// Command-line arguments for the manager daemon
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Path to the configuration file
    #[clap(short, long, default_value = "/etc/ovpn-mngr/config.toml")]
    config: PathBuf,

    /// Log level
    #[clap(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Pipes and the management tree are root-owned; bail before touching
    // either. Logging is not up yet at this point, so report on stderr.
    if !Uid::effective().is_root() {
        eprintln!("insufficient privileges: euid {}", Uid::effective());
        eprintln!("the manager daemon must be run as root");
        std::process::exit(1);
    }

    let (config, config_warning) = match Config::load(&args.config) {
        Ok(config) => (config, None),
        Err(e) => (
            Config::default(),
            Some(format!(
                "failed to load configuration from {}: {e}; using defaults",
                args.config.display()
            )),
        ),
    };

    ensure_layout(&config)?;

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };
    let _guard = init_logging(LogOptions {
        level,
        log_to_stdout: true,
        log_file: Some(config.log_file()),
    });

    info!("OpenVPN manager daemon starting up");
    if let Some(message) = config_warning {
        warn!("{message}");
    }
    info!("management root: {}", config.paths.management_dir.display());
    info!("pipe directory: {}", config.paths.runtime_dir.display());

    let endpoint = ServerEndpoint::create(PipePair::in_dir(&config.paths.runtime_dir))
        .context("failed to set up the protocol pipes")?;
    let store = ProfileStore::new(
        config.profiles_dir(),
        config.current_link(),
        config.staging_link(),
    );
    let supervisor = Supervisor::new(config.tunnel.program.clone());

    Dispatcher::new(endpoint, store, supervisor).run()?;

    info!("OpenVPN manager daemon shut down");
    Ok(())
}

/// Create the management root and the profiles directory if absent.
fn ensure_layout(config: &Config) -> anyhow::Result<()> {
    for dir in [config.paths.management_dir.clone(), config.profiles_dir()] {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    Ok(())
}
