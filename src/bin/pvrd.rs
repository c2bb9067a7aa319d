//! PVR client daemon - serves config-defined backends through the client engine
//!
//! # Usage
//!
//! ```bash
//! # Run the engine until SIGINT/SIGTERM
//! pvrd run
//!
//! # List clients after one supervisor pass
//! pvrd clients --json
//!
//! # List the merged channel lineup
//! pvrd channels --radio
//!
//! # Print the effective configuration
//! pvrd config
//! ```

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use pvr_addon::{
    AddonDescriptor, LogNotifier, MemoryAddonSource, MemoryIdentityStore, MemorySettingsStore,
    StaticBackend,
};
use pvrd::config::{config_path_from_env, load_config_from_path};
use pvrd::{ClientEvent, Collaborators, PvrClients, PvrdConfig};

/// PVR client daemon
#[derive(Parser, Debug)]
#[command(name = "pvrd", version, about)]
struct Args {
    /// Configuration file (defaults to $PVRD_CONFIG, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the client engine until interrupted
    Run,
    /// List registered clients
    Clients {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List channels from every connected client
    Channels {
        /// List radio channels instead of TV channels
        #[arg(long)]
        radio: bool,
    },
    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("pvrd=info".parse()?)
                .add_directive("pvr_addon=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let path = args.config.or_else(config_path_from_env);
    let config = load_config_from_path(path.as_deref()).with_context(|| match &path {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration".to_string(),
    })?;

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run_daemon(config),
        Command::Clients { json } => list_clients(config, json),
        Command::Channels { radio } => list_channels(config, radio),
        Command::Config => {
            let rendered = config
                .to_toml_string()
                .context("Failed to render configuration")?;
            print!("{rendered}");
            Ok(())
        }
    }
}

/// Builds the engine over the configured static backends.
fn build_clients(config: &PvrdConfig) -> PvrClients {
    let addons = config
        .backends
        .iter()
        .map(|backend| {
            let descriptor = AddonDescriptor::new(
                backend.addon_id(),
                backend.name.clone(),
                Arc::new(StaticBackend::new(backend.clone())),
            );
            if backend.enabled {
                descriptor
            } else {
                descriptor.disabled()
            }
        })
        .collect();

    PvrClients::new(
        config.clients.clone(),
        Collaborators {
            addons: Arc::new(MemoryAddonSource::with_addons(addons)),
            identities: Arc::new(MemoryIdentityStore::new()),
            settings: Arc::new(MemorySettingsStore::new()),
            notifier: Arc::new(LogNotifier),
        },
    )
}

#[tokio::main]
async fn run_daemon(config: PvrdConfig) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        backends = config.backends.len(),
        "PVR daemon starting"
    );

    let clients = Arc::new(build_clients(&config));
    let cancel_token = CancellationToken::new();

    let event_task = spawn_event_logger(&clients, cancel_token.clone());
    clients.start();

    if let Err(e) = wait_for_shutdown_signal().await {
        error!(error = %e, "Error waiting for shutdown signal");
    }
    info!("Shutdown signal received");

    cancel_token.cancel();
    clients.unload().await;
    if let Err(e) = event_task.await {
        warn!(error = %e, "Event logger ended abnormally");
    }

    info!("PVR daemon stopped");
    Ok(())
}

fn spawn_event_logger(
    clients: &PvrClients,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let mut events = clients.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => break,

                event = events.recv() => match event {
                    Ok(ClientEvent::Removed { client_id, reason }) => {
                        info!(client_id = %client_id, reason = %reason, "Client event: removed");
                    }
                    Ok(event) => debug!(event = ?event, "Client event"),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event logger lagged behind");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    })
}

#[tokio::main]
async fn list_clients(config: PvrdConfig, json: bool) -> Result<()> {
    let clients = build_clients(&config);
    clients.update_and_initialise_clients(false).await;

    let infos: Vec<_> = clients
        .registry()
        .all_clients()
        .iter()
        .map(|client| client.info())
        .collect();

    if json {
        let rendered =
            serde_json::to_string_pretty(&infos).context("Failed to serialize client list")?;
        println!("{rendered}");
    } else if infos.is_empty() {
        println!("No clients registered.");
    } else {
        println!("{:>4}  {:<24} {:<24} {:<10} CAPABILITIES", "ID", "ADDON", "NAME", "STATE");
        for info in &infos {
            let state = if info.connected { "connected" } else { "offline" };
            println!(
                "{:>4}  {:<24} {:<24} {:<10} {}",
                info.id.as_i32(),
                info.addon_id.as_str(),
                info.friendly_name,
                state,
                info.capabilities
            );
        }
    }

    clients.unload().await;
    Ok(())
}

#[tokio::main]
async fn list_channels(config: PvrdConfig, radio: bool) -> Result<()> {
    let clients = build_clients(&config);
    clients.update_and_initialise_clients(false).await;

    let channels = clients.data().get_channels(radio).await;
    if let Some(e) = &channels.error {
        warn!(error = %e, "Some clients failed to list channels");
    }

    for channel in &channels.items {
        let locator = channel.external_url().unwrap_or("-");
        println!(
            "{:>3}:{:<5} {:<32} {}",
            channel.client_id.as_i32(),
            channel.number,
            channel.name,
            locator
        );
    }
    if channels.is_empty() {
        println!("No channels.");
    }

    clients.unload().await;
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
