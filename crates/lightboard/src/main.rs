//! # lightboard
//!
//! Lightboard binary. `serve` runs the active-set server; `watch`, `set`, and
//! `get` talk to a running one.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::pin::pin;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lightboard_client::{ClientConfig, ClientSubscription, ConnectionStatus, SnapshotClient};
use lightboard_core::ActiveSetSnapshot;
use lightboard_core::logging::{LogFormat, init_subscriber};
use lightboard_server::{LightboardServer, ServerConfig};
use lightboard_settings::{LightboardSettings, MIN_INTERVAL_MS};

/// Lightboard active-set server and subscriber.
#[derive(Parser, Debug)]
#[command(name = "lightboard", about = "Lightboard active-set server and subscriber")]
struct Cli {
    /// Settings file (defaults to `~/.lightboard/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log filter directive (overrides settings; `RUST_LOG` wins over both).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format: `compact` or `json`.
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the server until Ctrl-C.
    Serve(ServeArgs),
    /// Subscribe and print every new active set until Ctrl-C.
    Watch {
        #[command(flatten)]
        remote: RemoteArgs,
        /// Delay between a dropped stream and the next attempt.
        #[arg(long)]
        retry_ms: Option<u64>,
    },
    /// Replace the active set. No identifiers clears it.
    Set {
        #[command(flatten)]
        remote: RemoteArgs,
        /// New active identifiers.
        ids: Vec<String>,
    },
    /// Print the current active set.
    Get {
        #[command(flatten)]
        remote: RemoteArgs,
        /// Print the raw JSON snapshot.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Maximum concurrent stream subscribers.
    #[arg(long)]
    max_subscribers: Option<usize>,

    /// Idle time before a heartbeat is written, in milliseconds.
    #[arg(long)]
    heartbeat_ms: Option<u64>,
}

impl ServeArgs {
    fn server_config(&self, settings: &LightboardSettings) -> ServerConfig {
        let mut config = ServerConfig::from_settings(settings);
        if let Some(ref host) = self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(max) = self.max_subscribers {
            config.max_subscribers = max.max(1);
        }
        if let Some(ms) = self.heartbeat_ms {
            config.heartbeat_interval = Duration::from_millis(ms.max(MIN_INTERVAL_MS));
        }
        config
    }
}

#[derive(Args, Debug)]
struct RemoteArgs {
    /// Server base URL (overrides settings).
    #[arg(long)]
    url: Option<String>,
}

impl RemoteArgs {
    fn client_config(&self, settings: &LightboardSettings) -> ClientConfig {
        let mut config = ClientConfig::from_settings(settings);
        if let Some(ref url) = self.url {
            config.base_url.clone_from(url);
        }
        config
    }
}

fn load_settings(path: Option<&PathBuf>) -> Result<LightboardSettings> {
    match path {
        Some(path) => lightboard_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => lightboard_settings::load_settings().with_context(|| {
            format!(
                "Failed to load settings from {}",
                lightboard_settings::settings_path().display()
            )
        }),
    }
}

/// One-line rendering of a snapshot for terminal output.
fn render(snapshot: &ActiveSetSnapshot) -> String {
    let ids = if snapshot.is_empty() {
        "(none)".to_string()
    } else {
        snapshot.active_ids().join(", ")
    };
    match snapshot.updated_at_utc() {
        Some(at) => format!("[{}] {ids}", at.to_rfc3339()),
        None => ids,
    }
}

async fn serve(settings: &LightboardSettings, args: &ServeArgs) -> Result<()> {
    let config = args.server_config(settings);
    let metrics = lightboard_server::metrics::install_recorder();
    let server = LightboardServer::new(config.clone(), metrics);

    let (addr, handle) = server
        .listen()
        .await
        .with_context(|| format!("Failed to bind server on {}", config.bind_addr()))?;

    tracing::info!(
        max_subscribers = config.max_subscribers,
        heartbeat_ms = u64::try_from(config.heartbeat_interval.as_millis()).unwrap_or(u64::MAX),
        "lightboard listening on http://{addr}"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    let drained = server
        .shutdown()
        .graceful_shutdown(vec![handle], Some(config.shutdown_timeout))
        .await;
    if !drained {
        tracing::warn!("server did not drain before the shutdown timeout");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn watch(config: ClientConfig) -> Result<()> {
    let client = SnapshotClient::new(&config).context("Failed to build HTTP client")?;
    let mut sub = ClientSubscription::start(client, config.retry_delay);
    tracing::info!(client_id = %sub.id(), base_url = %config.base_url, "watching");

    let mut ctrl_c = pin!(tokio::signal::ctrl_c());
    let mut printed: Option<ActiveSetSnapshot> = None;
    let mut status = sub.status();

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res.context("Failed to listen for ctrl-c")?;
                break;
            }
            alive = sub.changed() => {
                if !alive {
                    break;
                }
                let state = sub.state();
                if state.status != status {
                    status = state.status;
                    if status == ConnectionStatus::Reconnecting {
                        tracing::warn!(connects = state.connects, "stream lost, showing last known set");
                    } else {
                        tracing::info!(?status, connects = state.connects, "connection status");
                    }
                }
                if let Some(snapshot) = state.snapshot {
                    if printed.as_ref() != Some(&snapshot) {
                        println!("{}", render(&snapshot));
                        printed = Some(snapshot);
                    }
                }
            }
        }
    }

    sub.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(cli.settings.as_ref())?;
    let level = cli.log_level.as_deref().unwrap_or(&settings.logging.level);
    init_subscriber(level, cli.log_format.unwrap_or(settings.logging.format));

    match cli.command {
        Command::Serve(ref args) => serve(&settings, args).await,
        Command::Watch {
            ref remote,
            retry_ms,
        } => {
            let mut config = remote.client_config(&settings);
            if let Some(ms) = retry_ms {
                config = config.with_retry_delay(Duration::from_millis(ms.max(MIN_INTERVAL_MS)));
            }
            watch(config).await
        }
        Command::Set { ref remote, ref ids } => {
            let client = SnapshotClient::new(&remote.client_config(&settings))
                .context("Failed to build HTTP client")?;
            let snapshot = client
                .replace(ids.iter().cloned())
                .await
                .context("Failed to replace active set")?;
            println!("{}", render(&snapshot));
            Ok(())
        }
        Command::Get { ref remote, json } => {
            let client = SnapshotClient::new(&remote.client_config(&settings))
                .context("Failed to build HTTP client")?;
            let snapshot = client.fetch().await.context("Failed to fetch active set")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                println!("{}", render(&snapshot));
            }
            Ok(())
        }
    }
}
