//! Lobby server backed by a JSON data directory.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use matchhall::{JsonStore, LobbyConfig, LobbyServerBuilder, OrchestratorConfig};
use matchhall_transport::DEFAULT_MAX_FRAME_LEN;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "matchhall-server", version, about = "Game lobby and match orchestration server")]
struct Args {
    /// Address the lobby listens on.
    #[arg(long, env = "MATCHHALL_BIND", default_value = "127.0.0.1:8888")]
    bind: String,

    /// Host clients are told to connect to for a running match.
    #[arg(long, env = "MATCHHALL_ADVERTISE_HOST", default_value = "127.0.0.1")]
    advertise_host: String,

    /// Interface match worker ports are allocated on.
    #[arg(long, env = "MATCHHALL_PORT_BIND_HOST", default_value = "0.0.0.0")]
    port_bind_host: IpAddr,

    /// Largest request frame in bytes.
    #[arg(long, env = "MATCHHALL_MAX_FRAME_LEN", default_value_t = DEFAULT_MAX_FRAME_LEN)]
    max_frame_len: usize,

    /// Directory holding users.json, games.json and uploaded_games/.
    #[arg(long, env = "MATCHHALL_DATA_DIR", default_value = "server_data")]
    data_dir: PathBuf,
}

impl Args {
    fn lobby_config(&self) -> LobbyConfig {
        LobbyConfig {
            bind_addr: self.bind.clone(),
            max_frame_len: self.max_frame_len,
            orchestrator: OrchestratorConfig {
                advertise_host: self.advertise_host.clone(),
                port_bind_host: self.port_bind_host,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "matchhall=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!(data_dir = %args.data_dir.display(), bind = %args.bind, "starting lobby");

    let store = Arc::new(JsonStore::open(&args.data_dir).await?);
    let server = LobbyServerBuilder::new()
        .config(args.lobby_config())
        .build(store)
        .await?;
    info!(addr = %server.local_addr()?, "lobby ready");

    server
        .run_until(async {
            match signal::ctrl_c().await {
                Ok(()) => info!("received SIGINT, shutting down"),
                Err(e) => error!(error = %e, "failed to listen for SIGINT"),
            }
        })
        .await?;

    Ok(())
}
