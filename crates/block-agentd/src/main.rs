use anyhow::{Context, Result};
use block_agentd::config::AgentConfig;
use block_coordinator::{AgentTransport, RemoteAgentTransport};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::{Arc, Once};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let format =
            std::env::var("BLOCK_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

        if format.eq_ignore_ascii_case("json") {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .json()
                .flatten_event(true)
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .compact()
                .init();
        }
    });
}

/// Remote agent and CLI-facing RPC server for a single volume mount.
#[derive(Parser)]
#[command(name = "block-agentd")]
#[command(about = "iSCSI block provisioning agent", long_about = None)]
struct Cli {
    /// Path to a TOML config file (see `block-agentd.toml` for layout).
    #[arg(long)]
    config: String,

    /// Override the listen address from the config file.
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Override the `targetcli` binary path from the config file.
    #[arg(long)]
    targetcli_path: Option<String>,

    /// RPC port used when this agent fans requests out to peer agents.
    #[arg(long, default_value_t = block_coordinator::DEFAULT_AGENT_PORT)]
    peer_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let text = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("reading config file {}", cli.config))?;
    let mut config = AgentConfig::from_toml_str(&text)?;

    if let Some(listen) = cli.listen {
        config.listen = listen;
    }
    if let Some(path) = cli.targetcli_path {
        config.targetcli_path = path;
    }

    let transport: Arc<dyn AgentTransport> =
        Arc::new(RemoteAgentTransport::new(Default::default(), cli.peer_port));

    block_agentd::serve(config, transport).await
}
