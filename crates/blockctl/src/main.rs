use anyhow::Result;
use block_rpc::{RpcClient, RpcMessage};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    });
}

/// Control utility for the iSCSI block provisioning service.
#[derive(Parser)]
#[command(name = "blockctl")]
#[command(about = "gluster-block-style iSCSI block provisioning control", long_about = None)]
struct Cli {
    /// Address of a `block-agentd` instance to send the request to.
    #[arg(long, global = true, default_value = "127.0.0.1:24007")]
    server: String,

    /// Volume this command operates against.
    #[arg(long, global = true)]
    volume: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new multipath iSCSI block.
    Create {
        /// Name for the new block.
        block_name: String,
        /// Size in bytes.
        size: u64,
        /// Comma-separated candidate host list.
        #[arg(long)]
        hosts: String,
        /// Volfile server used when registering the backstore.
        #[arg(long)]
        volfileserver: String,
        /// Number of hosts that must successfully serve the block.
        #[arg(long, default_value_t = 1)]
        mpath: u32,
    },
    /// Delete an existing block.
    Delete {
        /// Name of the block to delete.
        block_name: String,
    },
    /// List every block on the volume.
    List,
    /// Show detailed status for one block.
    Info {
        /// Name of the block to describe.
        block_name: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    let client = RpcClient::default();

    let request = match cli.command {
        Commands::Create {
            block_name,
            size,
            hosts,
            volfileserver,
            mpath,
        } => RpcMessage::CreateCli {
            volume: cli.volume,
            volfileserver,
            block_hosts: hosts.split(',').map(|h| h.trim().to_string()).collect(),
            block_name,
            size,
            mpath,
        },
        Commands::Delete { block_name } => RpcMessage::DeleteCli {
            volume: cli.volume,
            block_name,
        },
        Commands::List => RpcMessage::ListCli { volume: cli.volume },
        Commands::Info { block_name } => RpcMessage::InfoCli {
            volume: cli.volume,
            block_name,
        },
    };

    let response = client.call(&cli.server, request).await?;
    match response {
        RpcMessage::Response(r) => {
            if !r.out.is_empty() {
                println!("{}", r.out);
            }
            let code: u8 = r.exit.rem_euclid(256) as u8;
            Ok(ExitCode::from(code))
        }
        other => anyhow::bail!("unexpected reply from server: {other:?}"),
    }
}
