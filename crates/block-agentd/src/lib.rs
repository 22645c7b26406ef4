//! Remote agent plus the CLI-facing RPC surface: one daemon binary plays
//! both roles, exactly as the original registers `block_create_cli_1_svc`
//! and `block_create_1_svc` against the same RPC program.

pub mod config;
pub mod targetcli;

use block_common::{BlockName, Gbid};
use block_coordinator::{
    AgentTransport, Coordinator, CreateCliRequest, DeleteCliRequest, InfoCliRequest,
};
use block_meta::BlockMetaStore;
use block_rpc::{server::serve_one, Response, RpcMessage};
use config::AgentConfig;
use std::sync::Arc;
use targetcli::TargetCli;
use tokio::net::TcpListener;
use volume_fs::LocalVolume;

/// Shared state behind every accepted connection.
pub struct Agent {
    coordinator: Coordinator<LocalVolume>,
    targetcli: Arc<TargetCli>,
}

impl Agent {
    pub fn new(config: &AgentConfig, transport: Arc<dyn AgentTransport>) -> Self {
        let volume = Arc::new(LocalVolume::new(config.volume_root.clone()));
        let meta = Arc::new(BlockMetaStore::new(volume, config.volume_name.clone()));
        let hostname = hostname_or_fallback();
        let targetcli = Arc::new(TargetCli::new(config.targetcli_path.clone(), hostname));

        Self {
            coordinator: Coordinator::new(meta, transport),
            targetcli,
        }
    }

    /// Dispatches one decoded request. `Create`/`Delete` are serviced
    /// locally by shelling out; the four `*Cli` variants are driven
    /// through the coordinator. `Response` arriving as a request is a
    /// protocol error from the peer.
    pub async fn handle(&self, request: RpcMessage) -> Response {
        match request {
            RpcMessage::Create {
                volume,
                volfileserver,
                block_name,
                gbid,
                size,
            } => self.handle_create(volume, volfileserver, block_name, gbid, size).await,
            RpcMessage::Delete { block_name, gbid } => self.handle_delete(block_name, gbid).await,
            RpcMessage::CreateCli {
                volume,
                volfileserver,
                block_hosts,
                block_name,
                size,
                mpath,
            } => match BlockName::parse(&block_name) {
                Ok(block_name) => {
                    self.coordinator
                        .create_cli(CreateCliRequest {
                            volume,
                            volfileserver,
                            block_hosts: block_hosts.into_iter().map(Into::into).collect(),
                            block_name,
                            size,
                            mpath,
                        })
                        .await
                }
                Err(e) => Response::failed(e.to_string(), e.exit_code()),
            },
            RpcMessage::DeleteCli { volume, block_name } => match BlockName::parse(&block_name) {
                Ok(block_name) => {
                    self.coordinator
                        .delete_cli(DeleteCliRequest { volume, block_name })
                        .await
                }
                Err(e) => Response::failed(e.to_string(), e.exit_code()),
            },
            RpcMessage::ListCli { .. } => self.coordinator.list_cli().await,
            RpcMessage::InfoCli { volume, block_name } => match BlockName::parse(&block_name) {
                Ok(block_name) => {
                    self.coordinator
                        .info_cli(InfoCliRequest { volume, block_name })
                        .await
                }
                Err(e) => Response::failed(e.to_string(), e.exit_code()),
            },
            RpcMessage::Response(_) => {
                Response::failed("agent received a Response as a request", -1)
            }
        }
    }

    async fn handle_create(
        &self,
        volume: String,
        volfileserver: String,
        block_name: String,
        gbid: String,
        size: u64,
    ) -> Response {
        let gbid = match Gbid::parse(&gbid) {
            Ok(g) => g,
            Err(e) => return Response::failed(e.to_string(), e.exit_code()),
        };
        let result = self
            .targetcli
            .create_target(&block_name, &gbid, &volume, &volfileserver, size)
            .await;
        Response {
            out: result.out,
            exit: result.exit,
        }
    }

    async fn handle_delete(&self, block_name: String, gbid: String) -> Response {
        let gbid = match Gbid::parse(&gbid) {
            Ok(g) => g,
            Err(e) => return Response::failed(e.to_string(), e.exit_code()),
        };
        let result = self.targetcli.delete_target(&block_name, &gbid).await;
        Response {
            out: result.out,
            exit: result.exit,
        }
    }
}

fn hostname_or_fallback() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

/// Binds the RPC listener and serves connections until the process is
/// killed, one `serve_one` call per accepted socket, matching the
/// one-request-per-connection transport contract.
pub async fn serve(config: AgentConfig, transport: Arc<dyn AgentTransport>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.listen).await?;
    tracing::info!(addr = %config.listen, "block-agentd listening");

    let agent = Arc::new(Agent::new(&config, transport));

    loop {
        let (socket, peer) = listener.accept().await?;
        let agent = agent.clone();
        tokio::spawn(async move {
            tracing::debug!(peer = %peer, "accepted connection");
            if let Err(e) = serve_one(socket, |req| async move { agent.handle(req).await }).await
            {
                tracing::warn!(peer = %peer, error = %e, "connection failed");
            }
        });
    }
}
