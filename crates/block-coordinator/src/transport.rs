use block_common::{Gbid, HostAddr};
use block_rpc::{Response, RpcClient, RpcError, RpcMessage};
use futures::future::BoxFuture;

/// Default TCP port every `block-agentd` instance listens on.
pub const DEFAULT_AGENT_PORT: u16 = 24007;

/// The two node-facing operations a fan-out can dispatch.
#[derive(Debug, Clone)]
pub enum RemoteOp {
    Create {
        volume: String,
        volfileserver: String,
        block_name: String,
        gbid: Gbid,
        size: u64,
    },
    Delete {
        block_name: String,
        gbid: Gbid,
    },
}

/// Dispatches one [`RemoteOp`] to one host and returns the agent's reply.
/// Modeled as a boxed-future trait (the teacher's `common::traits` pattern
/// for async trait methods without pulling in `async-trait`) so tests can
/// substitute an in-process fake with no real sockets.
pub trait AgentTransport: Send + Sync {
    fn dispatch<'a>(
        &'a self,
        addr: &'a HostAddr,
        op: RemoteOp,
    ) -> BoxFuture<'a, Result<Response, RpcError>>;
}

/// Talks to real `block-agentd` instances over the node-facing RPC surface.
pub struct RemoteAgentTransport {
    client: RpcClient,
    port: u16,
}

impl RemoteAgentTransport {
    pub fn new(client: RpcClient, port: u16) -> Self {
        Self { client, port }
    }
}

impl Default for RemoteAgentTransport {
    fn default() -> Self {
        Self::new(RpcClient::default(), DEFAULT_AGENT_PORT)
    }
}

impl AgentTransport for RemoteAgentTransport {
    fn dispatch<'a>(
        &'a self,
        addr: &'a HostAddr,
        op: RemoteOp,
    ) -> BoxFuture<'a, Result<Response, RpcError>> {
        Box::pin(async move {
            let target = format!("{}:{}", addr.as_str(), self.port);
            let message = match op {
                RemoteOp::Create {
                    volume,
                    volfileserver,
                    block_name,
                    gbid,
                    size,
                } => RpcMessage::Create {
                    volume,
                    volfileserver,
                    block_name,
                    gbid: gbid.to_string(),
                    size,
                },
                RemoteOp::Delete { block_name, gbid } => RpcMessage::Delete {
                    block_name,
                    gbid: gbid.to_string(),
                },
            };

            match self.client.call(&target, message).await? {
                RpcMessage::Response(response) => Ok(response),
                _ => Err(RpcError::UnexpectedMessage),
            }
        })
    }
}
