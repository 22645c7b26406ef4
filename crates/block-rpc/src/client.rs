use crate::codec::{read_envelope, write_envelope};
use crate::wire::{Envelope, RpcMessage};
use crate::RpcError;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Default host-level timeouts: 25s to establish the connection, 25s more
/// for the full request/response round trip.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(25);
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(25);

/// One call per connection: connect, send, await exactly one response,
/// drop the socket. No pooling, no retries, no pipelining; a fresh
/// `TcpStream` per `call` mirrors the original's one-shot RPC client.
#[derive(Debug, Clone)]
pub struct RpcClient {
    connect_timeout: Duration,
    call_timeout: Duration,
}

impl Default for RpcClient {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl RpcClient {
    pub fn new(connect_timeout: Duration, call_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            call_timeout,
        }
    }

    pub async fn call(&self, addr: &str, request: RpcMessage) -> Result<RpcMessage, RpcError> {
        let connect = async { TcpStream::connect(addr).await.map_err(RpcError::Io) };
        let mut stream = timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| RpcError::ConnectTimeout(addr.to_string()))??;

        let roundtrip = async {
            write_envelope(&mut stream, &Envelope::wrap(request)).await?;
            read_envelope(&mut stream).await
        };

        let envelope = timeout(self.call_timeout, roundtrip)
            .await
            .map_err(|_| RpcError::CallTimeout(addr.to_string()))??;

        if !envelope.matches_program() {
            return Err(RpcError::ProtocolMismatch);
        }
        Ok(envelope.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{read_envelope, write_envelope};
    use crate::wire::Response;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn round_trips_over_a_real_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let envelope = read_envelope(&mut socket).await.unwrap();
            let reply = match envelope.body {
                RpcMessage::ListCli { volume } => {
                    RpcMessage::Response(Response::ok(format!("listing {}", volume)))
                }
                _ => RpcMessage::Response(Response::failed("unexpected", -1)),
            };
            write_envelope(&mut socket, &Envelope::wrap(reply))
                .await
                .unwrap();
        });

        let client = RpcClient::default();
        let response = client
            .call(
                &addr.to_string(),
                RpcMessage::ListCli {
                    volume: "vol0".into(),
                },
            )
            .await
            .unwrap();

        match response {
            RpcMessage::Response(r) => assert_eq!(r.out, "listing vol0"),
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn connect_timeout_surfaces_as_transport_error() {
        // 10.255.255.1 is a non-routable address reserved for documentation
        // use; connecting to it reliably stalls rather than refusing.
        let client = RpcClient::new(Duration::from_millis(50), Duration::from_secs(5));
        let result = client
            .call(
                "10.255.255.1:65535",
                RpcMessage::ListCli {
                    volume: "vol0".into(),
                },
            )
            .await;
        assert!(result.is_err());
    }
}
