use crate::codec::{read_envelope, write_envelope};
use crate::wire::{Envelope, Response, RpcMessage};
use crate::RpcError;
use std::future::Future;
use tokio::net::TcpStream;

/// Services exactly one request on an already-accepted connection: decode
/// the envelope, hand the request to `handler`, encode and send back
/// whatever `Response` it produces, then let the caller close the socket.
/// Mirrors the client's one-call-per-connection contract.
pub async fn serve_one<F, Fut>(mut stream: TcpStream, handler: F) -> Result<(), RpcError>
where
    F: FnOnce(RpcMessage) -> Fut,
    Fut: Future<Output = Response>,
{
    let envelope = read_envelope(&mut stream).await?;
    if !envelope.matches_program() {
        return Err(RpcError::ProtocolMismatch);
    }

    let response = handler(envelope.body).await;
    write_envelope(&mut stream, &Envelope::wrap(RpcMessage::Response(response))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RpcClient;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn serve_one_echoes_volume_name_as_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            serve_one(socket, |req| async move {
                match req {
                    RpcMessage::ListCli { volume } => Response::ok(volume),
                    _ => Response::failed("unexpected", -1),
                }
            })
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
            RpcMessage::Response(r) => assert_eq!(r.out, "vol0"),
            other => panic!("unexpected response: {:?}", other),
        }
    }
}
