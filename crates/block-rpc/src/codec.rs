use crate::wire::Envelope;
use crate::RpcError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Messages larger than this are rejected outright rather than trusting a
/// hostile or corrupt length prefix to drive an unbounded allocation.
const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Writes one envelope as a 4-byte big-endian length prefix followed by
/// its `serde_json` encoding.
pub async fn write_envelope<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    envelope: &Envelope,
) -> Result<(), RpcError> {
    let body = serde_json::to_vec(envelope).map_err(RpcError::Encode)?;
    let len = u32::try_from(body.len()).map_err(|_| RpcError::FrameTooLarge(body.len()))?;
    writer
        .write_all(&len.to_be_bytes())
        .await
        .map_err(RpcError::Io)?;
    writer.write_all(&body).await.map_err(RpcError::Io)?;
    writer.flush().await.map_err(RpcError::Io)?;
    Ok(())
}

/// Reads one length-prefixed envelope. Returns `Err(RpcError::Io)` with
/// `UnexpectedEof` if the peer closes before a full frame arrives.
pub async fn read_envelope<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Envelope, RpcError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await.map_err(RpcError::Io)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(RpcError::FrameTooLarge(len as usize));
    }

    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await.map_err(RpcError::Io)?;
    serde_json::from_slice(&body).map_err(RpcError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{Response, RpcMessage};
    use std::io::Cursor;

    #[tokio::test]
    async fn round_trips_an_envelope() {
        let envelope = Envelope::wrap(RpcMessage::Response(Response::ok("done")));
        let (mut client, mut server) = tokio::io::duplex(4096);
        write_envelope(&mut client, &envelope).await.unwrap();

        let decoded = read_envelope(&mut server).await.unwrap();
        match decoded.body {
            RpcMessage::Response(r) => {
                assert_eq!(r.out, "done");
                assert_eq!(r.exit, 0);
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[tokio::test]
    async fn rejects_frame_over_the_size_cap() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_FRAME_LEN + 1).to_be_bytes());
        let mut cursor = Cursor::new(buf);
        let err = read_envelope(&mut cursor).await.unwrap_err();
        assert!(matches!(err, RpcError::FrameTooLarge(_)));
    }
}
