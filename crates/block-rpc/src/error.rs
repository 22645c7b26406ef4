use thiserror::Error;

/// Transport-layer failures, kept distinct from an application-level
/// non-zero `exit` so a caller never conflates "the peer ran the
/// operation and it failed" with "the peer was never reached".
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("connect to {0} timed out")]
    ConnectTimeout(String),

    #[error("call to {0} timed out")]
    CallTimeout(String),

    #[error("io error: {0}")]
    Io(#[source] std::io::Error),

    #[error("failed to encode rpc envelope: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode rpc envelope: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("frame of {0} bytes exceeds the size cap")]
    FrameTooLarge(usize),

    #[error("peer replied with mismatched program/version")]
    ProtocolMismatch,

    #[error("peer sent an unexpected message variant")]
    UnexpectedMessage,
}
