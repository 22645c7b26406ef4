use thiserror::Error;

/// Errors produced across the block control plane. Each variant carries
/// enough context to format both a human-readable `out` string and a
/// stable `exit` code for the CLI-facing RPC surface.
#[derive(Debug, Error)]
pub enum BlockError {
    /// Input-validation failure: bad size/mpath/name before any side effect.
    #[error("{0}")]
    InvalidArgument(String),

    /// Requested multipath factor exceeds the candidate host count.
    #[error("multipath req: {mpath} > block-hosts: {host_count}")]
    MpathExceedsHosts { mpath: u32, host_count: usize },

    /// A block with this name already exists on the volume.
    #[error("BLOCK with name: '{0}' already EXIST")]
    AlreadyExists(String),

    /// No block with this name exists on the volume.
    #[error("BLOCK Doesn't EXIST")]
    NotFound,

    /// Filesystem I/O against the shared volume failed.
    #[error("filesystem operation `{operation}` failed: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Advisory lock acquisition on the volume's meta.lock failed.
    #[error("failed to acquire volume lock for '{volume}': {source}")]
    LockFailed {
        volume: String,
        #[source]
        source: std::io::Error,
    },

    /// A remote RPC call could not complete at the transport layer.
    #[error("transport error talking to {host}: {message}")]
    Transport { host: String, message: String },

    /// The audit loop exhausted every candidate host without reaching mpath.
    #[error("spare nodes exhausted for block '{0}': rewinding creation")]
    AuditExhausted(String),

    /// Catch-all for internal failures with no more specific variant.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BlockError {
    /// Maps this error onto the `errno`-style exit code used by the
    /// CLI-facing RPC `Response.exit` field.
    pub fn exit_code(&self) -> i32 {
        match self {
            BlockError::MpathExceedsHosts { .. } => libc_enodev(),
            BlockError::AlreadyExists(_) => libc_eexist(),
            BlockError::NotFound => libc_enoent(),
            _ => -1,
        }
    }

    pub fn io(operation: &'static str, source: std::io::Error) -> Self {
        Self::Io { operation, source }
    }
}

pub type BlockResult<T> = std::result::Result<T, BlockError>;

// Avoids a direct `libc` dependency for three well-known constants; the
// values match every Linux/BSD errno.h in practice.
fn libc_enodev() -> i32 {
    19
}
fn libc_eexist() -> i32 {
    17
}
fn libc_enoent() -> i32 {
    2
}
