use serde::{Deserialize, Serialize};

/// Fixed program/version identifiers every envelope carries, standing in
/// for the ONC RPC program/version pair the original protocol registers
/// against.
pub const PROGRAM: u32 = 0x2000_0B10;
pub const VERSION: u32 = 1;

/// One request or response on the wire, always wrapped with the fixed
/// program/version header so a listener can reject traffic meant for a
/// different protocol generation before touching the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub program: u32,
    pub version: u32,
    pub body: RpcMessage,
}

impl Envelope {
    pub fn wrap(body: RpcMessage) -> Self {
        Self {
            program: PROGRAM,
            version: VERSION,
            body,
        }
    }

    pub fn matches_program(&self) -> bool {
        self.program == PROGRAM && self.version == VERSION
    }
}

/// CLI-facing and node-facing requests, plus the single response shape
/// both surfaces reply with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum RpcMessage {
    CreateCli {
        volume: String,
        volfileserver: String,
        block_hosts: Vec<String>,
        block_name: String,
        size: u64,
        mpath: u32,
    },
    DeleteCli {
        volume: String,
        block_name: String,
    },
    ListCli {
        volume: String,
    },
    InfoCli {
        volume: String,
        block_name: String,
    },
    Create {
        volume: String,
        volfileserver: String,
        block_name: String,
        gbid: String,
        size: u64,
    },
    Delete {
        block_name: String,
        gbid: String,
    },
    Response(Response),
}

/// `exit == 0` is success; positive values are `errno`-style; negative
/// values denote a generic failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub out: String,
    pub exit: i32,
}

impl Response {
    pub fn ok(out: impl Into<String>) -> Self {
        Self {
            out: out.into(),
            exit: 0,
        }
    }

    pub fn failed(out: impl Into<String>, exit: i32) -> Self {
        Self {
            out: out.into(),
            exit,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit == 0
    }
}
